//! Twilio SMS channel
//!
//! Outbound delivery goes through the Twilio Messages REST API with basic
//! auth. When credentials are absent the client is created disabled and
//! every send is logged and dropped, which keeps local development working
//! without a Twilio account.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{ComptoirError, Result};

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

#[derive(Clone)]
pub struct SmsClient {
    credentials: Option<(String, String)>,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct TwilioMessageResponse {
    sid: String,
    status: Option<String>,
}

impl SmsClient {
    pub fn new(account_sid: Option<String>, auth_token: Option<String>) -> Self {
        let credentials = match (account_sid, auth_token) {
            (Some(sid), Some(token)) if !sid.is_empty() && !token.is_empty() => Some((sid, token)),
            _ => {
                warn!("Twilio credentials not configured, SMS delivery disabled");
                None
            }
        };

        Self {
            credentials,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Send an SMS, returning the Twilio message SID
    pub async fn send_sms(&self, to_phone: &str, from_phone: &str, body: &str) -> Result<String> {
        let Some((sid, token)) = &self.credentials else {
            info!(to = %mask_phone(to_phone), "SMS delivery skipped (not configured)");
            return Ok(String::new());
        };

        let to_phone = format_phone_number(to_phone);
        let from_phone = format_phone_number(from_phone);

        let url = format!("{}/Accounts/{}/Messages.json", TWILIO_API_BASE, sid);
        let params = [("To", to_phone.as_str()), ("From", from_phone.as_str()), ("Body", body)];

        let response = self
            .http
            .post(&url)
            .basic_auth(sid, Some(token))
            .form(&params)
            .send()
            .await
            .map_err(|e| ComptoirError::NetworkError(format!("Twilio request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ComptoirError::ChannelError(format!(
                "Twilio returned {}: {}",
                status, body
            )));
        }

        let message: TwilioMessageResponse = response
            .json()
            .await
            .map_err(|e| ComptoirError::ChannelError(format!("bad Twilio response: {}", e)))?;

        info!(
            sid = %message.sid,
            status = message.status.as_deref().unwrap_or("queued"),
            to = %mask_phone(&to_phone),
            "SMS sent"
        );
        Ok(message.sid)
    }
}

/// Incoming Twilio SMS webhook form fields
#[derive(Debug, Clone, Deserialize)]
pub struct InboundSms {
    #[serde(rename = "From")]
    pub from: String,
    #[serde(rename = "To")]
    pub to: String,
    #[serde(rename = "Body", default)]
    pub body: String,
    #[serde(rename = "MessageSid", default)]
    pub message_sid: String,
}

impl InboundSms {
    /// Twilio always sends these four fields; anything else is malformed
    pub fn validate(&self) -> Result<()> {
        if self.from.is_empty() || self.to.is_empty() || self.message_sid.is_empty() {
            return Err(ComptoirError::ValidationError(
                "missing required SMS webhook fields".to_string(),
            ));
        }
        Ok(())
    }
}

/// Normalize to E.164, defaulting to +1 for bare ten-digit numbers
pub fn format_phone_number(phone: &str) -> String {
    let cleaned: String = phone
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    if cleaned.is_empty() {
        return String::new();
    }

    let digits_only = cleaned.trim_start_matches('+');
    if cleaned.starts_with('1') && digits_only.len() == 11 {
        format!("+{}", cleaned)
    } else if digits_only.len() == 10 && !cleaned.starts_with('+') {
        format!("+1{}", cleaned)
    } else if !cleaned.starts_with('+') {
        format!("+{}", cleaned)
    } else {
        cleaned
    }
}

/// Last four digits, for logs
pub fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() >= 4 {
        format!("***{}", &digits[digits.len() - 4..])
    } else {
        "****".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("5551234567"), "+15551234567");
        assert_eq!(format_phone_number("15551234567"), "+15551234567");
        assert_eq!(format_phone_number("+15551234567"), "+15551234567");
        assert_eq!(format_phone_number("(555) 123-4567"), "+15551234567");
        assert_eq!(format_phone_number("+33612345678"), "+33612345678");
        assert_eq!(format_phone_number(""), "");
    }

    #[test]
    fn test_inbound_validation() {
        let sms = InboundSms {
            from: "+15557654321".to_string(),
            to: "+15551234567".to_string(),
            body: "hi".to_string(),
            message_sid: "SM123".to_string(),
        };
        assert!(sms.validate().is_ok());

        let bad = InboundSms {
            from: String::new(),
            to: "+15551234567".to_string(),
            body: "hi".to_string(),
            message_sid: "SM123".to_string(),
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_unconfigured_client_is_disabled() {
        let client = SmsClient::new(None, None);
        assert!(!client.is_configured());

        let client = SmsClient::new(Some("AC123".to_string()), Some(String::new()));
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_unconfigured_send_is_noop() {
        let client = SmsClient::new(None, None);
        let sid = client
            .send_sms("+15557654321", "+15551234567", "hello")
            .await
            .unwrap();
        assert!(sid.is_empty());
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("+15557654321"), "***4321");
        assert_eq!(mask_phone("12"), "****");
    }
}
