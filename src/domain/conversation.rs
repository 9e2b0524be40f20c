//! Conversation record
//!
//! One row per inbound message and the reply that went out for it.

use serde::{Deserialize, Serialize};

/// Inbound channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sms,
    Facebook,
    Voice,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sms => "sms",
            Platform::Facebook => "facebook",
            Platform::Voice => "voice",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sms" => Ok(Platform::Sms),
            "facebook" => Ok(Platform::Facebook),
            "voice" => Ok(Platform::Voice),
            _ => Err(format!("Unknown platform: {}", s)),
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A logged customer interaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Assigned by the store on insert (0 until then)
    pub id: i64,
    pub business_id: String,
    pub customer_phone: String,
    pub platform: Platform,
    pub inbound_message: String,
    pub outbound_message: String,
    pub intent: String,
    /// "french" or "english", as detected at reply time
    pub language: String,
    pub ai_confidence: f64,
    pub escalated: bool,
    pub response_time_ms: i64,
    pub timestamp: i64,
}

impl Conversation {
    pub fn new(
        business_id: impl Into<String>,
        customer_phone: impl Into<String>,
        platform: Platform,
    ) -> Self {
        Self {
            id: 0,
            business_id: business_id.into(),
            customer_phone: customer_phone.into(),
            platform,
            inbound_message: String::new(),
            outbound_message: String::new(),
            intent: "general".to_string(),
            language: "english".to_string(),
            ai_confidence: 0.0,
            escalated: false,
            response_time_ms: 0,
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    /// Last four digits of the customer number, for dashboard display
    pub fn masked_customer(&self) -> String {
        let digits: String = self
            .customer_phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        if digits.len() >= 4 {
            format!("***{}", &digits[digits.len() - 4..])
        } else {
            "****".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_parse() {
        assert_eq!("sms".parse::<Platform>().unwrap(), Platform::Sms);
        assert_eq!("Facebook".parse::<Platform>().unwrap(), Platform::Facebook);
        assert_eq!("voice".parse::<Platform>().unwrap(), Platform::Voice);
        assert!("email".parse::<Platform>().is_err());
    }

    #[test]
    fn test_masked_customer() {
        let mut conv = Conversation::new("b1", "+15551234567", Platform::Sms);
        assert_eq!(conv.masked_customer(), "***4567");

        conv.customer_phone = "12".to_string();
        assert_eq!(conv.masked_customer(), "****");
    }
}
