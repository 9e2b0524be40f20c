//! Facebook Messenger channel
//!
//! Sends replies through the Graph API and parses the webhook payloads
//! Messenger delivers. Like the SMS client, an unconfigured token turns
//! delivery into a logged no-op.

use serde::Deserialize;
use tracing::{info, warn};

use crate::errors::{ComptoirError, Result};

const GRAPH_API_BASE: &str = "https://graph.facebook.com/v18.0";

#[derive(Clone)]
pub struct FacebookClient {
    access_token: Option<String>,
    verify_token: String,
    http: reqwest::Client,
}

/// One text message lifted out of a webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessengerMessage {
    pub sender_id: String,
    pub recipient_id: String,
    pub text: String,
    pub message_id: String,
}

#[derive(Deserialize)]
struct WebhookPayload {
    #[serde(default)]
    entry: Vec<WebhookEntry>,
}

#[derive(Deserialize)]
struct WebhookEntry {
    #[serde(default)]
    messaging: Vec<MessagingEvent>,
}

#[derive(Deserialize)]
struct MessagingEvent {
    sender: Participant,
    recipient: Participant,
    message: Option<MessageContent>,
}

#[derive(Deserialize)]
struct Participant {
    id: String,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    text: String,
    #[serde(default)]
    mid: String,
}

#[derive(Deserialize)]
struct SendResponse {
    message_id: Option<String>,
}

impl FacebookClient {
    pub fn new(access_token: Option<String>, verify_token: String) -> Self {
        let access_token = access_token.filter(|t| !t.is_empty());
        if access_token.is_none() {
            warn!("Facebook access token not configured, Messenger delivery disabled");
        }

        Self {
            access_token,
            verify_token,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.access_token.is_some()
    }

    /// Webhook subscription handshake check
    pub fn verify_token(&self, token: &str) -> bool {
        token == self.verify_token
    }

    /// Send a Messenger reply, returning the message id
    pub async fn send_message(&self, recipient_id: &str, text: &str) -> Result<String> {
        let Some(token) = &self.access_token else {
            info!(recipient = %recipient_id, "Messenger delivery skipped (not configured)");
            return Ok(String::new());
        };

        let url = format!("{}/me/messages", GRAPH_API_BASE);
        let payload = serde_json::json!({
            "recipient": {"id": recipient_id},
            "message": {"text": text},
            "messaging_type": "RESPONSE",
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ComptoirError::NetworkError(format!("Graph API request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ComptoirError::ChannelError(format!(
                "Graph API returned {}: {}",
                status, body
            )));
        }

        let sent: SendResponse = response
            .json()
            .await
            .map_err(|e| ComptoirError::ChannelError(format!("bad Graph API response: {}", e)))?;

        let message_id = sent.message_id.unwrap_or_default();
        info!(message_id = %message_id, "Messenger reply sent");
        Ok(message_id)
    }
}

/// Extract the text messages from a webhook delivery. Non-message events
/// (delivery receipts, read markers) are skipped.
pub fn parse_webhook(payload: &serde_json::Value) -> Vec<InboundMessengerMessage> {
    let parsed: WebhookPayload = match serde_json::from_value(payload.clone()) {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(error = %err, "unparseable Facebook webhook payload");
            return Vec::new();
        }
    };

    parsed
        .entry
        .into_iter()
        .flat_map(|entry| entry.messaging)
        .filter_map(|event| {
            let message = event.message?;
            if message.text.is_empty() {
                return None;
            }
            Some(InboundMessengerMessage {
                sender_id: event.sender.id,
                recipient_id: event.recipient.id,
                text: message.text,
                message_id: message.mid,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_token() {
        let client = FacebookClient::new(None, "my_secret_token".to_string());
        assert!(client.verify_token("my_secret_token"));
        assert!(!client.verify_token("wrong"));
        assert!(!client.is_configured());
    }

    #[test]
    fn test_parse_webhook() {
        let payload = serde_json::json!({
            "object": "page",
            "entry": [{
                "id": "page_123",
                "messaging": [
                    {
                        "sender": {"id": "user_456"},
                        "recipient": {"id": "page_123"},
                        "message": {"mid": "m_789", "text": "Bonjour!"}
                    },
                    {
                        "sender": {"id": "user_456"},
                        "recipient": {"id": "page_123"},
                        "delivery": {"mids": ["m_788"]}
                    }
                ]
            }]
        });

        let messages = parse_webhook(&payload);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id, "user_456");
        assert_eq!(messages[0].recipient_id, "page_123");
        assert_eq!(messages[0].text, "Bonjour!");
    }

    #[test]
    fn test_parse_webhook_garbage() {
        assert!(parse_webhook(&serde_json::json!({"entry": "nope"})).is_empty());
        assert!(parse_webhook(&serde_json::json!({})).is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_send_is_noop() {
        let client = FacebookClient::new(None, "tok".to_string());
        let id = client.send_message("user_456", "hi").await.unwrap();
        assert!(id.is_empty());
    }
}
