//! Reply generation
//!
//! Detects the customer's language, classifies the message (keyword pass
//! first, LLM for ambiguous cases, keyword fallback when the LLM is down)
//! and produces the outbound reply. Every failure path still yields a
//! polite reply in the customer's language.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::application::intent::{
    parse_llm_classification, Intent, IntentClassifier, MessageIntent,
};
use crate::application::language::{self, Language};
use crate::application::prompts;
use crate::domain::Business;

/// Chat-completion seam, so reply logic can be exercised without a network
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;
}

/// A generated reply, ready to send and log
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub text: String,
    pub confidence: f64,
    pub intent: MessageIntent,
    pub language: Language,
    pub escalate: bool,
}

pub struct Responder {
    model: Arc<dyn ChatModel>,
    classifier: IntentClassifier,
}

impl Responder {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            classifier: IntentClassifier::new(),
        }
    }

    /// Hybrid classification: keywords, then LLM, then keyword fallback
    pub async fn classify(&self, message: &str, business: &Business) -> MessageIntent {
        if let Some(intent) = self.classifier.classify_keywords(message) {
            debug!(intent = %intent.intent, confidence = intent.confidence, "keyword classification");
            return intent;
        }

        let language = language::detect(message);
        let prompt = prompts::classification_prompt(message, business, language);
        match self.model.complete(&prompt).await {
            Ok(raw) => match parse_llm_classification(&self.classifier, message, &raw) {
                Some(intent) => intent,
                None => {
                    warn!("LLM classification unparseable, using keyword fallback");
                    self.classifier.classify_fallback(message)
                }
            },
            Err(err) => {
                warn!(error = %err, "LLM classification failed, using keyword fallback");
                self.classifier.classify_fallback(message)
            }
        }
    }

    /// Full pass: classify the message and generate the reply
    pub async fn respond(&self, message: &str, business: &Business) -> AiResponse {
        let language = language::detect(message);
        let intent = self.classify(message, business).await;
        let escalate = intent.requires_escalation || intent.intent == Intent::Complaint;

        let prompt = prompts::reply_prompt(message, business, &intent, language);
        let (text, confidence) = match self.model.complete(&prompt).await {
            Ok(raw) => {
                let trimmed = raw.trim().to_string();
                if trimmed.is_empty() {
                    (prompts::fallback_reply(language).to_string(), intent.confidence)
                } else {
                    (trimmed, intent.confidence)
                }
            }
            Err(err) => {
                warn!(error = %err, "LLM reply failed, sending canned reply");
                (prompts::error_reply(language).to_string(), 0.6)
            }
        };

        AiResponse {
            text,
            confidence,
            intent,
            language,
            escalate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedModel(&'static str);

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ChatModel for FailingModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            anyhow::bail!("connection refused")
        }
    }

    fn salon() -> Business {
        let mut business = Business::new("b1", "Bella Hair Salon", "+15551234567");
        business.services = vec!["haircut".to_string()];
        business
    }

    #[tokio::test]
    async fn test_respond_uses_model_reply() {
        let responder = Responder::new(Arc::new(CannedModel("See you Friday at 2pm!")));
        let response = responder
            .respond(
                "Can I book an appointment to schedule a haircut service tomorrow, \
                 any time slot available?",
                &salon(),
            )
            .await;

        assert_eq!(response.text, "See you Friday at 2pm!");
        assert_eq!(response.intent.intent, Intent::Booking);
        assert_eq!(response.language, Language::English);
        assert!(!response.escalate);
    }

    #[tokio::test]
    async fn test_respond_french_error_fallback() {
        let responder = Responder::new(Arc::new(FailingModel));
        let response = responder
            .respond("Bonjour, j'aimerais une coupe de cheveux svp", &salon())
            .await;

        assert_eq!(response.language, Language::French);
        assert!(response.text.contains("Merci"));
        assert_eq!(response.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_complaint_always_escalates() {
        let responder = Responder::new(Arc::new(CannedModel(
            "We're so sorry to hear that. The owner will call you today.",
        )));
        let response = responder
            .respond(
                "This is terrible and awful, the worst experience, I'm angry and upset, \
                 I want a refund and the manager",
                &salon(),
            )
            .await;

        assert_eq!(response.intent.intent, Intent::Complaint);
        assert!(response.escalate);
    }

    #[tokio::test]
    async fn test_ambiguous_message_classified_by_llm() {
        let responder = Responder::new(Arc::new(CannedModel(
            r#"{"intent": "general", "confidence": 0.7, "reason": "greeting", "escalate": false}"#,
        )));
        let intent = responder.classify("hey!", &salon()).await;

        assert_eq!(intent.intent, Intent::General);
        assert_eq!(intent.confidence, 0.7);
    }

    #[tokio::test]
    async fn test_llm_down_falls_back_to_keywords() {
        let responder = Responder::new(Arc::new(FailingModel));
        let intent = responder.classify("can you book me in?", &salon()).await;

        assert_eq!(intent.intent, Intent::Booking);
        assert_eq!(intent.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_empty_model_reply_gets_canned_text() {
        let responder = Responder::new(Arc::new(CannedModel("   ")));
        let response = responder.respond("hi, quick question", &salon()).await;

        assert!(response.text.contains("Thanks for reaching out"));
    }
}
