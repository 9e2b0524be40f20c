//! Inbound message pipeline
//!
//! One entry point for every channel: look up the business owning the
//! contacted number, generate a reply, persist the conversation, open a
//! booking when the customer named a service and a time, and push the
//! interaction onto the dashboard live feed.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::application::intent::Intent;
use crate::application::responder::{AiResponse, Responder};
use crate::domain::{Booking, Business, Conversation, Platform};
use crate::errors::{ComptoirError, Result};
use crate::infrastructure::store::Store;

const FEED_CAPACITY: usize = 64;

/// A handled interaction, as pushed to dashboard live-feed subscribers
#[derive(Debug, Clone, Serialize)]
pub struct FeedEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub platform: String,
    pub customer_phone: String,
    pub message: String,
    pub language: String,
    pub intent: String,
    pub status: String,
    pub timestamp: i64,
    pub escalated: bool,
}

pub struct MessagePipeline {
    store: Arc<dyn Store>,
    responder: Arc<Responder>,
    feed: broadcast::Sender<FeedEvent>,
}

impl MessagePipeline {
    pub fn new(store: Arc<dyn Store>, responder: Arc<Responder>) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            store,
            responder,
            feed,
        }
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn responder(&self) -> &Arc<Responder> {
        &self.responder
    }

    /// Subscribe to the live feed of handled interactions
    pub fn subscribe_feed(&self) -> broadcast::Receiver<FeedEvent> {
        self.feed.subscribe()
    }

    /// Handle one inbound message end to end and return the reply the
    /// channel should deliver.
    pub async fn handle_inbound(
        &self,
        business_phone: &str,
        customer_phone: &str,
        platform: Platform,
        message: &str,
    ) -> Result<AiResponse> {
        let started = Instant::now();

        let business = self
            .store
            .get_business_by_phone(business_phone)
            .await?
            .ok_or_else(|| ComptoirError::UnknownBusiness(business_phone.to_string()))?;

        let response = self.responder.respond(message, &business).await;
        let response_time_ms = started.elapsed().as_millis() as i64;

        info!(
            business = %business.id,
            platform = %platform,
            intent = %response.intent.intent,
            confidence = response.confidence,
            escalated = response.escalate,
            response_time_ms,
            "message handled"
        );

        if response.intent.intent == Intent::Booking {
            self.maybe_create_booking(&business, customer_phone, &response)
                .await;
        }

        let mut conversation = Conversation::new(&business.id, customer_phone, platform);
        conversation.inbound_message = message.to_string();
        conversation.outbound_message = response.text.clone();
        conversation.intent = response.intent.intent.as_str().to_string();
        conversation.language = response.language.as_str().to_string();
        conversation.ai_confidence = response.confidence;
        conversation.escalated = response.escalate;
        conversation.response_time_ms = response_time_ms;

        match self.store.log_conversation(&conversation).await {
            Ok(id) => {
                conversation.id = id;
                self.publish(&conversation);
            }
            Err(err) => error!(error = %err, "failed to log conversation"),
        }

        if let Err(err) = self
            .store
            .log_metric(
                &business.id,
                "response_time_ms",
                response_time_ms as f64,
                Some(serde_json::json!({"platform": platform.as_str()})),
            )
            .await
        {
            warn!(error = %err, "failed to log response-time metric");
        }

        Ok(response)
    }

    /// Open a pending booking when the message carried both a service and
    /// a time reference. The raw scheduling text is kept as the customer
    /// phrased it for the owner to confirm.
    async fn maybe_create_booking(
        &self,
        business: &Business,
        customer_phone: &str,
        response: &AiResponse,
    ) {
        let service = response
            .intent
            .entities
            .get("services")
            .and_then(|v| v.as_array())
            .and_then(|a| a.first())
            .and_then(|v| v.as_str());

        let scheduled_for = response
            .intent
            .entities
            .get("time_references")
            .and_then(|v| v.as_array())
            .map(|refs| {
                refs.iter()
                    .filter_map(|v| v.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty());

        let (Some(service), Some(scheduled_for)) = (service, scheduled_for) else {
            return;
        };

        let booking = Booking::new(&business.id, customer_phone, service, scheduled_for);
        match self.store.create_booking(&booking).await {
            Ok(id) => info!(booking_id = id, service, "pending booking created"),
            Err(err) => error!(error = %err, "failed to create booking"),
        }
    }

    fn publish(&self, conversation: &Conversation) {
        let event = FeedEvent {
            id: format!("conv_{}", conversation.id),
            platform: conversation.platform.as_str().to_string(),
            customer_phone: conversation.masked_customer(),
            message: conversation.inbound_message.clone(),
            language: conversation.language.clone(),
            intent: conversation.intent.clone(),
            status: if conversation.escalated {
                "Escalated".to_string()
            } else {
                "Resolved".to_string()
            },
            timestamp: conversation.timestamp,
            escalated: conversation.escalated,
        };

        // Only fails when nobody is watching the dashboard
        let _ = self.feed.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::responder::ChatModel;
    use crate::domain::BookingStatus;
    use crate::infrastructure::store::SqliteStore;
    use async_trait::async_trait;

    struct CannedModel(&'static str);

    #[async_trait]
    impl ChatModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }
    }

    async fn pipeline_with(reply: &'static str) -> MessagePipeline {
        let store = SqliteStore::new_in_memory().unwrap();
        let mut business = Business::new("demo_salon_001", "Bella Hair Salon", "+15551234567");
        business.services = vec!["haircut".to_string()];
        store.save_business(&business).await.unwrap();

        let responder = Responder::new(Arc::new(CannedModel(reply)));
        MessagePipeline::new(Arc::new(store), Arc::new(responder))
    }

    #[tokio::test]
    async fn test_inbound_message_is_logged() {
        let pipeline = pipeline_with("We're open Mon-Sat 9am-7pm!").await;

        let response = pipeline
            .handle_inbound(
                "+15551234567",
                "+15557654321",
                Platform::Sms,
                "What are your hours, are you open today, how much does it cost, \
                 is there parking, and what's your address?",
            )
            .await
            .unwrap();

        assert_eq!(response.text, "We're open Mon-Sat 9am-7pm!");

        let logged = pipeline
            .store()
            .recent_conversations("demo_salon_001", 10)
            .await
            .unwrap();
        assert_eq!(logged.len(), 1);
        assert_eq!(logged[0].intent, "faq");
        assert_eq!(logged[0].platform, Platform::Sms);
        assert!(!logged[0].outbound_message.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_business_is_rejected() {
        let pipeline = pipeline_with("hello").await;

        let err = pipeline
            .handle_inbound("+19990000000", "+15557654321", Platform::Sms, "hi")
            .await
            .unwrap_err();

        assert!(matches!(err, ComptoirError::UnknownBusiness(_)));
    }

    #[tokio::test]
    async fn test_booking_row_created_from_entities() {
        let pipeline = pipeline_with("Booked! See you Friday.").await;

        pipeline
            .handle_inbound(
                "+15551234567",
                "+15557654321",
                Platform::Sms,
                "Can I book an appointment to schedule a haircut service tomorrow, \
                 any time slot available?",
            )
            .await
            .unwrap();

        let bookings = pipeline
            .store()
            .bookings_for_business("demo_salon_001", 10)
            .await
            .unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].service, "haircut");
        assert_eq!(bookings[0].status, BookingStatus::Pending);
        assert!(!bookings[0].scheduled_for.is_empty());
    }

    #[tokio::test]
    async fn test_feed_event_published() {
        let pipeline = pipeline_with("Bonjour! On ouvre à 9h.").await;
        let mut feed = pipeline.subscribe_feed();

        pipeline
            .handle_inbound(
                "+15551234567",
                "+15557654321",
                Platform::Facebook,
                "Bonjour, vous êtes ouvert? Quelles sont vos heures, combien le prix, \
                 et quelle est l'adresse et le stationnement?",
            )
            .await
            .unwrap();

        let event = feed.try_recv().unwrap();
        assert_eq!(event.platform, "facebook");
        assert_eq!(event.customer_phone, "***4321");
        assert_eq!(event.language, "french");
        assert!(!event.escalated);
        assert_eq!(event.status, "Resolved");
    }
}
