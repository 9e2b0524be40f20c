//! Persistence layer
//!
//! The pipeline and the dashboard only talk to the [`Store`] trait; the
//! SQLite implementation lives in [`sqlite`].

pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Booking, BookingStatus, Business, Conversation, Platform};
use crate::errors::Result;

pub use sqlite::SqliteStore;

/// Rolling conversation statistics over a window of days
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationStats {
    pub total_conversations: i64,
    pub today_count: i64,
    pub avg_response_time_ms: f64,
    pub avg_confidence: f64,
    pub escalated_count: i64,
}

/// Per-day counters for the weekly performance chart
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayStats {
    pub voice_calls: i64,
    pub sms_messages: i64,
    pub escalations: i64,
    pub ai_confidence: f64,
}

/// Storage interface
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace a business row
    async fn save_business(&self, business: &Business) -> Result<()>;

    async fn get_business(&self, id: &str) -> Result<Option<Business>>;

    /// Look up the business owning a channel identity (phone number or
    /// Facebook page id)
    async fn get_business_by_phone(&self, phone: &str) -> Result<Option<Business>>;

    async fn business_count(&self) -> Result<i64>;

    /// Log a handled interaction, returning the row id
    async fn log_conversation(&self, conversation: &Conversation) -> Result<i64>;

    async fn recent_conversations(&self, business_id: &str, limit: i64)
        -> Result<Vec<Conversation>>;

    async fn conversation_stats(&self, business_id: &str, days: i64) -> Result<ConversationStats>;

    /// Conversations on a platform since a unix timestamp
    async fn platform_count_since(
        &self,
        business_id: &str,
        platform: Platform,
        since: i64,
    ) -> Result<i64>;

    /// Conversations answered in a language since a unix timestamp
    async fn language_count_since(
        &self,
        business_id: &str,
        language: &str,
        since: i64,
    ) -> Result<i64>;

    async fn escalated_count_since(&self, business_id: &str, since: i64) -> Result<i64>;

    /// Conversation counts per intent over a window of days
    async fn intent_statistics(
        &self,
        business_id: &str,
        days: i64,
    ) -> Result<HashMap<String, i64>>;

    /// Counters for one day, bounded by unix timestamps
    async fn day_stats(&self, business_id: &str, day_start: i64, day_end: i64)
        -> Result<DayStats>;

    /// Create a booking, returning the row id
    async fn create_booking(&self, booking: &Booking) -> Result<i64>;

    async fn bookings_for_business(&self, business_id: &str, limit: i64) -> Result<Vec<Booking>>;

    async fn update_booking_status(&self, booking_id: i64, status: BookingStatus) -> Result<()>;

    /// Append a named metric to the analytics log
    async fn log_metric(
        &self,
        business_id: &str,
        metric_name: &str,
        metric_value: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<()>;
}
