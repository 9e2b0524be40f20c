//! SQLite storage
//!
//! Single-file database behind a connection mutex; every query runs on the
//! blocking thread pool. Schema is created on open, so a fresh deployment
//! needs no migration step.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::Connection;

use crate::domain::{Booking, BookingStatus, Business, Conversation, Platform};
use crate::errors::{ComptoirError, Result};
use crate::infrastructure::store::{ConversationStats, DayStats, Store};

/// SQLite-backed store
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (and create if missing) the database file
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory database for tests
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ComptoirError::StorageError(format!("database lock poisoned: {}", e)))?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS businesses (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone TEXT UNIQUE NOT NULL,
                kind TEXT NOT NULL DEFAULT 'service',
                services TEXT NOT NULL DEFAULT '[]',
                hours TEXT NOT NULL DEFAULT 'Mon-Fri 9am-6pm',
                address TEXT NOT NULL DEFAULT '',
                faq_data TEXT NOT NULL DEFAULT '{}',
                pricing_data TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                platform TEXT NOT NULL DEFAULT 'sms',
                inbound_message TEXT NOT NULL,
                outbound_message TEXT NOT NULL DEFAULT '',
                intent TEXT NOT NULL DEFAULT 'general',
                language TEXT NOT NULL DEFAULT 'english',
                ai_confidence REAL NOT NULL DEFAULT 0,
                escalated INTEGER NOT NULL DEFAULT 0,
                response_time_ms INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY (business_id) REFERENCES businesses (id)
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                customer_name TEXT,
                service TEXT NOT NULL,
                scheduled_for TEXT NOT NULL DEFAULT '',
                duration_minutes INTEGER NOT NULL DEFAULT 60,
                status TEXT NOT NULL DEFAULT 'pending',
                notes TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (business_id) REFERENCES businesses (id)
            );

            CREATE TABLE IF NOT EXISTS analytics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                business_id TEXT NOT NULL,
                metric_name TEXT NOT NULL,
                metric_value REAL NOT NULL,
                metadata TEXT,
                timestamp INTEGER NOT NULL,
                FOREIGN KEY (business_id) REFERENCES businesses (id)
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_business
                ON conversations(business_id, timestamp);
            CREATE INDEX IF NOT EXISTS idx_bookings_business
                ON bookings(business_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_analytics_business
                ON analytics(business_id, metric_name, timestamp);
            ",
        )?;

        Ok(())
    }

    /// Run a query on the blocking thread pool
    async fn execute<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|e| ComptoirError::StorageError(format!("database lock poisoned: {}", e)))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| ComptoirError::StorageError(format!("blocking task failed: {}", e)))?
    }
}

fn row_to_business(row: &rusqlite::Row<'_>) -> rusqlite::Result<Business> {
    let services: String = row.get(4)?;
    let faq: String = row.get(7)?;
    let pricing: String = row.get(8)?;

    Ok(Business {
        id: row.get(0)?,
        name: row.get(1)?,
        phone: row.get(2)?,
        kind: row.get(3)?,
        services: serde_json::from_str(&services).unwrap_or_default(),
        hours: row.get(5)?,
        address: row.get(6)?,
        faq: serde_json::from_str(&faq).unwrap_or_default(),
        pricing: serde_json::from_str(&pricing).unwrap_or_default(),
        created_at: row.get(9)?,
    })
}

fn row_to_conversation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Conversation> {
    let platform: String = row.get(3)?;

    Ok(Conversation {
        id: row.get(0)?,
        business_id: row.get(1)?,
        customer_phone: row.get(2)?,
        platform: platform.parse().unwrap_or(Platform::Sms),
        inbound_message: row.get(4)?,
        outbound_message: row.get(5)?,
        intent: row.get(6)?,
        language: row.get(7)?,
        ai_confidence: row.get(8)?,
        escalated: row.get(9)?,
        response_time_ms: row.get(10)?,
        timestamp: row.get(11)?,
    })
}

fn row_to_booking(row: &rusqlite::Row<'_>) -> rusqlite::Result<Booking> {
    let status: String = row.get(7)?;

    Ok(Booking {
        id: row.get(0)?,
        business_id: row.get(1)?,
        customer_phone: row.get(2)?,
        customer_name: row.get(3)?,
        service: row.get(4)?,
        scheduled_for: row.get(5)?,
        duration_minutes: row.get(6)?,
        status: status.parse().unwrap_or(BookingStatus::Pending),
        notes: row.get(8)?,
        created_at: row.get(9)?,
    })
}

const BUSINESS_COLUMNS: &str =
    "id, name, phone, kind, services, hours, address, faq_data, pricing_data, created_at";
const CONVERSATION_COLUMNS: &str = "id, business_id, customer_phone, platform, inbound_message, \
     outbound_message, intent, language, ai_confidence, escalated, response_time_ms, timestamp";
const BOOKING_COLUMNS: &str = "id, business_id, customer_phone, customer_name, service, \
     scheduled_for, duration_minutes, status, notes, created_at";

/// Unix timestamp for the start of today (UTC)
pub fn start_of_today() -> i64 {
    let now = chrono::Utc::now();
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc().timestamp())
        .unwrap_or_else(|| now.timestamp())
}

#[async_trait]
impl Store for SqliteStore {
    async fn save_business(&self, business: &Business) -> Result<()> {
        let business = business.clone();
        self.execute(move |conn| {
            let services = serde_json::to_string(&business.services).unwrap_or_default();
            let faq = serde_json::to_string(&business.faq).unwrap_or_default();
            let pricing = serde_json::to_string(&business.pricing).unwrap_or_default();

            conn.execute(
                "INSERT OR REPLACE INTO businesses
                 (id, name, phone, kind, services, hours, address, faq_data, pricing_data, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                rusqlite::params![
                    &business.id,
                    &business.name,
                    &business.phone,
                    &business.kind,
                    services,
                    &business.hours,
                    &business.address,
                    faq,
                    pricing,
                    business.created_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_business(&self, id: &str) -> Result<Option<Business>> {
        let id = id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {} FROM businesses WHERE id = ?1", BUSINESS_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row([&id], row_to_business) {
                Ok(business) => Ok(Some(business)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_business_by_phone(&self, phone: &str) -> Result<Option<Business>> {
        let phone = phone.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {} FROM businesses WHERE phone = ?1", BUSINESS_COLUMNS);
            let mut stmt = conn.prepare(&sql)?;
            match stmt.query_row([&phone], row_to_business) {
                Ok(business) => Ok(Some(business)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn business_count(&self) -> Result<i64> {
        self.execute(|conn| {
            let count = conn.query_row("SELECT COUNT(*) FROM businesses", [], |row| row.get(0))?;
            Ok(count)
        })
        .await
    }

    async fn log_conversation(&self, conversation: &Conversation) -> Result<i64> {
        let conversation = conversation.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO conversations
                 (business_id, customer_phone, platform, inbound_message, outbound_message,
                  intent, language, ai_confidence, escalated, response_time_ms, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                rusqlite::params![
                    &conversation.business_id,
                    &conversation.customer_phone,
                    conversation.platform.as_str(),
                    &conversation.inbound_message,
                    &conversation.outbound_message,
                    &conversation.intent,
                    &conversation.language,
                    conversation.ai_confidence,
                    conversation.escalated,
                    conversation.response_time_ms,
                    conversation.timestamp,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn recent_conversations(
        &self,
        business_id: &str,
        limit: i64,
    ) -> Result<Vec<Conversation>> {
        let business_id = business_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {} FROM conversations
                 WHERE business_id = ?1
                 ORDER BY timestamp DESC, id DESC
                 LIMIT ?2",
                CONVERSATION_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![&business_id, limit], row_to_conversation)?;

            let mut conversations = Vec::new();
            for conversation in rows {
                conversations.push(conversation?);
            }
            Ok(conversations)
        })
        .await
    }

    async fn conversation_stats(&self, business_id: &str, days: i64) -> Result<ConversationStats> {
        let business_id = business_id.to_string();
        let since = chrono::Utc::now().timestamp() - days * 86_400;
        let today = start_of_today();

        self.execute(move |conn| {
            let stats = conn.query_row(
                "SELECT
                    COUNT(*),
                    COUNT(CASE WHEN timestamp >= ?3 THEN 1 END),
                    COALESCE(AVG(response_time_ms), 0),
                    COALESCE(AVG(ai_confidence), 0),
                    COUNT(CASE WHEN escalated = 1 THEN 1 END)
                 FROM conversations
                 WHERE business_id = ?1 AND timestamp > ?2",
                rusqlite::params![&business_id, since, today],
                |row| {
                    Ok(ConversationStats {
                        total_conversations: row.get(0)?,
                        today_count: row.get(1)?,
                        avg_response_time_ms: row.get(2)?,
                        avg_confidence: row.get(3)?,
                        escalated_count: row.get(4)?,
                    })
                },
            )?;
            Ok(stats)
        })
        .await
    }

    async fn platform_count_since(
        &self,
        business_id: &str,
        platform: Platform,
        since: i64,
    ) -> Result<i64> {
        let business_id = business_id.to_string();
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM conversations
                 WHERE business_id = ?1 AND platform = ?2 AND timestamp >= ?3",
                rusqlite::params![&business_id, platform.as_str(), since],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn language_count_since(
        &self,
        business_id: &str,
        language: &str,
        since: i64,
    ) -> Result<i64> {
        let business_id = business_id.to_string();
        let language = language.to_string();
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM conversations
                 WHERE business_id = ?1 AND language = ?2 AND timestamp >= ?3",
                rusqlite::params![&business_id, &language, since],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn escalated_count_since(&self, business_id: &str, since: i64) -> Result<i64> {
        let business_id = business_id.to_string();
        self.execute(move |conn| {
            let count = conn.query_row(
                "SELECT COUNT(*) FROM conversations
                 WHERE business_id = ?1 AND escalated = 1 AND timestamp >= ?2",
                rusqlite::params![&business_id, since],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    async fn intent_statistics(
        &self,
        business_id: &str,
        days: i64,
    ) -> Result<HashMap<String, i64>> {
        let business_id = business_id.to_string();
        let since = chrono::Utc::now().timestamp() - days * 86_400;

        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT intent, COUNT(*) FROM conversations
                 WHERE business_id = ?1 AND timestamp > ?2
                 GROUP BY intent",
            )?;
            let rows = stmt.query_map(rusqlite::params![&business_id, since], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut stats = HashMap::new();
            for row in rows {
                let (intent, count) = row?;
                stats.insert(intent, count);
            }
            Ok(stats)
        })
        .await
    }

    async fn day_stats(
        &self,
        business_id: &str,
        day_start: i64,
        day_end: i64,
    ) -> Result<DayStats> {
        let business_id = business_id.to_string();
        self.execute(move |conn| {
            let stats = conn.query_row(
                "SELECT
                    COUNT(CASE WHEN platform = 'voice' THEN 1 END),
                    COUNT(CASE WHEN platform = 'sms' THEN 1 END),
                    COUNT(CASE WHEN escalated = 1 THEN 1 END),
                    COALESCE(AVG(ai_confidence), 0)
                 FROM conversations
                 WHERE business_id = ?1 AND timestamp >= ?2 AND timestamp < ?3",
                rusqlite::params![&business_id, day_start, day_end],
                |row| {
                    Ok(DayStats {
                        voice_calls: row.get(0)?,
                        sms_messages: row.get(1)?,
                        escalations: row.get(2)?,
                        ai_confidence: row.get(3)?,
                    })
                },
            )?;
            Ok(stats)
        })
        .await
    }

    async fn create_booking(&self, booking: &Booking) -> Result<i64> {
        let booking = booking.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO bookings
                 (business_id, customer_phone, customer_name, service,
                  scheduled_for, duration_minutes, status, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                rusqlite::params![
                    &booking.business_id,
                    &booking.customer_phone,
                    booking.customer_name.as_deref(),
                    &booking.service,
                    &booking.scheduled_for,
                    booking.duration_minutes,
                    booking.status.as_str(),
                    &booking.notes,
                    booking.created_at,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn bookings_for_business(&self, business_id: &str, limit: i64) -> Result<Vec<Booking>> {
        let business_id = business_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {} FROM bookings
                 WHERE business_id = ?1
                 ORDER BY created_at DESC, id DESC
                 LIMIT ?2",
                BOOKING_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(rusqlite::params![&business_id, limit], row_to_booking)?;

            let mut bookings = Vec::new();
            for booking in rows {
                bookings.push(booking?);
            }
            Ok(bookings)
        })
        .await
    }

    async fn update_booking_status(&self, booking_id: i64, status: BookingStatus) -> Result<()> {
        self.execute(move |conn| {
            let updated = conn.execute(
                "UPDATE bookings SET status = ?1 WHERE id = ?2",
                rusqlite::params![status.as_str(), booking_id],
            )?;
            if updated == 0 {
                return Err(ComptoirError::StorageError(format!(
                    "booking {} not found",
                    booking_id
                )));
            }
            Ok(())
        })
        .await
    }

    async fn log_metric(
        &self,
        business_id: &str,
        metric_name: &str,
        metric_value: f64,
        metadata: Option<serde_json::Value>,
    ) -> Result<()> {
        let business_id = business_id.to_string();
        let metric_name = metric_name.to_string();
        let metadata = metadata.map(|m| m.to_string());
        let timestamp = chrono::Utc::now().timestamp();

        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO analytics (business_id, metric_name, metric_value, metadata, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![&business_id, &metric_name, metric_value, metadata, timestamp],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_business() -> Business {
        let mut business = Business::new("demo_salon_001", "Bella Hair Salon", "+15551234567");
        business.kind = "hair_salon".to_string();
        business.services = vec!["haircut".to_string(), "coloring".to_string()];
        business
    }

    fn sample_conversation(business_id: &str) -> Conversation {
        let mut conversation = Conversation::new(business_id, "+15557654321", Platform::Sms);
        conversation.inbound_message = "What are your hours?".to_string();
        conversation.outbound_message = "Mon-Sat 9am-7pm!".to_string();
        conversation.intent = "faq".to_string();
        conversation.ai_confidence = 0.9;
        conversation.response_time_ms = 420;
        conversation
    }

    #[tokio::test]
    async fn test_business_round_trip() {
        let store = SqliteStore::new_in_memory().unwrap();
        let business = sample_business();
        store.save_business(&business).await.unwrap();

        let loaded = store
            .get_business_by_phone("+15551234567")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded.id, "demo_salon_001");
        assert_eq!(loaded.services, vec!["haircut", "coloring"]);

        assert!(store.get_business_by_phone("+10000000000").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_business_is_upsert() {
        let store = SqliteStore::new_in_memory().unwrap();
        let mut business = sample_business();
        store.save_business(&business).await.unwrap();

        business.hours = "Tue-Sun 10am-8pm".to_string();
        store.save_business(&business).await.unwrap();

        assert_eq!(store.business_count().await.unwrap(), 1);
        let loaded = store.get_business("demo_salon_001").await.unwrap().unwrap();
        assert_eq!(loaded.hours, "Tue-Sun 10am-8pm");
    }

    #[tokio::test]
    async fn test_conversation_logging_and_stats() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.save_business(&sample_business()).await.unwrap();

        let mut conversation = sample_conversation("demo_salon_001");
        let id = store.log_conversation(&conversation).await.unwrap();
        assert!(id > 0);

        conversation.escalated = true;
        conversation.platform = Platform::Voice;
        store.log_conversation(&conversation).await.unwrap();

        let stats = store.conversation_stats("demo_salon_001", 7).await.unwrap();
        assert_eq!(stats.total_conversations, 2);
        assert_eq!(stats.escalated_count, 1);
        assert!(stats.avg_confidence > 0.8);

        let recent = store.recent_conversations("demo_salon_001", 10).await.unwrap();
        assert_eq!(recent.len(), 2);

        let voice = store
            .platform_count_since("demo_salon_001", Platform::Voice, 0)
            .await
            .unwrap();
        assert_eq!(voice, 1);
    }

    #[tokio::test]
    async fn test_language_and_intent_counters() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.save_business(&sample_business()).await.unwrap();

        let mut conversation = sample_conversation("demo_salon_001");
        conversation.language = "french".to_string();
        conversation.intent = "booking".to_string();
        store.log_conversation(&conversation).await.unwrap();
        store.log_conversation(&conversation).await.unwrap();

        conversation.language = "english".to_string();
        conversation.intent = "faq".to_string();
        store.log_conversation(&conversation).await.unwrap();

        let french = store
            .language_count_since("demo_salon_001", "french", 0)
            .await
            .unwrap();
        assert_eq!(french, 2);

        let intents = store.intent_statistics("demo_salon_001", 30).await.unwrap();
        assert_eq!(intents["booking"], 2);
        assert_eq!(intents["faq"], 1);
    }

    #[tokio::test]
    async fn test_booking_lifecycle() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.save_business(&sample_business()).await.unwrap();

        let booking = Booking::new("demo_salon_001", "+15557654321", "haircut", "friday 2pm");
        let id = store.create_booking(&booking).await.unwrap();

        store
            .update_booking_status(id, BookingStatus::Confirmed)
            .await
            .unwrap();

        let bookings = store.bookings_for_business("demo_salon_001", 10).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].status, BookingStatus::Confirmed);

        assert!(store
            .update_booking_status(9999, BookingStatus::Cancelled)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_metrics_log() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.save_business(&sample_business()).await.unwrap();

        store
            .log_metric(
                "demo_salon_001",
                "response_time_ms",
                420.0,
                Some(serde_json::json!({"platform": "sms"})),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_day_stats_window() {
        let store = SqliteStore::new_in_memory().unwrap();
        store.save_business(&sample_business()).await.unwrap();

        let mut conversation = sample_conversation("demo_salon_001");
        conversation.timestamp = 1_000;
        store.log_conversation(&conversation).await.unwrap();

        conversation.platform = Platform::Voice;
        conversation.timestamp = 5_000;
        store.log_conversation(&conversation).await.unwrap();

        let stats = store.day_stats("demo_salon_001", 0, 2_000).await.unwrap();
        assert_eq!(stats.sms_messages, 1);
        assert_eq!(stats.voice_calls, 0);

        let stats = store.day_stats("demo_salon_001", 0, 10_000).await.unwrap();
        assert_eq!(stats.voice_calls, 1);
    }
}
