//! Bilingual AI customer-service bridge for small businesses.
//!
//! Answers customers in French or English over SMS, phone calls and
//! Facebook Messenger on behalf of one business:
//!
//! - classify each message (booking, FAQ, complaint, cancellation)
//! - generate a reply with an LLM, grounded in the business profile
//! - escalate to a human when the customer or the intent demands it
//! - persist every conversation in SQLite for the owner dashboard
//!
//! # Layers
//!
//! - `domain`: the records that flow through the system
//! - `application`: language, intents, prompts, the reply pipeline and
//!   the voice call engine
//! - `infrastructure`: SQLite, the LLM client, channel clients, speech,
//!   TwiML, and the axum web server

pub mod application;
pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod errors;
pub mod infrastructure;

pub use application::{
    AiResponse, ChatModel, FeedEvent, Intent, IntentClassifier, Language, MessageIntent,
    MessagePipeline, Responder, VoiceSystem, VoiceTurn,
};
pub use config::AppConfig;
pub use domain::{Booking, BookingStatus, Business, Conversation, Platform};
pub use errors::{ComptoirError, Result};
pub use infrastructure::{
    create_router, start_web_server, AppState, FacebookClient, LlmClient, SmsClient, SpeechClient,
    SqliteStore, Store,
};

/// Crate version, for the service info endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
