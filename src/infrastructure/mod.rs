//! Infrastructure layer: everything that talks to the outside world.
//!
//! - `store`: SQLite persistence behind the [`store::Store`] trait
//! - `llm`: OpenAI-compatible chat completion client
//! - `sms` / `facebook`: outbound channel clients and webhook parsing
//! - `speech`: Google speech recognition and synthesis for calls
//! - `twiml`: Twilio call-control document builders
//! - `web`: the axum server tying the webhooks and dashboard together

pub mod facebook;
pub mod llm;
pub mod logger;
pub mod sms;
pub mod speech;
pub mod store;
pub mod twiml;
pub mod web;

pub use facebook::FacebookClient;
pub use llm::LlmClient;
pub use sms::SmsClient;
pub use speech::SpeechClient;
pub use store::{SqliteStore, Store};
pub use web::{create_router, start_web_server, AppState};
