//! Application layer: language detection, intent classification, prompt
//! assembly, reply generation, and the per-channel orchestration on top.

pub mod intent;
pub mod language;
pub mod pipeline;
pub mod prompts;
pub mod responder;
pub mod voice;

pub use intent::{Intent, IntentClassifier, MessageIntent};
pub use language::Language;
pub use pipeline::{FeedEvent, MessagePipeline};
pub use responder::{AiResponse, ChatModel, Responder};
pub use voice::{VoiceSystem, VoiceTurn};
