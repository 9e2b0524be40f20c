//! Voice conversation engine
//!
//! Keeps per-call state while Twilio streams a call through the webhooks:
//! language detected from the first utterance, the running transcript, and
//! the buffered media frames from the WebSocket stream. Replies are the
//! same pipeline replies, reshaped for speech. The whole call is persisted
//! as one conversation when it ends.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dashmap::DashMap;
use tracing::{error, info, warn};

use crate::application::language::{self, Language};
use crate::application::responder::Responder;
use crate::domain::{Conversation, Platform};
use crate::errors::{ComptoirError, Result};
use crate::infrastructure::store::Store;

/// Frames of 20ms MULAW audio buffered before recognition (~1 second)
pub const FRAMES_PER_UTTERANCE: usize = 50;

/// Phrases that hand the call to a human immediately
const TRANSFER_KEYWORDS_FR: &[&str] = &[
    "transférer", "transfert", "humain", "personne", "quelqu'un",
    "gérant", "manager", "superviseur", "propriétaire", "patron",
    "parler à", "voir", "rencontrer",
];
const TRANSFER_KEYWORDS_EN: &[&str] = &[
    "transfer", "human", "person", "someone", "manager",
    "supervisor", "owner", "speak to", "talk to", "representative",
    "agent", "operator",
];

/// What the call should do next after an utterance
#[derive(Debug, Clone, PartialEq)]
pub enum VoiceTurn {
    Reply { text: String, language: Language },
    Transfer { language: Language },
}

struct CallContext {
    business_phone: String,
    customer_phone: String,
    language: Language,
    history: Vec<(&'static str, String)>,
    media_buffer: Vec<u8>,
    frames_buffered: usize,
    transferred: bool,
}

pub struct VoiceSystem {
    store: Arc<dyn Store>,
    responder: Arc<Responder>,
    calls: DashMap<String, CallContext>,
}

impl VoiceSystem {
    pub fn new(store: Arc<dyn Store>, responder: Arc<Responder>) -> Self {
        Self {
            store,
            responder,
            calls: DashMap::new(),
        }
    }

    /// Register a new call on pickup
    pub fn start_call(&self, call_sid: &str, business_phone: &str, customer_phone: &str) {
        info!(call_sid, "voice call started");
        self.calls.insert(
            call_sid.to_string(),
            CallContext {
                business_phone: business_phone.to_string(),
                customer_phone: customer_phone.to_string(),
                language: Language::English,
                history: Vec::new(),
                media_buffer: Vec::new(),
                frames_buffered: 0,
                transferred: false,
            },
        );
    }

    pub fn active_calls(&self) -> usize {
        self.calls.len()
    }

    /// Handle one transcribed utterance and decide the next call action
    pub async fn process_speech(&self, call_sid: &str, transcript: &str) -> Result<VoiceTurn> {
        let detected = language::detect(transcript);

        let business_phone = {
            let mut context = self
                .calls
                .get_mut(call_sid)
                .ok_or_else(|| ComptoirError::ValidationError(format!("unknown call {}", call_sid)))?;
            context.language = detected;
            context
                .history
                .push(("customer", transcript.to_string()));
            context.business_phone.clone()
        };

        if wants_transfer(transcript, detected) {
            info!(call_sid, "caller asked for a human");
            if let Some(mut context) = self.calls.get_mut(call_sid) {
                context.transferred = true;
            }
            return Ok(VoiceTurn::Transfer { language: detected });
        }

        let business = self
            .store
            .get_business_by_phone(&business_phone)
            .await?
            .ok_or_else(|| ComptoirError::UnknownBusiness(business_phone.clone()))?;

        let response = self.responder.respond(transcript, &business).await;
        let mut text = optimize_for_voice(&response.text, detected);

        if response.escalate {
            if let Some(mut context) = self.calls.get_mut(call_sid) {
                context.transferred = true;
            }
            text.push_str(match detected {
                Language::French => " Je vais vous transférer à quelqu'un maintenant.",
                Language::English => " Let me transfer you to someone who can help.",
            });
        }

        if let Some(mut context) = self.calls.get_mut(call_sid) {
            context.history.push(("ai", text.clone()));
        }

        Ok(VoiceTurn::Reply {
            text,
            language: detected,
        })
    }

    /// Buffer one base64 media frame from the stream; returns the combined
    /// audio once roughly a second has accumulated.
    pub fn push_media(&self, call_sid: &str, payload_b64: &str) -> Option<Vec<u8>> {
        let frame = match BASE64.decode(payload_b64) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(call_sid, error = %err, "undecodable media frame");
                return None;
            }
        };

        let mut context = self.calls.get_mut(call_sid)?;
        context.media_buffer.extend_from_slice(&frame);
        context.frames_buffered += 1;

        if context.frames_buffered >= FRAMES_PER_UTTERANCE {
            context.frames_buffered = 0;
            Some(std::mem::take(&mut context.media_buffer))
        } else {
            None
        }
    }

    /// The call's current language, for error TwiML
    pub fn call_language(&self, call_sid: &str) -> Language {
        self.calls
            .get(call_sid)
            .map(|c| c.language)
            .unwrap_or(Language::English)
    }

    /// Persist the transcript and drop the call state
    pub async fn end_call(&self, call_sid: &str) {
        let Some((_, context)) = self.calls.remove(call_sid) else {
            return;
        };

        info!(
            call_sid,
            exchanges = context.history.len(),
            "voice call ended"
        );

        if context.history.is_empty() {
            return;
        }

        let business = match self.store.get_business_by_phone(&context.business_phone).await {
            Ok(Some(business)) => business,
            Ok(None) => {
                warn!(call_sid, "no business for ended call, transcript dropped");
                return;
            }
            Err(err) => {
                error!(call_sid, error = %err, "failed to load business for ended call");
                return;
            }
        };

        let transcript = context
            .history
            .iter()
            .map(|(speaker, text)| format!("{}: {}", speaker, text))
            .collect::<Vec<_>>()
            .join("\n");

        let mut conversation =
            Conversation::new(&business.id, &context.customer_phone, Platform::Voice);
        conversation.inbound_message = transcript;
        conversation.outbound_message = "Voice conversation completed".to_string();
        conversation.intent = "voice_call".to_string();
        conversation.language = context.language.as_str().to_string();
        conversation.ai_confidence = 0.9;
        conversation.escalated = context.transferred;

        if let Err(err) = self.store.log_conversation(&conversation).await {
            error!(call_sid, error = %err, "failed to persist voice conversation");
        }
    }
}

fn wants_transfer(transcript: &str, language: Language) -> bool {
    let lower = transcript.to_lowercase();
    let keywords = match language {
        Language::French => TRANSFER_KEYWORDS_FR,
        Language::English => TRANSFER_KEYWORDS_EN,
    };
    keywords.iter().any(|k| lower.contains(k))
}

/// Reshape a text reply for speech: calmer punctuation, at most two
/// sentences, explicit pauses, and spoken-language contractions.
pub fn optimize_for_voice(text: &str, language: Language) -> String {
    let mut text = text.replace('!', ".").replace('?', ".");

    if text.len() > 200 {
        let sentences: Vec<&str> = text.split('.').collect();
        text = sentences
            .iter()
            .take(2)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(". ");
        text.push('.');
    }

    text = text.replace(". ", ". ... ");

    match language {
        Language::French => text
            .replace("Nous sommes", "On est")
            .replace("Pouvez-vous", "Peux-tu"),
        Language::English => text
            .replace("We are", "We're")
            .replace("You can", "You can just"),
    }
}
