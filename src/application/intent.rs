//! Intent classification
//!
//! Hybrid bilingual classifier: a cheap keyword-frequency pass answers the
//! clear cases, the LLM (driven from the responder) handles ambiguous ones,
//! and a fixed keyword fallback covers LLM outages.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Classified customer intent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Booking,
    Faq,
    Complaint,
    Cancellation,
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Booking => "booking",
            Intent::Faq => "faq",
            Intent::Complaint => "complaint",
            Intent::Cancellation => "cancellation",
            Intent::General => "general",
        }
    }
}

impl std::str::FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "booking" => Ok(Intent::Booking),
            "faq" => Ok(Intent::Faq),
            "complaint" => Ok(Intent::Complaint),
            "cancellation" => Ok(Intent::Cancellation),
            "general" => Ok(Intent::General),
            _ => Err(format!("Unknown intent: {}", s)),
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Classification result carried through the pipeline
#[derive(Debug, Clone)]
pub struct MessageIntent {
    pub intent: Intent,
    pub confidence: f64,
    pub entities: HashMap<String, serde_json::Value>,
    pub requires_escalation: bool,
}

impl MessageIntent {
    pub fn new(intent: Intent, confidence: f64) -> Self {
        Self {
            intent,
            confidence,
            entities: HashMap::new(),
            requires_escalation: false,
        }
    }
}

/// Keyword score above which the keyword pass is trusted outright.
/// Kept low because each bucket carries both languages.
const KEYWORD_THRESHOLD: f64 = 0.2;

/// Confidence assigned when both the keyword pass and the LLM fail
const FALLBACK_CONFIDENCE: f64 = 0.6;

const BOOKING_KEYWORDS: &[&str] = &[
    // English
    "appointment", "book", "schedule", "reserve", "available",
    "time", "slot", "tomorrow", "today", "next week",
    "haircut", "massage", "service", "treatment", "consultation",
    // French
    "rendez-vous", "réserver", "prendre", "disponible", "horaire",
    "coupe", "cheveux", "traitement",
    "demain", "aujourd'hui", "semaine prochaine",
];

const FAQ_KEYWORDS: &[&str] = &[
    // English
    "hours", "open", "closed", "location", "address", "price",
    "cost", "how much", "phone", "contact", "parking",
    "payment", "accept", "credit card", "cash",
    // French
    "heures", "ouvert", "fermé", "adresse", "où", "prix",
    "coût", "combien", "téléphone", "stationnement",
    "paiement", "acceptez", "carte", "comptant",
];

const COMPLAINT_KEYWORDS: &[&str] = &[
    // English
    "disappointed", "terrible", "awful", "worst", "horrible",
    "refund", "money back", "unsatisfied", "angry", "upset",
    "manager", "supervisor", "complaint", "problem",
    // French
    "déçu", "affreux", "pire",
    "remboursement", "insatisfait", "fâché", "contrarié",
    "gérant", "superviseur", "plainte", "problème",
];

const CANCELLATION_KEYWORDS: &[&str] = &[
    // English
    "cancel", "reschedule", "change", "move", "different time",
    // French
    "annuler", "reporter", "changer", "déplacer", "autre heure",
];

/// Patterns that force human escalation regardless of intent
const ESCALATION_TRIGGERS: &[&str] = &[
    // English
    "manager", "supervisor", "owner", "complaint", "legal",
    "lawsuit", "attorney", "refund", "money back",
    "terrible", "awful", "worst", "horrible", "disgusting",
    // French
    "gérant", "superviseur", "propriétaire", "plainte", "légal",
    "poursuites", "avocat", "remboursement",
    "affreux", "pire", "dégoûtant",
];

/// Service names recognized for entity extraction
const SERVICE_WORDS: &[&str] = &[
    "haircut", "massage", "facial", "manicure", "pedicure", "coloring", "styling",
    "coupe", "cheveux", "coloration", "coiffage", "manucure", "pédicure",
];

/// Bilingual keyword-frequency classifier
pub struct IntentClassifier {
    buckets: Vec<(Intent, &'static [&'static str])>,
    time_patterns: Vec<Regex>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        let time_patterns = [
            r"\d{1,2}:?\d{0,2}\s*(am|pm|h)",
            r"\b(tomorrow|today|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
            r"\b(demain|aujourd'hui|lundi|mardi|mercredi|jeudi|vendredi|samedi|dimanche)\b",
            r"(next week|this week|semaine prochaine|cette semaine)",
            r"\d{1,2}/\d{1,2}",
        ]
        .iter()
        .map(|p| Regex::new(p).expect("static time pattern"))
        .collect();

        Self {
            buckets: vec![
                (Intent::Booking, BOOKING_KEYWORDS),
                (Intent::Faq, FAQ_KEYWORDS),
                (Intent::Complaint, COMPLAINT_KEYWORDS),
                (Intent::Cancellation, CANCELLATION_KEYWORDS),
            ],
            time_patterns,
        }
    }

    /// Keyword pass: returns a classification only when a bucket clears the
    /// score threshold.
    pub fn classify_keywords(&self, message: &str) -> Option<MessageIntent> {
        let message_lower = message.to_lowercase();

        let mut top: Option<(Intent, f64)> = None;
        for (intent, keywords) in &self.buckets {
            let hits = keywords
                .iter()
                .filter(|k| message_lower.contains(*k))
                .count();
            if hits == 0 {
                continue;
            }
            let score = hits as f64 / keywords.len() as f64;
            if top.map_or(true, |(_, best)| score > best) {
                top = Some((*intent, score));
            }
        }

        let (intent, score) = top?;
        if score <= KEYWORD_THRESHOLD {
            return None;
        }

        Some(MessageIntent {
            intent,
            confidence: (score * 2.0).min(1.0),
            entities: self.extract_entities(message, intent),
            requires_escalation: self.needs_escalation(message),
        })
    }

    /// Last-resort classification when the LLM is unavailable
    pub fn classify_fallback(&self, message: &str) -> MessageIntent {
        let message_lower = message.to_lowercase();

        let contains_any =
            |words: &[&str]| words.iter().any(|w| message_lower.contains(w));

        let intent = if contains_any(&["book", "appointment", "schedule", "rendez-vous", "réserver"]) {
            Intent::Booking
        } else if contains_any(&["hours", "open", "price", "cost", "heures", "ouvert", "prix"]) {
            Intent::Faq
        } else if contains_any(&["terrible", "awful", "complaint", "affreux", "plainte"]) {
            Intent::Complaint
        } else {
            Intent::General
        };

        MessageIntent {
            intent,
            confidence: FALLBACK_CONFIDENCE,
            entities: self.extract_entities(message, intent),
            requires_escalation: self.needs_escalation(message),
        }
    }

    /// Check whether the message must reach a human
    pub fn needs_escalation(&self, message: &str) -> bool {
        let message_lower = message.to_lowercase();
        ESCALATION_TRIGGERS
            .iter()
            .any(|trigger| message_lower.contains(trigger))
    }

    /// Extract the entities the pipeline acts on, per intent
    pub fn extract_entities(
        &self,
        message: &str,
        intent: Intent,
    ) -> HashMap<String, serde_json::Value> {
        let mut entities = HashMap::new();
        let message_lower = message.to_lowercase();

        match intent {
            Intent::Booking => {
                for pattern in &self.time_patterns {
                    let matches: Vec<String> = pattern
                        .find_iter(&message_lower)
                        .map(|m| m.as_str().to_string())
                        .collect();
                    if !matches.is_empty() {
                        entities.insert("time_references".to_string(), serde_json::json!(matches));
                        break;
                    }
                }

                let services: Vec<&str> = SERVICE_WORDS
                    .iter()
                    .filter(|s| message_lower.contains(*s))
                    .copied()
                    .collect();
                if !services.is_empty() {
                    entities.insert("services".to_string(), serde_json::json!(services));
                }
            }
            Intent::Faq => {
                let question_type = if ["hour", "open", "close", "heure", "ouvert", "fermé"]
                    .iter()
                    .any(|w| message_lower.contains(w))
                {
                    Some("hours")
                } else if ["price", "cost", "much", "prix", "coût", "combien"]
                    .iter()
                    .any(|w| message_lower.contains(w))
                {
                    Some("pricing")
                } else if ["location", "address", "where", "adresse", "où"]
                    .iter()
                    .any(|w| message_lower.contains(w))
                {
                    Some("location")
                } else {
                    None
                };

                if let Some(qt) = question_type {
                    entities.insert("question_type".to_string(), serde_json::json!(qt));
                }
            }
            _ => {}
        }

        entities
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the JSON classification the LLM returns, stripping markdown fences
/// some models insist on wrapping around it.
pub fn parse_llm_classification(
    classifier: &IntentClassifier,
    message: &str,
    raw: &str,
) -> Option<MessageIntent> {
    let cleaned = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let value: serde_json::Value = serde_json::from_str(cleaned).ok()?;
    let intent: Intent = value.get("intent")?.as_str()?.parse().ok()?;
    let confidence = value.get("confidence")?.as_f64()?.clamp(0.0, 1.0);
    let escalate = value
        .get("escalate")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Some(MessageIntent {
        intent,
        confidence,
        entities: classifier.extract_entities(message, intent),
        requires_escalation: escalate || classifier.needs_escalation(message),
    })
}
