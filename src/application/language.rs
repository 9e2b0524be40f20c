//! French/English detection
//!
//! Word-count heuristic tuned for Quebec customers: two or more hits from
//! the French indicator list and the message is answered in French.

use serde::{Deserialize, Serialize};

/// Customer language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    French,
    English,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::French => "french",
            Language::English => "english",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "french" | "fr" | "fr-ca" => Ok(Language::French),
            "english" | "en" | "en-ca" | "en-us" => Ok(Language::English),
            _ => Err(format!("Unknown language: {}", s)),
        }
    }
}

/// French indicator words: greetings, question words, common function words,
/// and the business vocabulary customers actually use.
const FRENCH_WORDS: &[&str] = &[
    // Greetings & politeness
    "bonjour", "bonsoir", "salut", "merci", "svp", "s'il vous plaît", "allô", "allo",
    // Question words
    "comment", "quand", "où", "pourquoi", "combien", "quel", "quelle",
    // Common words
    "oui", "non", "je", "nous", "vous", "ils", "elles",
    "une", "des", "et", "ou", "mais", "avec", "sans",
    // Business specific
    "heures", "ouvert", "fermé", "prix", "coût", "rendez-vous",
    "coupe", "cheveux", "salon", "adresse", "téléphone",
    // Action words
    "j'aimerais", "j'ai besoin", "pouvez-vous", "êtes-vous",
    "voudrais", "cherche", "veux", "avoir", "être",
];

/// Detect the customer's language from a message or transcript
pub fn detect(message: &str) -> Language {
    let message_lower = message.to_lowercase();

    let french_count = FRENCH_WORDS
        .iter()
        .filter(|word| message_lower.contains(*word))
        .count();

    if french_count >= 2 {
        Language::French
    } else {
        Language::English
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_french() {
        assert_eq!(
            detect("Bonjour, quelles sont vos heures d'ouverture?"),
            Language::French
        );
        assert_eq!(
            detect("J'aimerais prendre un rendez-vous pour une coupe"),
            Language::French
        );
    }

    #[test]
    fn test_detect_english() {
        assert_eq!(detect("What are your hours?"), Language::English);
        assert_eq!(detect("I'd like to book a haircut"), Language::English);
    }

    #[test]
    fn test_single_french_word_stays_english() {
        // "merci" alone is common in English-language messages from Quebec
        assert_eq!(detect("Thanks so much, merci!"), Language::English);
    }

    #[test]
    fn test_empty_message_defaults_english() {
        assert_eq!(detect(""), Language::English);
    }
}
