//! Business entity
//!
//! One row per business the bridge answers for. Services, FAQ and pricing
//! are stored as JSON blobs in SQLite, so they stay schemaless maps here.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A business served by the bridge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Business {
    pub id: String,
    pub name: String,
    /// Channel identity: E.164 phone number or Facebook page id
    pub phone: String,
    /// Free-form kind, e.g. "hair_salon"
    pub kind: String,
    pub services: Vec<String>,
    pub hours: String,
    pub address: String,
    /// FAQ entries keyed by topic
    pub faq: HashMap<String, serde_json::Value>,
    /// Price tags keyed by service
    pub pricing: HashMap<String, String>,
    pub created_at: i64,
}

impl Business {
    pub fn new(id: impl Into<String>, name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: phone.into(),
            kind: "service".to_string(),
            services: Vec::new(),
            hours: "Mon-Fri 9am-6pm".to_string(),
            address: String::new(),
            faq: HashMap::new(),
            pricing: HashMap::new(),
            created_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Services as the comma list used in prompts
    pub fn services_line(&self) -> String {
        self.services.join(", ")
    }

    /// Add or replace a bilingual FAQ entry
    pub fn add_faq(
        &mut self,
        question: &str,
        answer_en: impl Into<String>,
        answer_fr: impl Into<String>,
    ) {
        let key: String = question
            .to_lowercase()
            .replace(' ', "_")
            .chars()
            .take(50)
            .collect();

        self.faq.insert(
            key,
            serde_json::json!({
                "question": question,
                "answer_en": answer_en.into(),
                "answer_fr": answer_fr.into(),
                "created_at": chrono::Utc::now().to_rfc3339(),
            }),
        );
    }
}
