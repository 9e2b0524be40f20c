//! Startup wiring
//!
//! Builds every service from [`AppConfig`], seeds the business record on
//! first run (from a YAML file when present, otherwise a demo salon), and
//! runs the web server until interrupted.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::application::pipeline::MessagePipeline;
use crate::application::responder::Responder;
use crate::application::voice::VoiceSystem;
use crate::config::AppConfig;
use crate::domain::Business;
use crate::infrastructure::llm::LlmClient;
use crate::infrastructure::store::{SqliteStore, Store};
use crate::infrastructure::web::{start_web_server, AppState};
use crate::infrastructure::{FacebookClient, SmsClient, SpeechClient};

/// YAML shape of the business seed file
#[derive(Debug, Deserialize)]
struct BusinessSeed {
    id: Option<String>,
    name: String,
    phone: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    services: Vec<String>,
    #[serde(default)]
    hours: Option<String>,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    faq: Vec<FaqSeed>,
    #[serde(default)]
    pricing: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct FaqSeed {
    question: String,
    answer_en: String,
    answer_fr: String,
}

pub struct Launcher {
    config: AppConfig,
}

impl Launcher {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    /// Build every service and run until interrupted
    pub async fn launch(&self) -> Result<()> {
        info!("🚀 Starting comptoir v{}", crate::VERSION);

        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::new(&self.config.db_path)
                .with_context(|| format!("failed to open database at {}", self.config.db_path))?,
        );
        info!("💾 Database ready at {}", self.config.db_path);

        self.seed_business(&store).await?;

        let llm = LlmClient::new_with_base_url(
            self.config.llm_api_key.clone(),
            self.config.llm_model.clone(),
            self.config.llm_base_url.clone(),
        );
        info!("🤖 LLM client ready (model: {})", self.config.llm_model);

        let responder = Arc::new(Responder::new(Arc::new(llm)));
        let pipeline = Arc::new(MessagePipeline::new(store.clone(), responder.clone()));
        let voice = Arc::new(VoiceSystem::new(store.clone(), responder));

        let (account_sid, auth_token) = match self.config.twilio_credentials() {
            Some((sid, token)) => (Some(sid.to_string()), Some(token.to_string())),
            None => (None, None),
        };
        let sms = SmsClient::new(account_sid, auth_token);

        let facebook = FacebookClient::new(
            self.config.facebook_access_token.clone(),
            self.config.facebook_verify_token.clone(),
        );

        let speech = self
            .config
            .google_speech_api_key
            .clone()
            .filter(|k| !k.is_empty())
            .map(SpeechClient::new);
        if speech.is_none() {
            warn!("Google Speech not configured, voice media stream disabled");
        }

        let state = Arc::new(AppState {
            pipeline,
            voice,
            sms,
            facebook,
            speech,
            public_base_url: self.config.public_base_url.clone(),
            business_phone: self.config.twilio_phone_number.clone(),
            transfer_number: self.config.transfer_number.clone(),
        });

        let bind_addr = self.config.bind_addr.clone();
        tokio::spawn(async move {
            if let Err(err) = start_web_server(&bind_addr, state).await {
                error!(error = %err, "web server stopped");
            }
        });

        tokio::signal::ctrl_c()
            .await
            .context("failed to listen for shutdown signal")?;
        info!("🛑 Received shutdown signal");

        Ok(())
    }

    /// Insert the business record on first run
    async fn seed_business(&self, store: &Arc<dyn Store>) -> Result<()> {
        if store.business_count().await? > 0 {
            return Ok(());
        }

        let business = match self.load_seed_file() {
            Some(business) => {
                info!("📋 Seeding business from {}", self.config.business_seed);
                business
            }
            None => {
                warn!("No seed file found, seeding demo salon");
                self.demo_business()
            }
        };

        info!(business = %business.name, phone = %business.phone, "business seeded");
        store.save_business(&business).await?;
        Ok(())
    }

    fn load_seed_file(&self) -> Option<Business> {
        let content = std::fs::read_to_string(&self.config.business_seed).ok()?;

        let seed: BusinessSeed = match serde_yaml::from_str(&content) {
            Ok(seed) => seed,
            Err(err) => {
                error!(error = %err, "unparseable business seed file, falling back to demo");
                return None;
            }
        };

        let id = seed
            .id
            .unwrap_or_else(|| format!("biz_{}", uuid::Uuid::new_v4().simple()));
        let phone = seed
            .phone
            .unwrap_or_else(|| self.config.twilio_phone_number.clone());

        let mut business = Business::new(id, seed.name, phone);
        if let Some(kind) = seed.kind {
            business.kind = kind;
        }
        if let Some(hours) = seed.hours {
            business.hours = hours;
        }
        if let Some(address) = seed.address {
            business.address = address;
        }
        business.services = seed.services;
        business.pricing = seed.pricing;
        for item in seed.faq {
            business.add_faq(&item.question, item.answer_en, item.answer_fr);
        }

        Some(business)
    }

    /// Quebec hair salon used for demos and local development
    fn demo_business(&self) -> Business {
        let mut business = Business::new(
            "demo_salon_001",
            "Bella Hair Salon",
            &self.config.twilio_phone_number,
        );
        business.kind = "hair_salon".to_string();
        business.services = vec![
            "haircut".to_string(),
            "coloring".to_string(),
            "styling".to_string(),
            "treatment".to_string(),
            "blowout".to_string(),
        ];
        business.hours = "Mon-Sat 9am-7pm, Closed Sunday".to_string();
        business.address = "123 Main Street, Montreal, QC".to_string();
        business.pricing = HashMap::from([
            ("haircut".to_string(), "$45".to_string()),
            ("coloring".to_string(), "$85".to_string()),
            ("styling".to_string(), "$35".to_string()),
            ("treatment".to_string(), "$60".to_string()),
            ("blowout".to_string(), "$40".to_string()),
        ]);
        business.add_faq(
            "Do you take walk-ins?",
            "Yes, when a stylist is free, but booking ahead is safer!",
            "Oui, quand une styliste est libre, mais c'est plus sûr de réserver!",
        );
        business.add_faq(
            "Is there parking?",
            "Free parking is available behind the building.",
            "Stationnement gratuit derrière le bâtiment.",
        );
        business
    }
}
