use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(
    author,
    version,
    about = "Bilingual AI customer-service bridge (SMS, voice, Messenger)"
)]
pub struct AppConfig {
    /// HTTP bind address
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
    pub bind_addr: String,

    /// SQLite database path
    #[arg(long, env = "DB_PATH", default_value = "./comptoir.db")]
    pub db_path: String,

    /// Public base URL of this service (used for the voice media stream URL)
    #[arg(long, env = "PUBLIC_BASE_URL", default_value = "http://localhost:8000")]
    pub public_base_url: String,

    // LLM configuration (OpenAI-compatible endpoint; Gemini works through
    // its compatibility endpoint)
    #[arg(long, env = "LLM_API_KEY")]
    pub llm_api_key: String,

    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o-mini")]
    pub llm_model: String,

    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub llm_base_url: String,

    // Twilio configuration
    #[arg(long, env = "TWILIO_ACCOUNT_SID")]
    pub twilio_account_sid: Option<String>,

    #[arg(long, env = "TWILIO_AUTH_TOKEN")]
    pub twilio_auth_token: Option<String>,

    /// Business phone number registered with Twilio
    #[arg(long, env = "TWILIO_PHONE_NUMBER", default_value = "+1234567890")]
    pub twilio_phone_number: String,

    /// Number a caller is dialed through to on escalation (optional)
    #[arg(long, env = "TRANSFER_NUMBER")]
    pub transfer_number: Option<String>,

    // Facebook configuration
    #[arg(long, env = "FACEBOOK_ACCESS_TOKEN")]
    pub facebook_access_token: Option<String>,

    #[arg(long, env = "FACEBOOK_VERIFY_TOKEN", default_value = "comptoir_verify_token")]
    pub facebook_verify_token: String,

    // Google Speech configuration
    #[arg(long, env = "GOOGLE_SPEECH_API_KEY")]
    pub google_speech_api_key: Option<String>,

    /// YAML seed file describing the demo business
    #[arg(long, env = "BUSINESS_SEED", default_value = "business.yaml")]
    pub business_seed: String,
}

impl AppConfig {
    /// Validate configuration consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.llm_api_key.is_empty() {
            anyhow::bail!("LLM_API_KEY is required");
        }

        // SMS sending needs both halves of the Twilio credential pair
        if self.twilio_account_sid.is_some() != self.twilio_auth_token.is_some() {
            anyhow::bail!(
                "TWILIO_ACCOUNT_SID and TWILIO_AUTH_TOKEN must be provided together"
            );
        }

        Ok(())
    }

    /// Get Twilio credentials if fully configured
    pub fn twilio_credentials(&self) -> Option<(&str, &str)> {
        match (
            self.twilio_account_sid.as_ref(),
            self.twilio_auth_token.as_ref(),
        ) {
            (Some(sid), Some(token)) => Some((sid.as_str(), token.as_str())),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = AppConfig::parse_from(["test", "--llm-api-key", "test_key"]);

        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.llm_model, "gpt-4o-mini");
        assert_eq!(config.twilio_phone_number, "+1234567890");
        assert_eq!(config.facebook_verify_token, "comptoir_verify_token");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_llm_key_rejected() {
        let config = AppConfig::parse_from(["test", "--llm-api-key", ""]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_twilio_credentials_rejected() {
        let config = AppConfig::parse_from([
            "test",
            "--llm-api-key",
            "test_key",
            "--twilio-account-sid",
            "AC123",
        ]);
        assert!(config.validate().is_err());

        let config = AppConfig::parse_from([
            "test",
            "--llm-api-key",
            "test_key",
            "--twilio-account-sid",
            "AC123",
            "--twilio-auth-token",
            "secret",
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.twilio_credentials(), Some(("AC123", "secret")));
    }
}
