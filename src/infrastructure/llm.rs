//! LLM client
//!
//! Chat-completion access through async-openai. The base URL is
//! configurable so any OpenAI-compatible endpoint works.

use anyhow::{Context, Result};
use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::application::responder::ChatModel;

#[derive(Clone)]
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl LlmClient {
    pub fn new_with_base_url(api_key: String, model: String, base_url: String) -> Self {
        let base_url = base_url.trim_end_matches('/').to_string();

        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);

        let client = Client::with_config(config);

        Self { client, model }
    }

    /// Every pipeline prompt carries its own context, so requests are a
    /// single user message.
    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .context("failed to build chat message")?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(message)])
            .build()
            .context("failed to build chat request")
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .context("LLM API call failed")?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> LlmClient {
        LlmClient::new_with_base_url(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            "https://api.openai.com/v1/".to_string(),
        )
    }

    #[test]
    fn test_client_creation() {
        assert_eq!(client().model, "gpt-4o-mini");
    }

    #[test]
    fn test_request_is_single_user_message() {
        let request = client().build_request("Bonjour, vos heures?").unwrap();

        assert_eq!(request.model, "gpt-4o-mini");
        assert_eq!(request.messages.len(), 1);
        assert!(matches!(
            request.messages[0],
            ChatCompletionRequestMessage::User(_)
        ));
    }
}
