#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;

use async_trait::async_trait;

use super::chat_completions;
use super::http_client;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AiError;
use crate::domain::models::ApiKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentSender;

pub struct OpenAI {
    url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl Default for OpenAI {
    fn default() -> OpenAI {
        return OpenAI::new(&Config::get(ConfigKey::OpenAiURL), http_client());
    }
}

impl OpenAI {
    pub fn new(url: &str, client: reqwest::Client) -> OpenAI {
        return OpenAI {
            url: url.trim_end_matches('/').to_string(),
            api_key: ApiKey::default(),
            client,
        };
    }

    fn request(&self, token: &str) -> reqwest::RequestBuilder {
        return self
            .client
            .post(format!("{url}/v1/chat/completions", url = self.url))
            .header("Authorization", format!("Bearer {token}"));
    }
}

#[async_trait]
impl Backend for OpenAI {
    fn name(&self) -> BackendName {
        return BackendName::OpenAI;
    }

    fn set_api_key(&self, key: &str) {
        self.api_key.set(key);
    }

    fn validate(&self) -> Result<(), AiError> {
        self.api_key.require(self.name())?;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        let token = self.api_key.require(self.name())?;
        return chat_completions::complete(self.name(), self.request(&token), request).await;
    }

    #[allow(clippy::implicit_return)]
    async fn chat_stream<'a>(
        &self,
        request: &CompletionRequest,
        tx: &'a FragmentSender,
    ) -> Result<(), AiError> {
        let token = self.api_key.require(self.name())?;
        return chat_completions::stream(self.name(), self.request(&token), request, tx).await;
    }
}
