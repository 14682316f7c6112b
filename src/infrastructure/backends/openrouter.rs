#[cfg(test)]
#[path = "openrouter_test.rs"]
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

const REFERER: &str = "https://vibe-studio.app";
const TITLE: &str = "Vibe Studio";

pub struct OpenRouter {
    url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl Default for OpenRouter {
    fn default() -> OpenRouter {
        return OpenRouter::new(&Config::get(ConfigKey::OpenRouterURL), http_client());
    }
}

impl OpenRouter {
    /// `url` already includes the API version, e.g. `https://openrouter.ai/api/v1`.
    pub fn new(url: &str, client: reqwest::Client) -> OpenRouter {
        return OpenRouter {
            url: url.trim_end_matches('/').to_string(),
            api_key: ApiKey::default(),
            client,
        };
    }

    fn request(&self, token: &str) -> reqwest::RequestBuilder {
        return self
            .client
            .post(format!("{url}/chat/completions", url = self.url))
            .header("Authorization", format!("Bearer {token}"))
            .header("HTTP-Referer", REFERER)
            .header("X-Title", TITLE);
    }
}

#[async_trait]
impl Backend for OpenRouter {
    fn name(&self) -> BackendName {
        return BackendName::OpenRouter;
    }

    fn set_api_key(&self, key: &str) {
        self.api_key.set(key);
    }

    fn validate(&self) -> Result<(), AiError> {
        self.api_key.require(self.name())?;
        return Ok(());
    }

    /// Prices vary per routed model, so no cost is estimated.
    #[allow(clippy::implicit_return)]
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        let token = self.api_key.require(self.name())?;
        let mut res = chat_completions::complete(self.name(), self.request(&token), request).await?;
        res.cost = 0.0;

        return Ok(res);
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
