#[cfg(test)]
#[path = "lmstudio_test.rs"]
mod tests;

use async_trait::async_trait;

use super::chat_completions;
use super::http_client;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AiError;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentSender;

/// LM Studio's local server, which mirrors the OpenAI chat completions API
/// without authentication.
pub struct LmStudio {
    url: String,
    client: reqwest::Client,
}

impl Default for LmStudio {
    fn default() -> LmStudio {
        return LmStudio::new(&Config::get(ConfigKey::LmStudioURL), http_client());
    }
}

impl LmStudio {
    pub fn new(url: &str, client: reqwest::Client) -> LmStudio {
        return LmStudio {
            url: url.trim_end_matches('/').to_string(),
            client,
        };
    }

    fn request(&self) -> reqwest::RequestBuilder {
        return self
            .client
            .post(format!("{url}/v1/chat/completions", url = self.url));
    }
}

#[async_trait]
impl Backend for LmStudio {
    fn name(&self) -> BackendName {
        return BackendName::LmStudio;
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        let mut res = chat_completions::complete(self.name(), self.request(), request).await?;
        res.cost = 0.0;

        return Ok(res);
    }

    #[allow(clippy::implicit_return)]
    async fn chat_stream<'a>(
        &self,
        request: &CompletionRequest,
        tx: &'a FragmentSender,
    ) -> Result<(), AiError> {
        return chat_completions::stream(self.name(), self.request(), request, tx).await;
    }
}
