#[cfg(test)]
#[path = "backend_test.rs"]
mod tests;

use std::sync::Arc;
use std::sync::RwLock;

use async_trait::async_trait;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;

use super::AiError;
use super::CompletionRequest;
use super::CompletionResponse;
use super::FragmentSender;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, EnumVariantNames, strum::Display)]
pub enum BackendName {
    #[strum(to_string = "Ollama")]
    Ollama,
    #[strum(to_string = "LM Studio")]
    LmStudio,
    #[strum(to_string = "OpenAI")]
    OpenAI,
    #[strum(to_string = "Anthropic")]
    Anthropic,
    #[strum(to_string = "Google Gemini")]
    Gemini,
    #[strum(to_string = "OpenRouter")]
    OpenRouter,
}

impl BackendName {
    /// Exact match on the display name, e.g. `Google Gemini`.
    pub fn parse(text: &str) -> Option<BackendName> {
        return BackendName::iter().find(|e| return e.to_string() == text);
    }

    /// Parses either the display name or the short id.
    pub fn parse_loose(text: &str) -> Option<BackendName> {
        if let Some(name) = BackendName::parse(text) {
            return Some(name);
        }

        let lowered = text.to_lowercase();
        return BackendName::iter().find(|e| return e.id() == lowered);
    }

    /// Short identifier used for secret storage and the host generation
    /// channel.
    pub fn id(&self) -> &'static str {
        match self {
            BackendName::Ollama => return "ollama",
            BackendName::LmStudio => return "lmstudio",
            BackendName::OpenAI => return "openai",
            BackendName::Anthropic => return "anthropic",
            BackendName::Gemini => return "gemini",
            BackendName::OpenRouter => return "openrouter",
        }
    }

    /// Local providers run through the host generation bridge instead of a
    /// direct HTTP adapter.
    pub fn is_local(&self) -> bool {
        return matches!(self, BackendName::Ollama | BackendName::LmStudio);
    }

    pub fn requires_api_key(&self) -> bool {
        return !self.is_local();
    }

    pub fn default_url(&self) -> &'static str {
        match self {
            BackendName::Ollama => return "http://localhost:11434",
            BackendName::LmStudio => return "http://localhost:1234",
            BackendName::OpenAI => return "https://api.openai.com",
            BackendName::Anthropic => return "https://api.anthropic.com",
            BackendName::Gemini => return "https://generativelanguage.googleapis.com",
            BackendName::OpenRouter => return "https://openrouter.ai/api/v1",
        }
    }

    pub fn cloud() -> Vec<BackendName> {
        return BackendName::iter()
            .filter(|e| return !e.is_local())
            .collect();
    }
}

/// In-memory copy of a backend credential. Only ever written through
/// `Backend::set_api_key`.
#[derive(Default)]
pub struct ApiKey {
    value: RwLock<Option<String>>,
}

impl ApiKey {
    pub fn set(&self, key: &str) {
        let trimmed = key.trim();
        let mut value = self.value.write().unwrap_or_else(|e| return e.into_inner());
        if trimmed.is_empty() {
            *value = None;
        } else {
            *value = Some(trimmed.to_string());
        }
    }

    pub fn get(&self) -> Option<String> {
        return self
            .value
            .read()
            .unwrap_or_else(|e| return e.into_inner())
            .clone();
    }

    /// Returns the key or the configuration error every cloud backend raises
    /// before touching the network.
    pub fn require(&self, backend: BackendName) -> Result<String, AiError> {
        return self
            .get()
            .ok_or_else(|| return AiError::Configuration(format!("{backend} API key not set")));
    }
}

#[async_trait]
pub trait Backend {
    fn name(&self) -> BackendName;

    /// Replaces the credential used for subsequent requests. Backends without
    /// credentials ignore it.
    fn set_api_key(&self, _key: &str) {}

    /// Checks everything a request needs without performing any I/O.
    fn validate(&self) -> Result<(), AiError> {
        return Ok(());
    }

    /// Single-shot completion.
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError>;

    /// Streams a completion into `tx`, one fragment per incremental text
    /// chunk, in the order the backend emitted them.
    ///
    /// Returns once the backend signals end-of-stream. An `Err` ends the
    /// sequence abnormally.
    async fn chat_stream<'a>(
        &self,
        request: &CompletionRequest,
        tx: &'a FragmentSender,
    ) -> Result<(), AiError>;
}

pub type BackendBox = Arc<dyn Backend + Send + Sync>;
