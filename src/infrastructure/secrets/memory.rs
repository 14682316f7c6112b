#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;

use anyhow::Result;
use dashmap::DashMap;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BackendName;
use crate::domain::models::SecretStore;

/// Process-local credential store, keyed by provider id.
#[derive(Default)]
pub struct MemorySecretStore {
    secrets: DashMap<String, String>,
}

impl MemorySecretStore {
    /// Seeds the store with every cloud token found in the loaded
    /// configuration.
    pub fn from_config() -> MemorySecretStore {
        let store = MemorySecretStore::default();

        for backend in BackendName::cloud() {
            let Some(key) = token_key(backend) else {
                continue;
            };

            let token = Config::get(key);
            if !token.is_empty() {
                store.secrets.insert(backend.id().to_string(), token);
            }
        }

        return store;
    }
}

fn token_key(backend: BackendName) -> Option<ConfigKey> {
    match backend {
        BackendName::OpenAI => return Some(ConfigKey::OpenAiToken),
        BackendName::Anthropic => return Some(ConfigKey::AnthropicToken),
        BackendName::Gemini => return Some(ConfigKey::GeminiToken),
        BackendName::OpenRouter => return Some(ConfigKey::OpenRouterToken),
        BackendName::Ollama | BackendName::LmStudio => return None,
    }
}

impl SecretStore for MemorySecretStore {
    fn get_secret(&self, provider: &str) -> Option<String> {
        return self
            .secrets
            .get(provider)
            .map(|secret| return secret.value().to_string());
    }

    fn set_secret(&self, provider: &str, secret: &str) -> Result<()> {
        self.secrets
            .insert(provider.to_string(), secret.to_string());
        return Ok(());
    }
}
