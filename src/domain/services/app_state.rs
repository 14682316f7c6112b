#[cfg(test)]
#[path = "app_state_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use anyhow::Result;

use super::prompts::project_prompt;
use super::prompts::DEFAULT_SYSTEM_PROMPT;
use super::AiService;
use super::CodeExtractor;
use crate::domain::models::AiError;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::DEFAULT_MAX_TOKENS;
use crate::domain::models::DEFAULT_TEMPERATURE;
use crate::domain::models::SecretStore;

pub type SecretStoreBox = Arc<dyn SecretStore + Send + Sync>;

/// The generation currently allowed to write to the store.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationSession {
    pub id: u64,
    pub accumulated_text: String,
    pub extracted_code: Option<String>,
    pub active: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreState {
    pub provider: BackendName,
    pub model: String,
    pub system_prompt: String,
    pub current_response: String,
    pub generated_code: String,
    pub api_keys: HashMap<BackendName, String>,
    pub session: GenerationSession,
}

impl StoreState {
    fn request(&self, prompt: &str) -> CompletionRequest {
        return CompletionRequest::new(
            &self.provider.to_string(),
            &self.model,
            vec![
                ChatMessage::system(&self.system_prompt),
                ChatMessage::user(prompt),
            ],
        );
    }
}

/// A one-off instruction with its own system prompt and sampling settings,
/// sent through whichever provider and model the store has selected.
#[derive(Clone, Debug, PartialEq)]
pub struct TaskPrompt {
    pub system: String,
    pub user: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl TaskPrompt {
    pub fn new(system: &str, user: &str) -> TaskPrompt {
        return TaskPrompt {
            system: system.to_string(),
            user: user.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        };
    }

    pub fn with_temperature(mut self, temperature: f32) -> TaskPrompt {
        self.temperature = temperature;
        return self;
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> TaskPrompt {
        self.max_tokens = max_tokens;
        return self;
    }
}

impl Default for StoreState {
    fn default() -> StoreState {
        return StoreState {
            provider: BackendName::Ollama,
            model: "".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            current_response: "".to_string(),
            generated_code: "".to_string(),
            api_keys: HashMap::new(),
            session: GenerationSession::default(),
        };
    }
}

/// Shared application store driving generations and holding their results.
///
/// Every generation gets a fresh session id. Only the newest session writes
/// to the shared state; an older one keeps streaming into its own callback
/// and return value.
pub struct AppState {
    ai: Arc<AiService>,
    secrets: SecretStoreBox,
    state: Mutex<StoreState>,
    next_session: AtomicU64,
}

impl AppState {
    pub fn new(ai: Arc<AiService>, secrets: SecretStoreBox) -> AppState {
        return AppState {
            ai,
            secrets,
            state: Mutex::new(StoreState::default()),
            next_session: AtomicU64::new(1),
        };
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        return self.state.lock().unwrap_or_else(|e| return e.into_inner());
    }

    pub fn snapshot(&self) -> StoreState {
        return self.lock().clone();
    }

    pub fn generated_code(&self) -> String {
        return self.lock().generated_code.to_string();
    }

    pub fn current_response(&self) -> String {
        return self.lock().current_response.to_string();
    }

    pub fn set_provider(&self, provider: BackendName) {
        self.lock().provider = provider;
    }

    pub fn set_model(&self, model: &str) {
        self.lock().model = model.trim().to_string();
    }

    pub fn set_system_prompt(&self, prompt: &str) {
        self.lock().system_prompt = prompt.to_string();
    }

    /// Persists a credential, caches it and hands it to the adapter.
    pub fn set_api_key(&self, provider: BackendName, key: &str) -> Result<()> {
        self.secrets.set_secret(provider.id(), key)?;
        self.lock().api_keys.insert(provider, key.to_string());
        self.ai.set_api_key(provider, key);

        return Ok(());
    }

    /// Seeds every cloud adapter with the credentials found in the secret
    /// store.
    pub fn load_api_keys(&self) {
        for provider in BackendName::cloud() {
            let Some(key) = self.secrets.get_secret(provider.id()) else {
                continue;
            };

            tracing::debug!(provider = %provider, "Loaded API key");
            self.lock().api_keys.insert(provider, key.to_string());
            self.ai.set_api_key(provider, &key);
        }
    }

    /// Opens a new session, superseding whichever one was running.
    fn begin(&self, prompt: &str) -> (u64, CompletionRequest) {
        let id = self.next_session.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();

        state.session = GenerationSession {
            id,
            active: true,
            ..GenerationSession::default()
        };
        state.current_response = "".to_string();

        let mut request = state.request(prompt);
        request.stream = true;

        return (id, request);
    }

    /// Runs `update` only while `id` is still the newest session.
    fn apply<F>(&self, id: u64, update: F)
    where
        F: FnOnce(&mut StoreState),
    {
        let mut state = self.lock();
        if state.session.id != id {
            return;
        }

        update(&mut state);
    }

    fn end(&self, id: u64) {
        self.apply(id, |state| {
            state.session.active = false;
        });
    }

    /// Streams `prompt` through the active provider. On every fragment the
    /// accumulated text is published and the first code block is extracted
    /// into `generated_code`. Does nothing without a selected model.
    ///
    /// On failure the last good `current_response` and `generated_code` are
    /// kept.
    pub async fn generate_code<F>(&self, prompt: &str, mut on_fragment: F) -> Result<(), AiError>
    where
        F: FnMut(&str),
    {
        if self.lock().model.is_empty() {
            tracing::warn!("No model selected, skipping generation");
            return Ok(());
        }

        let (id, request) = self.begin(prompt);
        let mut stream = match self.ai.chat_stream(request) {
            Ok(stream) => stream,
            Err(err) => {
                self.end(id);
                return Err(err);
            }
        };

        let mut extractor = CodeExtractor::default();
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(err) => {
                    tracing::error!(error = %err, session = id, "Generation failed");
                    self.end(id);
                    return Err(err);
                }
            };

            let changed = extractor.push(&fragment);
            self.apply(id, |state| {
                state.current_response = extractor.text().to_string();
                state.session.accumulated_text = extractor.text().to_string();
                if changed {
                    let code = extractor.code().unwrap_or_default();
                    state.generated_code = code.to_string();
                    state.session.extracted_code = Some(code.to_string());
                }
            });

            on_fragment(extractor.text());
        }

        self.end(id);
        return Ok(());
    }

    /// Single-shot completion through the active provider. A failing local
    /// provider is retried once against the configured fallback. The shared
    /// response state is left alone.
    pub async fn complete(&self, prompt: &str) -> Result<CompletionResponse, AiError> {
        let request = self.lock().request(prompt);
        if request.model.is_empty() {
            return Err(AiError::Configuration("No model selected".to_string()));
        }

        return self.ai.chat_with_fallback(&request).await;
    }

    /// Single-shot completion of a task prompt. The store's system prompt and
    /// response state are left alone; the trimmed answer is returned.
    pub async fn complete_task(&self, task: &TaskPrompt) -> Result<String, AiError> {
        let (provider, model) = {
            let state = self.lock();
            (state.provider, state.model.to_string())
        };
        if model.is_empty() {
            return Err(AiError::Configuration("No model selected".to_string()));
        }

        let mut request = CompletionRequest::new(
            &provider.to_string(),
            &model,
            vec![ChatMessage::system(&task.system), ChatMessage::user(&task.user)],
        );
        request.temperature = task.temperature;
        request.max_tokens = task.max_tokens;

        let res = self.ai.chat_with_fallback(&request).await?;
        tracing::debug!(provider = %provider, model = %model, cost = res.cost, "Task completed");

        return Ok(res.content.trim().to_string());
    }

    /// Asks for a whole multi-file project and returns the raw response for
    /// `ProjectParser`. Leaves `generated_code` untouched.
    pub async fn generate_project<F>(
        &self,
        prompt: &str,
        mut on_fragment: F,
    ) -> Result<String, AiError>
    where
        F: FnMut(&str),
    {
        if self.lock().model.is_empty() {
            return Err(AiError::Configuration("No model selected".to_string()));
        }

        let (id, request) = self.begin(&project_prompt(prompt));
        let mut stream = match self.ai.chat_stream(request) {
            Ok(stream) => stream,
            Err(err) => {
                self.end(id);
                return Err(err);
            }
        };

        let mut text = "".to_string();
        while let Some(fragment) = stream.next_fragment().await {
            let fragment = match fragment {
                Ok(fragment) => fragment,
                Err(err) => {
                    tracing::error!(error = %err, session = id, "Project generation failed");
                    self.end(id);
                    return Err(err);
                }
            };

            text.push_str(&fragment);
            self.apply(id, |state| {
                state.current_response = text.to_string();
                state.session.accumulated_text = text.to_string();
            });

            on_fragment(&text);
        }

        self.end(id);
        return Ok(text);
    }
}
