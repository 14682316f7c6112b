#[cfg(test)]
#[path = "ai_service_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use super::host_stream::host_stream;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AiError;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentStream;
use crate::domain::models::GenerationParams;
use crate::domain::models::HostBox;
use crate::infrastructure::backends::BackendManager;

/// Where a failed local request is retried, once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub backend: BackendName,
    pub model: String,
}

impl FallbackPolicy {
    /// Reads `fallback-backend` and `fallback-model`. Both must be set.
    pub fn from_config() -> Option<FallbackPolicy> {
        let backend = BackendName::parse_loose(&Config::get(ConfigKey::FallbackBackend))?;
        let model = Config::get(ConfigKey::FallbackModel);
        if model.is_empty() {
            return None;
        }

        return Some(FallbackPolicy { backend, model });
    }
}

enum Route {
    Local(HostBox, GenerationParams),
    Cloud(BackendBox),
}

/// Single entry point for completions across every provider.
pub struct AiService {
    backends: HashMap<BackendName, BackendBox>,
    host: HostBox,
    fallback: Option<FallbackPolicy>,
    next_generation: AtomicU64,
}

impl AiService {
    /// Builds every cloud adapter from the loaded configuration.
    pub fn new(host: HostBox) -> AiService {
        let backends = BackendName::cloud()
            .into_iter()
            .map(BackendManager::get)
            .collect::<Vec<BackendBox>>();

        return AiService::with_backends(backends, host);
    }

    pub fn with_backends(backends: Vec<BackendBox>, host: HostBox) -> AiService {
        return AiService {
            backends: backends
                .into_iter()
                .map(|backend| return (backend.name(), backend))
                .collect(),
            host,
            fallback: None,
            next_generation: AtomicU64::new(1),
        };
    }

    pub fn with_fallback(mut self, fallback: Option<FallbackPolicy>) -> AiService {
        self.fallback = fallback;
        return self;
    }

    /// Forwards a credential to the adapter. Local providers have none.
    pub fn set_api_key(&self, backend: BackendName, key: &str) {
        if let Some(adapter) = self.backends.get(&backend) {
            adapter.set_api_key(key);
        }
    }

    fn backend(&self, name: BackendName) -> Result<BackendBox, AiError> {
        return self
            .backends
            .get(&name)
            .cloned()
            .ok_or_else(|| return AiError::UnknownProvider(name.to_string()));
    }

    fn generation_params(&self, name: BackendName, request: &CompletionRequest) -> GenerationParams {
        let (last, history) = match request.messages.split_last() {
            Some((last, history)) => (last.content.to_string(), history),
            None => ("".to_string(), &request.messages[..]),
        };

        return GenerationParams {
            id: self.next_generation.fetch_add(1, Ordering::Relaxed),
            model: request.model.to_string(),
            prompt: last,
            provider: name.id().to_string(),
            history: serde_json::to_string::<[ChatMessage]>(history).unwrap_or_default(),
        };
    }

    /// Resolves the provider and checks everything that can fail before any
    /// I/O happens.
    fn route(&self, request: &CompletionRequest) -> Result<Route, AiError> {
        let name = BackendName::parse(&request.provider)
            .ok_or_else(|| return AiError::UnknownProvider(request.provider.to_string()))?;

        if request.messages.is_empty() {
            return Err(AiError::Configuration("No messages provided".to_string()));
        }

        match name {
            BackendName::Ollama | BackendName::LmStudio => {
                return Ok(Route::Local(
                    self.host.clone(),
                    self.generation_params(name, request),
                ));
            }
            BackendName::OpenAI
            | BackendName::Anthropic
            | BackendName::Gemini
            | BackendName::OpenRouter => {
                let backend = self.backend(name)?;
                backend.validate()?;
                return Ok(Route::Cloud(backend));
            }
        }
    }

    /// Streams a completion. Unknown providers, missing credentials and empty
    /// conversations are rejected here, before anything is spawned.
    pub fn chat_stream(&self, request: CompletionRequest) -> Result<FragmentStream, AiError> {
        tracing::debug!(provider = %request.provider, model = %request.model, "Streaming completion");

        match self.route(&request)? {
            Route::Local(host, params) => {
                return Ok(FragmentStream::spawn(move |tx| {
                    return async move {
                        return host_stream(host.as_ref(), params, &tx).await;
                    };
                }));
            }
            Route::Cloud(backend) => {
                return Ok(FragmentStream::spawn(move |tx| {
                    return async move {
                        return backend.chat_stream(&request, &tx).await;
                    };
                }));
            }
        }
    }

    /// Single-shot completion. Local providers return the full text of their
    /// stream without usage.
    pub async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        match self.route(request)? {
            Route::Local(host, params) => {
                let stream = FragmentStream::spawn(move |tx| {
                    return async move {
                        return host_stream(host.as_ref(), params, &tx).await;
                    };
                });

                return Ok(CompletionResponse {
                    content: stream.collect_text().await?,
                    usage: None,
                    cost: 0.0,
                });
            }
            Route::Cloud(backend) => return backend.chat(request).await,
        }
    }

    /// Like `chat`, but retries once against the configured fallback when a
    /// local provider fails to answer.
    pub async fn chat_with_fallback(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionResponse, AiError> {
        let err = match self.chat(request).await {
            Ok(res) => return Ok(res),
            Err(err) => err,
        };

        let Some(policy) = &self.fallback else {
            return Err(err);
        };

        let is_local = BackendName::parse(&request.provider)
            .map(|name| return name.is_local())
            .unwrap_or(false);
        let retryable = matches!(err, AiError::Network { .. } | AiError::Protocol { .. });
        if !is_local || !retryable {
            return Err(err);
        }

        tracing::warn!(
            error = %err,
            provider = %request.provider,
            fallback = %policy.backend,
            model = %policy.model,
            "Local provider failed, retrying with fallback"
        );

        let mut fallback = request.clone();
        fallback.provider = policy.backend.to_string();
        fallback.model = policy.model.to_string();

        return self.chat(&fallback).await;
    }
}
