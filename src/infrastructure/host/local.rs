#[cfg(test)]
#[path = "local_test.rs"]
mod tests;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::domain::models::AiError;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::FragmentStream;
use crate::domain::models::GenerationParams;
use crate::domain::models::HostBridge;
use crate::domain::models::HostEvent;
use crate::domain::models::Role;
use crate::domain::services::prompts::HOST_SYSTEM_PROMPT;
use crate::infrastructure::backends::BackendManager;

pub const HOST_EVENT_CAPACITY: usize = 1024;

/// In-process host running local inference against Ollama or LM Studio and
/// publishing every token as a `HostEvent`.
pub struct LocalHost {
    events: broadcast::Sender<HostEvent>,
    ollama: BackendBox,
    lmstudio: BackendBox,
}

impl Default for LocalHost {
    fn default() -> LocalHost {
        return LocalHost::new(
            BackendManager::get(BackendName::Ollama),
            BackendManager::get(BackendName::LmStudio),
        );
    }
}

impl LocalHost {
    pub fn new(ollama: BackendBox, lmstudio: BackendBox) -> LocalHost {
        let (events, _) = broadcast::channel(HOST_EVENT_CAPACITY);
        return LocalHost {
            events,
            ollama,
            lmstudio,
        };
    }

    fn backend(&self, provider: &str) -> Result<BackendBox, AiError> {
        match provider {
            "ollama" => return Ok(self.ollama.clone()),
            "lmstudio" => return Ok(self.lmstudio.clone()),
            _ => return Err(AiError::UnknownProvider(provider.to_string())),
        }
    }

    fn publish(&self, event: HostEvent) {
        // Nobody listening is fine, the generation still runs to completion.
        let _ = self.events.send(event);
    }
}

/// Rebuilds the conversation a generation runs with: the prior history, the
/// default system prompt when the history carries none, then the prompt.
fn conversation(params: &GenerationParams) -> Vec<ChatMessage> {
    let mut messages = vec![];
    if !params.history.trim().is_empty() {
        match serde_json::from_str::<Vec<ChatMessage>>(&params.history) {
            Ok(history) => messages = history,
            Err(err) => tracing::warn!(error = %err, "Ignoring unreadable generation history"),
        }
    }

    if !messages.iter().any(|msg| return msg.role == Role::System) {
        messages.insert(0, ChatMessage::system(HOST_SYSTEM_PROMPT));
    }

    messages.push(ChatMessage::user(&params.prompt));
    return messages;
}

#[async_trait]
impl HostBridge for LocalHost {
    fn subscribe(&self) -> broadcast::Receiver<HostEvent> {
        return self.events.subscribe();
    }

    #[allow(clippy::implicit_return)]
    async fn start_generation(&self, params: GenerationParams) -> Result<(), AiError> {
        let backend = self.backend(&params.provider)?;
        let id = params.id;

        let mut request = CompletionRequest::new(
            &backend.name().to_string(),
            &params.model,
            conversation(&params),
        );
        request.stream = true;

        tracing::info!(id, provider = %params.provider, model = %params.model, "Starting local generation");

        let mut stream = FragmentStream::spawn(move |tx| {
            return async move {
                return backend.chat_stream(&request, &tx).await;
            };
        });

        while let Some(fragment) = stream.next_fragment().await {
            self.publish(HostEvent::Token {
                id,
                token: fragment?,
            });
        }

        self.publish(HostEvent::Finished { id });
        return Ok(());
    }
}
