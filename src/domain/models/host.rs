use std::sync::Arc;

use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;
use tokio::sync::broadcast;

use super::AiError;

/// Arguments of a host-side generation, mirroring the `generate_code` host
/// command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Echoed back on every event so concurrent generations don't cross.
    pub id: u64,
    pub model: String,
    pub prompt: String,
    /// Host provider id, e.g. `ollama` or `lmstudio`.
    pub provider: String,
    /// JSON array of prior `ChatMessage`s, empty for none.
    pub history: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostEvent {
    Token { id: u64, token: String },
    Finished { id: u64 },
}

impl HostEvent {
    pub fn generation_id(&self) -> u64 {
        match self {
            HostEvent::Token { id, .. } => return *id,
            HostEvent::Finished { id } => return *id,
        }
    }
}

/// Boundary to the privileged host process that performs local inference.
#[async_trait]
pub trait HostBridge {
    /// Subscribes to token and finished events. Dropping the receiver
    /// unsubscribes.
    fn subscribe(&self) -> broadcast::Receiver<HostEvent>;

    /// Asks the host to run a generation. Tokens arrive as events; a rejected
    /// start is reported through the returned error.
    async fn start_generation(&self, params: GenerationParams) -> Result<(), AiError>;
}

pub type HostBox = Arc<dyn HostBridge + Send + Sync>;
