use std::sync::Arc;

use super::AiService;
use super::AppState;
use crate::domain::models::Backend;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;
use crate::domain::models::HostBox;
use crate::infrastructure::backends::lmstudio::LmStudio;
use crate::infrastructure::backends::ollama::Ollama;
use crate::infrastructure::backends::openai::OpenAI;
use crate::infrastructure::host::local::LocalHost;
use crate::infrastructure::secrets::memory::MemorySecretStore;

/// A store answering through OpenAI at `url` with `gpt-4` selected. Local
/// providers point at a closed port.
pub fn openai_state(url: &str) -> AppState {
    let openai = OpenAI::new(url, reqwest::Client::new());
    openai.set_api_key("abc");

    let closed = "http://127.0.0.1:1";
    let host: HostBox = Arc::new(LocalHost::new(
        Arc::new(Ollama::new(closed, reqwest::Client::new())),
        Arc::new(LmStudio::new(closed, reqwest::Client::new())),
    ));
    let backends: Vec<BackendBox> = vec![Arc::new(openai)];
    let ai = AiService::with_backends(backends, host);

    let state = AppState::new(Arc::new(ai), Arc::new(MemorySecretStore::default()));
    state.set_provider(BackendName::OpenAI);
    state.set_model("gpt-4");

    return state;
}
