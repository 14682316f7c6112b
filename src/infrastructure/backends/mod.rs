pub mod anthropic;
pub mod chat_completions;
pub mod gemini;
pub mod lmstudio;
pub mod ollama;
pub mod openai;
pub mod openrouter;

use std::sync::Arc;
use std::time::Duration;

use futures::stream::TryStreamExt;
use tokio::io::AsyncBufRead;
use tokio::io::AsyncBufReadExt;
use tokio::io::Lines;
use tokio_util::io::StreamReader;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::AiError;
use crate::domain::models::BackendBox;
use crate::domain::models::BackendName;

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 120_000;

fn convert_err(err: reqwest::Error) -> std::io::Error {
    let err_msg = err.to_string();
    return std::io::Error::new(std::io::ErrorKind::Interrupted, err_msg);
}

/// Shared HTTP client honouring the configured request timeout.
pub fn http_client() -> reqwest::Client {
    let timeout = Config::get(ConfigKey::RequestTimeout)
        .parse::<u64>()
        .unwrap_or(DEFAULT_REQUEST_TIMEOUT_MS);

    let res = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout))
        .build();

    match res {
        Ok(client) => return client,
        Err(err) => {
            tracing::warn!(error = ?err, "Failed to build HTTP client, using defaults");
            return reqwest::Client::new();
        }
    }
}

/// Reads a response body line by line. Partial lines are buffered across
/// reads and decoded once complete.
pub fn response_lines(res: reqwest::Response) -> Lines<impl AsyncBufRead + Unpin> {
    let stream = res.bytes_stream().map_err(convert_err);
    return StreamReader::new(stream).lines();
}

/// Fails with a protocol error carrying the status and body when the backend
/// did not answer with a success status.
pub async fn check_status(
    backend: BackendName,
    res: reqwest::Response,
) -> Result<reqwest::Response, AiError> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }

    let body = res.text().await.unwrap_or_default();
    tracing::error!(
        status = status.as_u16(),
        body = %body,
        "Failed to make completion request to {backend}"
    );

    return Err(AiError::protocol(
        &backend.to_string(),
        &format!("HTTP {status}: {body}"),
    ));
}

pub struct BackendManager {}

impl BackendManager {
    /// Builds the adapter for `name` from the loaded configuration.
    pub fn get(name: BackendName) -> BackendBox {
        match name {
            BackendName::Ollama => return Arc::<ollama::Ollama>::default(),
            BackendName::LmStudio => return Arc::<lmstudio::LmStudio>::default(),
            BackendName::OpenAI => return Arc::<openai::OpenAI>::default(),
            BackendName::Anthropic => return Arc::<anthropic::Anthropic>::default(),
            BackendName::Gemini => return Arc::<gemini::Gemini>::default(),
            BackendName::OpenRouter => return Arc::<openrouter::OpenRouter>::default(),
        }
    }
}
