#[cfg(test)]
#[path = "ollama_test.rs"]
mod tests;

use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::check_status;
use super::http_client;
use super::response_lines;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::split_system_message;
use crate::domain::models::AiError;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentSender;
use crate::domain::models::Role;
use crate::domain::models::Usage;

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: GenerateOptions,
}

/// `/api/generate` takes a single prompt, so earlier turns are rendered as a
/// transcript ahead of the final message.
fn render_prompt(turns: &[ChatMessage]) -> String {
    let Some((last, history)) = turns.split_last() else {
        return "".to_string();
    };

    if history.is_empty() {
        return last.content.to_string();
    }

    let mut prompt = history
        .iter()
        .map(|msg| {
            let speaker = if msg.role == Role::Assistant {
                "Assistant"
            } else {
                "User"
            };
            return format!("{speaker}: {content}", content = msg.content);
        })
        .collect::<Vec<String>>()
        .join("\n\n");
    prompt.push_str(&format!("\n\nUser: {content}\n\nAssistant:", content = last.content));

    return prompt;
}

impl GenerateRequest {
    fn new(request: &CompletionRequest, stream: bool) -> GenerateRequest {
        let (system, turns) = split_system_message(&request.messages);

        return GenerateRequest {
            model: request.model.to_string(),
            prompt: render_prompt(&turns),
            system,
            stream,
            options: GenerateOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
}

pub struct Ollama {
    url: String,
    client: reqwest::Client,
}

impl Default for Ollama {
    fn default() -> Ollama {
        return Ollama::new(&Config::get(ConfigKey::OllamaURL), http_client());
    }
}

impl Ollama {
    pub fn new(url: &str, client: reqwest::Client) -> Ollama {
        return Ollama {
            url: url.trim_end_matches('/').to_string(),
            client,
        };
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AiError> {
        let name = self.name().to_string();
        let res = self
            .client
            .post(format!("{url}/api/generate", url = self.url))
            .json(&GenerateRequest::new(request, stream))
            .send()
            .await
            .map_err(|err| return AiError::from_reqwest(&name, err))?;

        return check_status(self.name(), res).await;
    }
}

#[async_trait]
impl Backend for Ollama {
    fn name(&self) -> BackendName {
        return BackendName::Ollama;
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        let name = self.name().to_string();
        let body = self
            .send(request, false)
            .await?
            .json::<GenerateResponse>()
            .await
            .map_err(|err| return AiError::protocol(&name, &err.to_string()))?;
        tracing::debug!(body = ?body, "Completion response");

        let usage = match (body.prompt_eval_count, body.eval_count) {
            (Some(prompt), Some(completion)) => Some(Usage::new(prompt, completion)),
            _ => None,
        };

        return Ok(CompletionResponse {
            content: body.response.unwrap_or_default(),
            usage,
            cost: 0.0,
        });
    }

    #[allow(clippy::implicit_return)]
    async fn chat_stream<'a>(
        &self,
        request: &CompletionRequest,
        tx: &'a FragmentSender,
    ) -> Result<(), AiError> {
        let name = self.name().to_string();
        let res = self.send(request, true).await?;
        let mut lines_reader = response_lines(res);

        loop {
            let line = match lines_reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => return Err(AiError::network(&name, err)),
            };

            if line.trim().is_empty() {
                continue;
            }

            let ores = match serde_json::from_str::<GenerateResponse>(&line) {
                Ok(ores) => ores,
                Err(err) => {
                    tracing::debug!(error = %err, line = %line, "Skipping stream chunk");
                    continue;
                }
            };
            tracing::debug!(body = ?ores, "Completion response");

            if let Some(text) = ores.response.filter(|text| return !text.is_empty()) {
                tx.send(text).await?;
            }

            if ores.done {
                break;
            }
        }

        return Ok(());
    }
}
