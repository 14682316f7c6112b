#[cfg(test)]
#[path = "anthropic_test.rs"]
mod tests;

use async_trait::async_trait;
use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::chat_completions::parse_sse_line;
use super::chat_completions::SseLine;
use super::check_status;
use super::http_client;
use super::response_lines;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::estimate_cost;
use crate::domain::models::split_system_message;
use crate::domain::models::AiError;
use crate::domain::models::ApiKey;
use crate::domain::models::Backend;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentSender;
use crate::domain::models::Usage;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ChatMessage>,
    stream: bool,
}

impl MessagesRequest {
    fn new(request: &CompletionRequest, stream: bool) -> MessagesRequest {
        let (system, messages) = split_system_message(&request.messages);

        return MessagesRequest {
            model: request.model.to_string(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system,
            messages,
            stream,
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessagesUsage {
    input_tokens: u64,
    output_tokens: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BlockDelta {
    TextDelta {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct ErrorBody {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    message: String,
}

impl ErrorBody {
    fn describe(&self) -> String {
        if self.message.is_empty() {
            return self.kind.to_string();
        }

        return format!("{}: {}", self.kind, self.message);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StreamEvent {
    ContentBlockDelta {
        delta: BlockDelta,
    },
    MessageStop,
    Error {
        error: ErrorBody,
    },
    #[serde(other)]
    Other,
}

pub struct Anthropic {
    url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl Default for Anthropic {
    fn default() -> Anthropic {
        return Anthropic::new(&Config::get(ConfigKey::AnthropicURL), http_client());
    }
}

impl Anthropic {
    pub fn new(url: &str, client: reqwest::Client) -> Anthropic {
        return Anthropic {
            url: url.trim_end_matches('/').to_string(),
            api_key: ApiKey::default(),
            client,
        };
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<reqwest::Response, AiError> {
        let name = self.name().to_string();
        let token = self.api_key.require(self.name())?;

        let res = self
            .client
            .post(format!("{url}/v1/messages", url = self.url))
            .header("x-api-key", token)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&MessagesRequest::new(request, stream))
            .send()
            .await
            .map_err(|err| return AiError::from_reqwest(&name, err))?;

        return check_status(self.name(), res).await;
    }
}

#[async_trait]
impl Backend for Anthropic {
    fn name(&self) -> BackendName {
        return BackendName::Anthropic;
    }

    fn set_api_key(&self, key: &str) {
        self.api_key.set(key);
    }

    fn validate(&self) -> Result<(), AiError> {
        self.api_key.require(self.name())?;
        return Ok(());
    }

    #[allow(clippy::implicit_return)]
    async fn chat(&self, request: &CompletionRequest) -> Result<CompletionResponse, AiError> {
        let name = self.name().to_string();
        let body = self
            .send(request, false)
            .await?
            .json::<MessagesResponse>()
            .await
            .map_err(|err| return AiError::protocol(&name, &err.to_string()))?;
        tracing::debug!(body = ?body, "Completion response");

        let content = body
            .content
            .into_iter()
            .next()
            .map(|block| return block.text)
            .unwrap_or_default();

        let usage = body
            .usage
            .map(|usage| return Usage::new(usage.input_tokens, usage.output_tokens));

        return Ok(CompletionResponse {
            content,
            cost: estimate_cost(&request.model, usage.as_ref()),
            usage,
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

            // `event:` lines repeat the type carried inside the data payload.
            let SseLine::Data(data) = parse_sse_line(&line) else {
                continue;
            };

            let event = match serde_json::from_str::<StreamEvent>(data) {
                Ok(event) => event,
                Err(err) => {
                    tracing::debug!(error = %err, line = data, "Skipping stream chunk");
                    continue;
                }
            };
            tracing::debug!(body = ?event, "Completion response");

            match event {
                StreamEvent::ContentBlockDelta {
                    delta: BlockDelta::TextDelta { text },
                } => {
                    if !text.is_empty() {
                        tx.send(text).await?;
                    }
                }
                StreamEvent::MessageStop => break,
                StreamEvent::Error { error } => {
                    tracing::error!(error = %error.describe(), "Anthropic stream failed");
                    return Err(AiError::protocol(&name, &error.describe()));
                }
                _ => continue,
            }
        }

        return Ok(());
    }
}
