#[cfg(test)]
#[path = "gemini_test.rs"]
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
use crate::domain::models::Role;
use crate::domain::models::Usage;

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: Option<&str>, text: &str) -> Content {
        return Content {
            role: role.map(|role| return role.to_string()),
            parts: vec![Part {
                text: text.to_string(),
            }],
        };
    }

    /// Gemini calls the assistant `model`.
    fn from_message(message: &ChatMessage) -> Content {
        let role = match message.role {
            Role::Assistant => "model",
            _ => "user",
        };

        return Content::new(Some(role), &message.content);
    }

    fn text(&self) -> String {
        return self
            .parts
            .iter()
            .map(|part| return part.text.as_str())
            .collect::<Vec<&str>>()
            .join("");
    }
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationConfig,
}

/// A chat session seeded with every turn but the last, followed by the final
/// message as the triggering user turn.
#[derive(Debug, Clone, PartialEq)]
struct ChatSession {
    history: Vec<Content>,
    trigger: Content,
}

impl ChatSession {
    fn new(messages: &[ChatMessage]) -> Result<ChatSession, AiError> {
        let Some((last, history)) = messages.split_last() else {
            return Err(AiError::Configuration(
                "Google Gemini requires at least one non-system message".to_string(),
            ));
        };

        return Ok(ChatSession {
            history: history.iter().map(Content::from_message).collect(),
            trigger: Content::new(Some("user"), &last.content),
        });
    }

    fn into_contents(self) -> Vec<Content> {
        let mut contents = self.history;
        contents.push(self.trigger);

        return contents;
    }
}

impl GenerateContentRequest {
    fn new(request: &CompletionRequest) -> Result<GenerateContentRequest, AiError> {
        let (system, messages) = split_system_message(&request.messages);
        let session = ChatSession::new(&messages)?;

        return Ok(GenerateContentRequest {
            contents: session.into_contents(),
            system_instruction: system.map(|text| return Content::new(None, &text)),
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        });
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    fn text(&self) -> String {
        return self
            .candidates
            .first()
            .and_then(|candidate| return candidate.content.as_ref())
            .map(|content| return content.text())
            .unwrap_or_default();
    }
}

pub struct Gemini {
    url: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl Default for Gemini {
    fn default() -> Gemini {
        return Gemini::new(&Config::get(ConfigKey::GeminiURL), http_client());
    }
}

impl Gemini {
    pub fn new(url: &str, client: reqwest::Client) -> Gemini {
        return Gemini {
            url: url.trim_end_matches('/').to_string(),
            api_key: ApiKey::default(),
            client,
        };
    }

    async fn send(
        &self,
        request: &CompletionRequest,
        method: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, AiError> {
        let name = self.name().to_string();
        let token = self.api_key.require(self.name())?;
        let body = GenerateContentRequest::new(request)?;

        let res = self
            .client
            .post(format!(
                "{url}/v1beta/models/{model}:{method}",
                url = self.url,
                model = request.model
            ))
            .query(query)
            .query(&[("key", token.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|err| return AiError::from_reqwest(&name, err))?;

        return check_status(self.name(), res).await;
    }
}

#[async_trait]
impl Backend for Gemini {
    fn name(&self) -> BackendName {
        return BackendName::Gemini;
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
            .send(request, "generateContent", &[])
            .await?
            .json::<GenerateContentResponse>()
            .await
            .map_err(|err| return AiError::protocol(&name, &err.to_string()))?;
        tracing::debug!(body = ?body, "Completion response");

        let usage = body.usage_metadata.as_ref().map(|usage| {
            return Usage::new(usage.prompt_token_count, usage.candidates_token_count);
        });

        return Ok(CompletionResponse {
            content: body.text(),
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
        let res = self
            .send(request, "streamGenerateContent", &[("alt", "sse")])
            .await?;
        let mut lines_reader = response_lines(res);

        loop {
            let line = match lines_reader.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(err) => return Err(AiError::network(&name, err)),
            };

            let data = match parse_sse_line(&line) {
                SseLine::Data(data) => data,
                SseLine::Done => break,
                SseLine::Ignored => continue,
            };

            let chunk = match serde_json::from_str::<GenerateContentResponse>(data) {
                Ok(chunk) => chunk,
                Err(err) => {
                    tracing::debug!(error = %err, line = data, "Skipping stream chunk");
                    continue;
                }
            };
            tracing::debug!(body = ?chunk, "Completion response");

            let text = chunk.text();
            if !text.is_empty() {
                tx.send(text).await?;
            }
        }

        return Ok(());
    }
}
