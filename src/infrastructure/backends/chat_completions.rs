//! Wire format shared by every backend speaking the OpenAI chat completions
//! protocol (OpenAI itself, OpenRouter and LM Studio).

#[cfg(test)]
#[path = "chat_completions_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::check_status;
use super::response_lines;
use crate::domain::models::estimate_cost;
use crate::domain::models::AiError;
use crate::domain::models::BackendName;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::CompletionResponse;
use crate::domain::models::FragmentSender;
use crate::domain::models::Usage;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
    pub max_tokens: u32,
    pub stream: bool,
}

impl ChatRequestBody {
    pub fn new(request: &CompletionRequest, stream: bool) -> ChatRequestBody {
        return ChatRequestBody {
            model: request.model.to_string(),
            messages: request.messages.clone(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        };
    }
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseChoice {
    pub message: ResponseMessage,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponseBody {
    pub choices: Vec<ResponseChoice>,
    #[serde(default)]
    pub usage: Option<ResponseUsage>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkChoice {
    pub delta: ChunkDelta,
}

#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkBody {
    pub choices: Vec<ChunkChoice>,
}

impl ChunkBody {
    fn text(self) -> Option<String> {
        return self
            .choices
            .into_iter()
            .next()
            .and_then(|choice| return choice.delta.content)
            .filter(|content| return !content.is_empty());
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    Ignored,
}

/// Classifies one server-sent-event line. Only `data: ` lines carry payload,
/// and the literal `[DONE]` terminates the stream.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data: ") else {
        return SseLine::Ignored;
    };

    if data.trim() == "[DONE]" {
        return SseLine::Done;
    }

    return SseLine::Data(data);
}

/// Sends a non-streaming completion and maps the answer.
pub async fn complete(
    backend: BackendName,
    builder: reqwest::RequestBuilder,
    request: &CompletionRequest,
) -> Result<CompletionResponse, AiError> {
    let name = backend.to_string();
    let res = builder
        .json(&ChatRequestBody::new(request, false))
        .send()
        .await
        .map_err(|err| return AiError::from_reqwest(&name, err))?;

    let body = check_status(backend, res)
        .await?
        .json::<ChatResponseBody>()
        .await
        .map_err(|err| return AiError::protocol(&name, &err.to_string()))?;
    tracing::debug!(body = ?body, "Completion response");

    let content = body
        .choices
        .into_iter()
        .next()
        .and_then(|choice| return choice.message.content)
        .unwrap_or_default();

    let usage = body.usage.map(|usage| {
        return Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        };
    });

    return Ok(CompletionResponse {
        content,
        cost: estimate_cost(&request.model, usage.as_ref()),
        usage,
    });
}

/// Opens a streaming completion and forwards every delta into `tx` until the
/// backend sends `[DONE]` or closes the body.
pub async fn stream(
    backend: BackendName,
    builder: reqwest::RequestBuilder,
    request: &CompletionRequest,
    tx: &FragmentSender,
) -> Result<(), AiError> {
    let name = backend.to_string();
    let res = builder
        .json(&ChatRequestBody::new(request, true))
        .send()
        .await
        .map_err(|err| return AiError::from_reqwest(&name, err))?;

    let res = check_status(backend, res).await?;
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

        match serde_json::from_str::<ChunkBody>(data) {
            Ok(chunk) => {
                tracing::debug!(body = ?chunk, "Completion response");
                if let Some(text) = chunk.text() {
                    tx.send(text).await?;
                }
            }
            Err(err) => {
                let parse_err = AiError::Parse(err.to_string());
                tracing::debug!(error = %parse_err, line = data, "Skipping stream chunk");
            }
        }
    }

    return Ok(());
}
