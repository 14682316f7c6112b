use std::sync::Arc;

use anyhow::Result;
use serde_json::json;
use test_utils::chat_chunk;
use test_utils::json_lines;
use test_utils::sse_body;
use tokio::sync::broadcast;

use super::conversation;
use super::LocalHost;
use crate::domain::models::AiError;
use crate::domain::models::ChatMessage;
use crate::domain::models::GenerationParams;
use crate::domain::models::HostBridge;
use crate::domain::models::HostEvent;
use crate::domain::services::prompts::HOST_SYSTEM_PROMPT;
use crate::infrastructure::backends::lmstudio::LmStudio;
use crate::infrastructure::backends::ollama::Ollama;

fn host(url: &str) -> LocalHost {
    return LocalHost::new(
        Arc::new(Ollama::new(url, reqwest::Client::new())),
        Arc::new(LmStudio::new(url, reqwest::Client::new())),
    );
}

fn params(id: u64, provider: &str, history: &str) -> GenerationParams {
    return GenerationParams {
        id,
        model: "qwen2.5-coder:1.5b".to_string(),
        prompt: "make a button".to_string(),
        provider: provider.to_string(),
        history: history.to_string(),
    };
}

fn drain(rx: &mut broadcast::Receiver<HostEvent>) -> Vec<HostEvent> {
    let mut events = vec![];
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }

    return events;
}

#[test]
fn it_prepends_the_default_system_prompt() {
    let messages = conversation(&params(1, "ollama", ""));

    assert_eq!(
        messages,
        vec![
            ChatMessage::system(HOST_SYSTEM_PROMPT),
            ChatMessage::user("make a button"),
        ]
    );
}

#[test]
fn it_keeps_history_with_its_own_system_prompt() -> Result<()> {
    let history = serde_json::to_string(&vec![
        ChatMessage::system("Only HTML."),
        ChatMessage::user("hi"),
        ChatMessage::assistant("hello"),
    ])?;
    let messages = conversation(&params(1, "ollama", &history));

    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0], ChatMessage::system("Only HTML."));
    assert_eq!(messages[3], ChatMessage::user("make a button"));

    return Ok(());
}

#[test]
fn it_ignores_unreadable_history() {
    let messages = conversation(&params(1, "ollama", "not json"));
    assert_eq!(messages.len(), 2);
}

#[tokio::test]
async fn it_publishes_ollama_tokens() -> Result<()> {
    let body = json_lines(&[
        json!({ "response": "<but", "done": false }),
        json!({ "response": "ton/>", "done": true }),
    ]);

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(mockito::Matcher::PartialJson(json!({
            "system": HOST_SYSTEM_PROMPT,
            "prompt": "make a button",
        })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let host = host(&server.url());
    let mut rx = host.subscribe();
    host.start_generation(params(7, "ollama", "")).await?;
    mock.assert_async().await;

    assert_eq!(
        drain(&mut rx),
        vec![
            HostEvent::Token {
                id: 7,
                token: "<but".to_string()
            },
            HostEvent::Token {
                id: 7,
                token: "ton/>".to_string()
            },
            HostEvent::Finished { id: 7 },
        ]
    );

    return Ok(());
}

#[tokio::test]
async fn it_forwards_history_to_ollama() -> Result<()> {
    let history = serde_json::to_string(&vec![
        ChatMessage::user("make a link"),
        ChatMessage::assistant("previous answer"),
    ])?;

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(mockito::Matcher::Regex("previous answer".to_string()))
        .with_status(200)
        .with_body(json_lines(&[json!({ "response": "ok", "done": true })]))
        .create_async()
        .await;

    let host = host(&server.url());
    let mut rx = host.subscribe();
    host.start_generation(params(5, "ollama", &history)).await?;
    mock.assert_async().await;

    assert_eq!(drain(&mut rx).len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_publishes_lmstudio_tokens() -> Result<()> {
    let body = [sse_body(&[chat_chunk("ok")]), "data: [DONE]\n\n".to_string()].join("");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let host = host(&server.url());
    let mut rx = host.subscribe();
    host.start_generation(params(3, "lmstudio", "")).await?;
    mock.assert_async().await;

    assert_eq!(drain(&mut rx).len(), 2);

    return Ok(());
}

#[tokio::test]
async fn it_rejects_unknown_providers() {
    let host = host("http://127.0.0.1:1");
    let mut rx = host.subscribe();

    let res = host.start_generation(params(1, "koboldcpp", "")).await;

    assert!(matches!(res, Err(AiError::UnknownProvider(_))));
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn it_fails_without_finishing_when_the_backend_fails() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/api/generate")
        .with_status(500)
        .create_async()
        .await;

    let host = host(&server.url());
    let mut rx = host.subscribe();
    let res = host.start_generation(params(1, "ollama", "")).await;
    mock.assert_async().await;

    assert!(matches!(res, Err(AiError::Protocol { .. })));
    assert!(drain(&mut rx).is_empty());
}
