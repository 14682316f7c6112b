use anyhow::Result;
use serde_json::json;
use test_utils::chat_chunk;
use test_utils::sse_body;

use super::OpenAI;
use crate::domain::models::AiError;
use crate::domain::models::Backend;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::FragmentStream;

impl OpenAI {
    fn with_url(url: String) -> OpenAI {
        let backend = OpenAI::new(&url, reqwest::Client::new());
        backend.set_api_key("abc");
        return backend;
    }
}

fn request(model: &str) -> CompletionRequest {
    return CompletionRequest::new(
        "OpenAI",
        model,
        vec![ChatMessage::system("Be brief."), ChatMessage::user("say hi")],
    );
}

async fn stream_text(backend: &OpenAI, request: &CompletionRequest) -> Result<String> {
    let (tx, stream) = FragmentStream::channel();
    backend.chat_stream(request, &tx).await?;
    drop(tx);

    return Ok(stream.collect_text().await?);
}

#[tokio::test]
async fn it_streams_completions() -> Result<()> {
    let body = [
        sse_body(&[chat_chunk("He"), chat_chunk("llo")]),
        "data: [DONE]\n\n".to_string(),
        sse_body(&[chat_chunk("never")]),
    ]
    .join("");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("Authorization", "Bearer abc")
        .match_body(mockito::Matcher::PartialJson(json!({ "stream": true })))
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let text = stream_text(&backend, &request("gpt-3.5-turbo")).await?;
    mock.assert_async().await;

    assert_eq!(text, "Hello");

    return Ok(());
}

#[tokio::test]
async fn it_reads_data_lines_split_across_chunks() -> Result<()> {
    let line = sse_body(&[chat_chunk("Hello, world")]);
    let (head, tail) = line.split_at(line.find("world").unwrap_or(0));
    let (head, tail) = (head.to_string(), tail.to_string());

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_chunked_body(move |w| {
            w.write_all(head.as_bytes())?;
            w.flush()?;
            std::thread::sleep(std::time::Duration::from_millis(20));
            w.write_all(tail.as_bytes())?;
            return w.write_all(b"data: [DONE]\n\n");
        })
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let text = stream_text(&backend, &request("gpt-3.5-turbo")).await?;
    mock.assert_async().await;

    assert_eq!(text, "Hello, world");

    return Ok(());
}

#[tokio::test]
async fn it_skips_malformed_chunks() -> Result<()> {
    let body = sse_body(&[
        chat_chunk("a"),
        "{not json".to_string(),
        chat_chunk(""),
        chat_chunk("b"),
    ]);

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let text = stream_text(&backend, &request("gpt-3.5-turbo")).await?;
    mock.assert_async().await;

    assert_eq!(text, "ab");

    return Ok(());
}

#[tokio::test]
async fn it_fails_without_api_key_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .expect(0)
        .create_async()
        .await;

    let backend = OpenAI::new(&server.url(), reqwest::Client::new());
    let (tx, _stream) = FragmentStream::channel();
    let res = backend.chat_stream(&request("gpt-4"), &tx).await;
    mock.assert_async().await;

    let err = res.unwrap_err();
    assert!(matches!(err, AiError::Configuration(_)));
    insta::assert_snapshot!(err.to_string(), @"OpenAI API key not set");
}

#[tokio::test]
async fn it_reports_failing_status_codes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body("invalid key")
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend.chat(&request("gpt-4")).await;
    mock.assert_async().await;

    let err = res.unwrap_err();
    assert!(matches!(err, AiError::Protocol { .. }));
    insta::assert_snapshot!(err.to_string(), @"OpenAI API error: HTTP 401 Unauthorized: invalid key");
}

#[tokio::test]
async fn it_completes_with_usage_and_cost() -> Result<()> {
    let body = json!({
        "choices": [{ "message": { "role": "assistant", "content": "Hi!" } }],
        "usage": { "prompt_tokens": 1000, "completion_tokens": 500, "total_tokens": 1500 },
    });

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("Authorization", "Bearer abc")
        .match_body(mockito::Matcher::PartialJson(json!({
            "model": "gpt-4",
            "stream": false,
            "messages": [
                { "role": "system", "content": "Be brief." },
                { "role": "user", "content": "say hi" },
            ],
        })))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let backend = OpenAI::with_url(server.url());
    let res = backend.chat(&request("gpt-4")).await?;
    mock.assert_async().await;

    assert_eq!(res.content, "Hi!");
    assert_eq!(res.usage.map(|usage| return usage.total_tokens), Some(1500));
    assert!((res.cost - 0.06).abs() < 1e-9);

    return Ok(());
}
