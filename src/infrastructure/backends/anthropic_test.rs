use anyhow::Result;
use serde_json::json;

use super::Anthropic;
use super::MessagesRequest;
use crate::domain::models::AiError;
use crate::domain::models::Backend;
use crate::domain::models::ChatMessage;
use crate::domain::models::CompletionRequest;
use crate::domain::models::FragmentStream;

impl Anthropic {
    fn with_url(url: String) -> Anthropic {
        let backend = Anthropic::new(&url, reqwest::Client::new());
        backend.set_api_key("abc");
        return backend;
    }
}

fn request() -> CompletionRequest {
    return CompletionRequest::new(
        "Anthropic",
        "claude-3-haiku-20240307",
        vec![
            ChatMessage::system("S"),
            ChatMessage::user("U1"),
            ChatMessage::assistant("A1"),
            ChatMessage::user("U2"),
        ],
    );
}

fn event_stream() -> String {
    let events = [
        ("message_start", json!({ "type": "message_start", "message": { "id": "msg_1" } })),
        (
            "content_block_start",
            json!({ "type": "content_block_start", "index": 0, "content_block": { "type": "text", "text": "" } }),
        ),
        ("ping", json!({ "type": "ping" })),
        (
            "content_block_delta",
            json!({ "type": "content_block_delta", "index": 0, "delta": { "type": "text_delta", "text": "Hello" } }),
        ),
        (
            "content_block_delta",
            json!({ "type": "content_block_delta", "index": 0, "delta": { "type": "input_json_delta", "partial_json": "{}" } }),
        ),
        (
            "content_block_delta",
            json!({ "type": "content_block_delta", "index": 0, "delta": { "type": "text_delta", "text": " there" } }),
        ),
        ("content_block_stop", json!({ "type": "content_block_stop", "index": 0 })),
        ("message_stop", json!({ "type": "message_stop" })),
    ];

    return events
        .iter()
        .map(|(event, data)| return format!("event: {event}\ndata: {data}\n\n"))
        .collect::<Vec<String>>()
        .join("");
}

#[test]
fn it_moves_the_system_message_out_of_band() -> Result<()> {
    let body = serde_json::to_string(&MessagesRequest::new(&request(), true))?;
    insta::assert_snapshot!(body, @r###"{"model":"claude-3-haiku-20240307","max_tokens":2000,"temperature":0.7,"system":"S","messages":[{"role":"user","content":"U1"},{"role":"assistant","content":"A1"},{"role":"user","content":"U2"}],"stream":true}"###);

    return Ok(());
}

#[tokio::test]
async fn it_streams_text_deltas_only() -> Result<()> {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "abc")
        .match_header("anthropic-version", "2023-06-01")
        .match_body(mockito::Matcher::PartialJson(json!({
            "system": "S",
            "stream": true,
            "messages": [
                { "role": "user", "content": "U1" },
                { "role": "assistant", "content": "A1" },
                { "role": "user", "content": "U2" },
            ],
        })))
        .with_status(200)
        .with_body(event_stream())
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let (tx, stream) = FragmentStream::channel();
    backend.chat_stream(&request(), &tx).await?;
    drop(tx);
    mock.assert_async().await;

    assert_eq!(stream.collect_text().await?, "Hello there");

    return Ok(());
}

#[tokio::test]
async fn it_fails_on_error_events_mid_stream() -> Result<()> {
    let events = [
        (
            "content_block_delta",
            json!({ "type": "content_block_delta", "index": 0, "delta": { "type": "text_delta", "text": "Hel" } }),
        ),
        (
            "error",
            json!({ "type": "error", "error": { "type": "overloaded_error", "message": "Overloaded" } }),
        ),
    ];
    let body = events
        .iter()
        .map(|(event, data)| return format!("event: {event}\ndata: {data}\n\n"))
        .collect::<Vec<String>>()
        .join("");

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let (tx, mut stream) = FragmentStream::channel();
    let res = backend.chat_stream(&request(), &tx).await;
    drop(tx);
    mock.assert_async().await;

    let err = res.unwrap_err();
    assert!(matches!(err, AiError::Protocol { .. }));
    insta::assert_snapshot!(err.to_string(), @"Anthropic API error: overloaded_error: Overloaded");

    let first = stream.next_fragment().await.transpose()?;
    assert_eq!(first, Some("Hel".to_string()));

    return Ok(());
}

#[tokio::test]
async fn it_reads_events_split_across_chunks() -> Result<()> {
    let body = event_stream();
    let (head, tail) = body.split_at(body.find("Hello").unwrap_or(0) + 2);
    let (head, tail) = (head.to_string(), tail.to_string());

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_chunked_body(move |w| {
            w.write_all(head.as_bytes())?;
            w.flush()?;
            std::thread::sleep(std::time::Duration::from_millis(20));
            return w.write_all(tail.as_bytes());
        })
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let (tx, stream) = FragmentStream::channel();
    backend.chat_stream(&request(), &tx).await?;
    drop(tx);
    mock.assert_async().await;

    assert_eq!(stream.collect_text().await?, "Hello there");

    return Ok(());
}

#[tokio::test]
async fn it_completes_with_usage_and_cost() -> Result<()> {
    let body = json!({
        "id": "msg_1",
        "type": "message",
        "role": "assistant",
        "content": [{ "type": "text", "text": "Hi!" }],
        "usage": { "input_tokens": 2000, "output_tokens": 1000 },
    });

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .match_body(mockito::Matcher::PartialJson(json!({ "stream": false })))
        .with_status(200)
        .with_body(body.to_string())
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.chat(&request()).await?;
    mock.assert_async().await;

    assert_eq!(res.content, "Hi!");
    assert_eq!(res.usage.map(|usage| return usage.total_tokens), Some(3000));
    // 2 * 0.00025 + 1 * 0.00125
    assert!((res.cost - 0.00175).abs() < 1e-9);

    return Ok(());
}

#[tokio::test]
async fn it_fails_without_api_key_before_any_request() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .expect(0)
        .create_async()
        .await;

    let backend = Anthropic::new(&server.url(), reqwest::Client::new());
    let (tx, _stream) = FragmentStream::channel();
    let res = backend.chat_stream(&request(), &tx).await;
    mock.assert_async().await;

    let err = res.unwrap_err();
    assert!(matches!(err, AiError::Configuration(_)));
    insta::assert_snapshot!(err.to_string(), @"Anthropic API key not set");
}

#[tokio::test]
async fn it_reports_failing_status_codes() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/messages")
        .with_status(529)
        .with_body("overloaded")
        .create_async()
        .await;

    let backend = Anthropic::with_url(server.url());
    let res = backend.chat(&request()).await;
    mock.assert_async().await;

    assert!(matches!(res, Err(AiError::Protocol { .. })));
}
