use anyhow::Result;
use serde_json::json;
use test_utils::chat_completion;

use super::coverage;
use super::tests_prompt;
use crate::domain::services::testing::openai_state;

#[test]
fn it_guesses_coverage_from_the_answer() {
    assert_eq!(
        coverage("covers the happy path, an edge case and the error branch"),
        vec!["Happy path", "Edge cases", "Error handling"]
    );
    assert_eq!(coverage("throws an exception"), vec!["Error handling"]);
    assert_eq!(coverage("```\nassert(true)\n```"), vec!["Basic tests"]);
}

#[test]
fn it_asks_for_the_requested_framework() {
    let prompt = tests_prompt("def add(a, b): return a + b", "python", "pytest");

    assert!(prompt
        .user
        .starts_with("Generate comprehensive unit tests for this python code using pytest."));
    assert!(prompt.user.contains("- Use pytest syntax\n"));
}

#[tokio::test]
async fn it_returns_the_test_block() -> Result<()> {
    let answer = "These tests cover the happy path.\n```python\ndef test_add():\n    assert add(1, 2) == 3\n```";

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::PartialJson(json!({ "max_tokens": 2000 })))
        .with_status(200)
        .with_body(chat_completion(answer))
        .create_async()
        .await;

    let state = openai_state(&server.url());
    let tests = state
        .generate_tests("def add(a, b): return a + b", "python", "pytest")
        .await?;
    mock.assert_async().await;

    assert_eq!(tests.framework, "pytest");
    assert_eq!(tests.code, "def test_add():\n    assert add(1, 2) == 3");
    assert_eq!(tests.coverage, vec!["Happy path"]);

    return Ok(());
}
