use std::str::FromStr;

use anyhow::Result;
use serde_json::json;
use strum::IntoEnumIterator;
use test_utils::chat_completion;

use super::explanation;
use super::refactor_prompt;
use super::RefactorAction;
use super::RefactorRequest;
use crate::domain::services::testing::openai_state;

fn request(action: RefactorAction) -> RefactorRequest {
    return RefactorRequest {
        code: "function f(a){return a*2}".to_string(),
        action,
        language: "typescript".to_string(),
        context: None,
    };
}

#[test]
fn it_names_actions_in_kebab_case() -> Result<()> {
    let ids = RefactorAction::iter()
        .map(|action| return action.to_string())
        .collect::<Vec<String>>();

    assert_eq!(
        ids,
        vec!["extract-function", "add-types", "optimize", "simplify", "add-comments"]
    );
    assert_eq!(RefactorAction::from_str("add-types")?, RefactorAction::AddTypes);
    assert_eq!(RefactorAction::Optimize.label(), "Optimize Code");

    return Ok(());
}

#[test]
fn it_builds_action_prompts_with_optional_context() {
    let mut req = request(RefactorAction::AddTypes);
    req.context = Some("Used by the pricing page".to_string());

    insta::assert_snapshot!(refactor_prompt(&req).user, @r###"
    Add typescript type annotations to improve type safety.

    Context: Used by the pricing page

    Language: typescript

    Original code:
    ```typescript
    function f(a){return a*2}
    ```

    Provide the refactored code in a code block, followed by a brief explanation.
    "###);
}

#[test]
fn it_explains_with_the_text_after_the_block() {
    assert_eq!(explanation("```ts\nx\n```\nShorter now."), "Shorter now.");
    assert_eq!(explanation("```ts\nx\n```"), "Refactored successfully");
    assert_eq!(explanation("no block at all"), "Refactored successfully");
}

#[tokio::test]
async fn it_refactors_through_the_selected_provider() -> Result<()> {
    let answer = "Here you go:\n```typescript\nconst double = (a: number): number => a * 2;\n```\nUses an arrow function.";

    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_body(mockito::Matcher::PartialJson(json!({ "model": "gpt-4" })))
        .with_status(200)
        .with_body(chat_completion(answer))
        .create_async()
        .await;

    let state = openai_state(&server.url());
    let res = state.refactor(&request(RefactorAction::Simplify)).await?;
    mock.assert_async().await;

    assert_eq!(res.action, RefactorAction::Simplify);
    assert_eq!(res.original_code, "function f(a){return a*2}");
    assert_eq!(res.refactored_code, "const double = (a: number): number => a * 2;");
    assert_eq!(res.explanation, "Uses an arrow function.");

    return Ok(());
}
