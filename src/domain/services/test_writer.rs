#[cfg(test)]
#[path = "test_writer_test.rs"]
mod tests;

use super::code_or_text;
use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

const TEST_WRITER_PROMPT: &str = "You write thorough, runnable unit tests.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedTests {
    pub framework: String,
    pub code: String,
    pub coverage: Vec<&'static str>,
}

fn tests_prompt(code: &str, language: &str, framework: &str) -> TaskPrompt {
    let user = format!(
        "Generate comprehensive unit tests for this {language} code using {framework}.\n\nCode to test:\n```{language}\n{code}\n```\n\nRequirements:\n- Use {framework} syntax\n- Test happy path\n- Test edge cases\n- Test error handling\n- Include mock data if needed\n- Add descriptive test names\n\nProvide complete, runnable test code."
    );

    return TaskPrompt::new(TEST_WRITER_PROMPT, &user);
}

/// Rough guess at what the answer covers, from the words it uses.
pub fn coverage(answer: &str) -> Vec<&'static str> {
    let mut covered = vec![];

    if answer.contains("happy path") || answer.contains("normal case") {
        covered.push("Happy path");
    }
    if answer.contains("edge case") {
        covered.push("Edge cases");
    }
    if answer.contains("error") || answer.contains("exception") {
        covered.push("Error handling");
    }

    if covered.is_empty() {
        covered.push("Basic tests");
    }

    return covered;
}

impl AppState {
    pub async fn generate_tests(
        &self,
        code: &str,
        language: &str,
        framework: &str,
    ) -> Result<GeneratedTests, AiError> {
        let answer = self
            .complete_task(&tests_prompt(code, language, framework))
            .await?;

        return Ok(GeneratedTests {
            framework: framework.to_string(),
            code: code_or_text(&answer),
            coverage: coverage(&answer),
        });
    }
}
