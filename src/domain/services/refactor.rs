#[cfg(test)]
#[path = "refactor_test.rs"]
mod tests;

use strum::EnumIter;
use strum::EnumString;

use super::code_or_text;
use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

const REFACTOR_PROMPT: &str = "You are a senior developer. Keep the same functionality. Only improve the code quality.";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, EnumIter, EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum RefactorAction {
    ExtractFunction,
    AddTypes,
    Optimize,
    Simplify,
    AddComments,
}

impl RefactorAction {
    pub fn label(&self) -> &'static str {
        match self {
            RefactorAction::ExtractFunction => return "Extract Function",
            RefactorAction::AddTypes => return "Add Types",
            RefactorAction::Optimize => return "Optimize Code",
            RefactorAction::Simplify => return "Simplify Logic",
            RefactorAction::AddComments => return "Add Comments",
        }
    }

    fn instruction(&self, language: &str) -> String {
        match self {
            RefactorAction::ExtractFunction => {
                return "Extract the selected code into a well-named function".to_string()
            }
            RefactorAction::AddTypes => {
                return format!("Add {language} type annotations to improve type safety")
            }
            RefactorAction::Optimize => {
                return "Optimize the code for better performance".to_string()
            }
            RefactorAction::Simplify => {
                return "Simplify the logic while maintaining functionality".to_string()
            }
            RefactorAction::AddComments => {
                return "Add clear, concise comments explaining the code".to_string()
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RefactorRequest {
    pub code: String,
    pub action: RefactorAction,
    pub language: String,
    pub context: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Refactoring {
    pub action: RefactorAction,
    pub original_code: String,
    pub refactored_code: String,
    pub explanation: String,
}

fn refactor_prompt(request: &RefactorRequest) -> TaskPrompt {
    let context = match &request.context {
        Some(context) => format!("Context: {context}\n\n"),
        None => "".to_string(),
    };

    let user = format!(
        "{instruction}.\n\n{context}Language: {language}\n\nOriginal code:\n```{language}\n{code}\n```\n\nProvide the refactored code in a code block, followed by a brief explanation.",
        instruction = request.action.instruction(&request.language),
        language = request.language,
        code = request.code,
    );

    return TaskPrompt::new(REFACTOR_PROMPT, &user);
}

/// Text after the first closed block, when there is any.
fn explanation(answer: &str) -> String {
    return answer
        .split("```")
        .nth(2)
        .map(|text| return text.trim())
        .filter(|text| return !text.is_empty())
        .unwrap_or("Refactored successfully")
        .to_string();
}

impl AppState {
    pub async fn refactor(&self, request: &RefactorRequest) -> Result<Refactoring, AiError> {
        let answer = self.complete_task(&refactor_prompt(request)).await?;
        tracing::debug!(action = %request.action, "Refactoring received");

        return Ok(Refactoring {
            action: request.action,
            original_code: request.code.to_string(),
            refactored_code: code_or_text(&answer),
            explanation: explanation(&answer),
        });
    }
}
