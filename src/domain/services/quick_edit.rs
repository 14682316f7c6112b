#[cfg(test)]
#[path = "quick_edit_test.rs"]
mod tests;

use std::fmt;

use super::code_or_text;
use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

const EDITOR_PROMPT: &str = "You are a code editor. Return ONLY the edited code, no explanations. Keep the same structure and style.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickEditRequest {
    pub code: String,
    pub instruction: String,
    pub language: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DiffLine {
    Same(String),
    Removed(String),
    Added(String),
}

impl fmt::Display for DiffLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffLine::Same(line) => return write!(f, "  {line}"),
            DiffLine::Removed(line) => return write!(f, "- {line}"),
            DiffLine::Added(line) => return write!(f, "+ {line}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuickEdit {
    pub original_code: String,
    pub edited_code: String,
    pub diff: Vec<DiffLine>,
}

impl QuickEdit {
    pub fn render_diff(&self) -> String {
        return self
            .diff
            .iter()
            .map(|line| return format!("{line}\n"))
            .collect::<String>();
    }
}

/// Compares both versions line by line at the same index. A changed line is
/// shown as its removal followed by its addition; blank sides are omitted.
pub fn line_diff(original: &str, edited: &str) -> Vec<DiffLine> {
    let original = original.split('\n').collect::<Vec<&str>>();
    let edited = edited.split('\n').collect::<Vec<&str>>();

    let mut diff = vec![];
    for idx in 0..original.len().max(edited.len()) {
        let before = original.get(idx).copied().unwrap_or_default();
        let after = edited.get(idx).copied().unwrap_or_default();

        if before == after {
            diff.push(DiffLine::Same(before.to_string()));
            continue;
        }

        if !before.is_empty() {
            diff.push(DiffLine::Removed(before.to_string()));
        }
        if !after.is_empty() {
            diff.push(DiffLine::Added(after.to_string()));
        }
    }

    return diff;
}

fn quick_edit_prompt(request: &QuickEditRequest) -> TaskPrompt {
    let user = format!(
        "Edit the following {language} code according to the instruction.\n\nOriginal code:\n```{language}\n{code}\n```\n\nInstruction: {instruction}",
        language = request.language,
        code = request.code,
        instruction = request.instruction,
    );

    return TaskPrompt::new(EDITOR_PROMPT, &user)
        .with_temperature(0.1)
        .with_max_tokens(500);
}

impl AppState {
    /// Applies a natural language instruction to `code` and diffs the result
    /// against the original.
    pub async fn quick_edit(&self, request: &QuickEditRequest) -> Result<QuickEdit, AiError> {
        let answer = self.complete_task(&quick_edit_prompt(request)).await?;
        let edited_code = code_or_text(&answer);
        let diff = line_diff(&request.code, &edited_code);
        tracing::debug!(lines = diff.len(), "Quick edit applied");

        return Ok(QuickEdit {
            original_code: request.code.to_string(),
            edited_code,
            diff,
        });
    }
}
