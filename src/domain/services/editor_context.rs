#[cfg(test)]
#[path = "editor_context_test.rs"]
mod tests;

use std::path::Path;

use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

const ASSISTANT_PROMPT: &str = "You are an AI coding assistant.";

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CursorPosition {
    pub line: usize,
    pub column: usize,
}

/// What the editor is looking at when a question is asked.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditorContext {
    pub current_file: Option<String>,
    pub language: Option<String>,
    pub selected_text: Option<String>,
    pub cursor: Option<CursorPosition>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextPrompt {
    pub system_prompt: String,
    pub user_prompt: String,
}

/// Maps a file extension to the language id used in fences and prompts.
/// Unknown extensions are passed through as-is.
pub fn language_for_path(path: &str) -> Option<String> {
    let ext = Path::new(path).extension()?.to_str()?;
    let language = match ext {
        "ts" => "typescript",
        "tsx" => "typescriptreact",
        "js" => "javascript",
        "jsx" => "javascriptreact",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "cpp" => "cpp",
        "c" => "c",
        "css" => "css",
        "html" => "html",
        "json" => "json",
        "md" => "markdown",
        other => other,
    };

    return Some(language.to_string());
}

impl EditorContext {
    /// Context for a whole file, with the language derived from its name.
    pub fn for_file(path: &str, content: &str) -> EditorContext {
        return EditorContext {
            current_file: Some(path.to_string()),
            language: language_for_path(path),
            selected_text: Some(content.to_string()),
            cursor: None,
        };
    }

    fn parts(&self, include_file: bool, include_selection: bool) -> Vec<String> {
        let mut parts = vec![];
        let language = self.language.as_deref().unwrap_or_default();

        if let (true, Some(file)) = (include_file, &self.current_file) {
            parts.push(format!("Current file: {file}"));
            if !language.is_empty() {
                parts.push(format!("Language: {language}"));
            }
        }

        if let (true, Some(selection)) = (include_selection, &self.selected_text) {
            let line_count = selection.split('\n').count();
            parts.push(format!("\nSelected code ({line_count} lines):"));
            parts.push(format!("```{language}"));
            parts.push(selection.to_string());
            parts.push("```".to_string());
        }

        if let Some(cursor) = self.cursor {
            parts.push(format!(
                "\nCursor at line {}, column {}",
                cursor.line, cursor.column
            ));
        }

        return parts;
    }

    /// Wraps `message` with whatever parts of the context were asked for.
    pub fn build_prompt(
        &self,
        message: &str,
        include_file: bool,
        include_selection: bool,
    ) -> ContextPrompt {
        let parts = self.parts(include_file, include_selection);
        if parts.is_empty() {
            return ContextPrompt {
                system_prompt: ASSISTANT_PROMPT.to_string(),
                user_prompt: message.to_string(),
            };
        }

        let context = parts.join("\n");
        return ContextPrompt {
            system_prompt: format!("{ASSISTANT_PROMPT} Here is the current context:\n\n{context}"),
            user_prompt: message.to_string(),
        };
    }

    /// One-line status such as `main.rs • 3 lines selected • Line 4`.
    pub fn summary(&self) -> String {
        let mut parts = vec![];

        if let Some(file) = &self.current_file {
            let name = file.rsplit(['/', '\\']).next().unwrap_or(file.as_str());
            parts.push(name.to_string());
        }

        if let Some(selection) = &self.selected_text {
            let line_count = selection.split('\n').count();
            let plural = if line_count > 1 { "s" } else { "" };
            parts.push(format!("{line_count} line{plural} selected"));
        }

        if let Some(cursor) = self.cursor {
            parts.push(format!("Line {}", cursor.line));
        }

        if parts.is_empty() {
            return "No context".to_string();
        }

        return parts.join(" • ");
    }
}

/// Keeps the first and last `max_lines / 2` lines of long code and marks how
/// many were dropped in between.
pub fn truncate_code(code: &str, max_lines: usize) -> String {
    let lines = code.split('\n').collect::<Vec<&str>>();
    if lines.len() <= max_lines {
        return code.to_string();
    }

    let half = max_lines / 2;
    let marker = format!("... ({} lines truncated) ...", lines.len() - max_lines);

    let mut kept = lines[..half].to_vec();
    kept.push(&marker);
    kept.extend_from_slice(&lines[lines.len() - half..]);

    return kept.join("\n");
}

impl AppState {
    /// Answers `message` with the editor context folded into the system
    /// prompt.
    pub async fn ask_in_context(
        &self,
        message: &str,
        context: &EditorContext,
    ) -> Result<String, AiError> {
        let prompt = context.build_prompt(message, true, true);
        tracing::debug!(context = %context.summary(), "Asking with editor context");

        return self
            .complete_task(&TaskPrompt::new(&prompt.system_prompt, &prompt.user_prompt))
            .await;
    }
}
