#[cfg(test)]
#[path = "docs_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

use super::code_or_text;
use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

static BLOCK_COMMENT: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"/\*\*[\s\S]*?\*/").unwrap();
});

const WRITER_PROMPT: &str = "You are a technical writer for software projects.";

/// Files listed in a README request; the rest are elided.
const README_FILE_LIMIT: usize = 10;

fn doc_comment_prompt(code: &str, language: &str) -> TaskPrompt {
    let user = format!(
        "Generate documentation comments for this {language} code in the idiomatic style of the language. Describe every parameter and the return value.\n\nCode:\n```{language}\n{code}\n```\n\nProvide only the comment block, ready to paste above the code."
    );

    return TaskPrompt::new(WRITER_PROMPT, &user);
}

fn explain_prompt(code: &str, language: &str) -> TaskPrompt {
    let user = format!(
        "Explain this {language} code in simple terms. What does it do? How does it work?\n\nCode:\n```{language}\n{code}\n```\n\nProvide a clear, concise explanation suitable for someone learning."
    );

    return TaskPrompt::new(WRITER_PROMPT, &user);
}

fn readme_prompt(project: &str, files: &[String]) -> TaskPrompt {
    let mut listed = files
        .iter()
        .take(README_FILE_LIMIT)
        .map(|file| return file.as_str())
        .collect::<Vec<&str>>()
        .join(", ");
    if files.len() > README_FILE_LIMIT {
        listed.push_str("...");
    }

    let user = format!(
        "Generate a professional README.md for this project.\n\nProject: {project}\nFiles: {listed}\n\nInclude:\n- Project title and description\n- Installation instructions\n- Usage examples\n- Features list\n- Tech stack\n\nKeep it concise and professional."
    );

    return TaskPrompt::new(WRITER_PROMPT, &user);
}

/// Pulls the comment out of an answer: a `/** */` block if there is one,
/// otherwise the first fenced block, otherwise the whole answer.
pub fn extract_doc_comment(answer: &str) -> String {
    if let Some(found) = BLOCK_COMMENT.find(answer) {
        return found.as_str().to_string();
    }

    return code_or_text(answer);
}

impl AppState {
    pub async fn document(&self, code: &str, language: &str) -> Result<String, AiError> {
        let answer = self.complete_task(&doc_comment_prompt(code, language)).await?;
        return Ok(extract_doc_comment(&answer));
    }

    pub async fn explain(&self, code: &str, language: &str) -> Result<String, AiError> {
        return self.complete_task(&explain_prompt(code, language)).await;
    }

    pub async fn write_readme(&self, project: &str, files: &[String]) -> Result<String, AiError> {
        tracing::debug!(project = %project, files = files.len(), "Writing README");
        return self.complete_task(&readme_prompt(project, files)).await;
    }
}
