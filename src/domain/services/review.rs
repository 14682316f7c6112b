#[cfg(test)]
#[path = "review_test.rs"]
mod tests;

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_derive::Deserialize;
use strum::EnumString;

use super::AppState;
use super::TaskPrompt;
use crate::domain::models::AiError;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"\{[\s\S]*\}").unwrap();
});

const REVIEW_PROMPT: &str = "You are a senior code reviewer. Be concise and actionable. Only suggest real improvements.";

const REVIEW_FORMAT: &str = r#"Provide suggestions in this exact JSON format:
{
  "suggestions": [
    {
      "line": <line_number>,
      "severity": "error" | "warning" | "info",
      "category": "performance" | "security" | "style" | "logic" | "best-practice",
      "message": "Brief description of the issue",
      "fix": "Optional: suggested fix"
    }
  ]
}

Focus on:
- Performance issues
- Security vulnerabilities
- Code style and readability
- Logic errors
- Best practices"#;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    #[default]
    Info,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, EnumString, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ReviewCategory {
    Performance,
    Security,
    Style,
    Logic,
    #[default]
    BestPractice,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReviewSuggestion {
    pub line: u32,
    pub column: Option<u32>,
    pub end_line: Option<u32>,
    pub end_column: Option<u32>,
    pub severity: Severity,
    pub category: ReviewCategory,
    pub message: String,
    pub fix: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CodeReview {
    pub suggestions: Vec<ReviewSuggestion>,
    pub summary: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSuggestion {
    line: Option<u32>,
    column: Option<u32>,
    end_line: Option<u32>,
    end_column: Option<u32>,
    severity: Option<String>,
    category: Option<String>,
    message: Option<String>,
    fix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawReview {
    #[serde(default)]
    suggestions: Vec<RawSuggestion>,
}

impl From<RawSuggestion> for ReviewSuggestion {
    fn from(raw: RawSuggestion) -> ReviewSuggestion {
        return ReviewSuggestion {
            line: raw.line.filter(|line| return *line > 0).unwrap_or(1),
            column: raw.column,
            end_line: raw.end_line,
            end_column: raw.end_column,
            severity: raw
                .severity
                .and_then(|severity| return Severity::from_str(&severity).ok())
                .unwrap_or_default(),
            category: raw
                .category
                .and_then(|category| return ReviewCategory::from_str(&category).ok())
                .unwrap_or_default(),
            message: raw
                .message
                .filter(|message| return !message.is_empty())
                .unwrap_or_else(|| return "No message".to_string()),
            fix: raw.fix,
        };
    }
}

fn review_prompt(code: &str, language: &str, file_path: Option<&str>) -> TaskPrompt {
    let file = match file_path {
        Some(path) => format!("File: {path}\n\n"),
        None => "".to_string(),
    };

    let user = format!(
        "Analyze this {language} code and provide specific suggestions for improvement.\n\n{file}Code:\n```{language}\n{code}\n```\n\n{REVIEW_FORMAT}"
    );

    return TaskPrompt::new(REVIEW_PROMPT, &user);
}

/// Reads the JSON object spanning the first `{` to the last `}` of the
/// answer. Anything unreadable yields no suggestions.
pub fn parse_review(answer: &str) -> Vec<ReviewSuggestion> {
    let Some(found) = JSON_OBJECT.find(answer) else {
        return vec![];
    };

    let review = match serde_json::from_str::<RawReview>(found.as_str()) {
        Ok(review) => review,
        Err(err) => {
            tracing::debug!(error = %err, "Unreadable review answer");
            return vec![];
        }
    };

    return review
        .suggestions
        .into_iter()
        .map(ReviewSuggestion::from)
        .collect();
}

impl AppState {
    pub async fn review(
        &self,
        code: &str,
        language: &str,
        file_path: Option<&str>,
    ) -> Result<CodeReview, AiError> {
        let answer = self
            .complete_task(&review_prompt(code, language, file_path))
            .await?;
        let suggestions = parse_review(&answer);

        return Ok(CodeReview {
            summary: format!("Found {} suggestions", suggestions.len()),
            suggestions,
        });
    }
}
