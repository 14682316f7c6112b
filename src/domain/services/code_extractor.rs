#[cfg(test)]
#[path = "code_extractor_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

static COMPLETE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(
        r"```(?:tsx|jsx|html|typescript|javascript|python|rust|go)?\n([\s\S]*?)```",
    )
    .unwrap();
});

static OPEN_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"```(?:tsx|jsx|html|typescript|javascript|python|rust|go)?\n([\s\S]*?)$")
        .unwrap();
});

/// A closed block with any language tag, or none.
static ANY_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(r"```[\w+#.-]*[ \t]*\n([\s\S]*?)\n?```").unwrap();
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodeMatch {
    /// The first fenced block, closed.
    Complete(String),
    /// A block that was opened but has not been closed yet.
    Partial(String),
}

impl CodeMatch {
    pub fn code(&self) -> &str {
        match self {
            CodeMatch::Complete(code) => return code,
            CodeMatch::Partial(code) => return code,
        }
    }
}

fn capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    return re
        .captures(text)
        .and_then(|caps| return caps.get(1))
        .map(|body| return body.as_str())
        .filter(|body| return !body.is_empty());
}

/// Finds the code a response is currently showing. A complete block wins,
/// otherwise the body of an unclosed block running to the end of the text.
/// Empty bodies never count.
pub fn extract_code(text: &str) -> Option<CodeMatch> {
    if let Some(body) = capture(&COMPLETE_BLOCK, text) {
        return Some(CodeMatch::Complete(body.trim().to_string()));
    }

    if let Some(body) = capture(&OPEN_BLOCK, text) {
        return Some(CodeMatch::Partial(body.trim().to_string()));
    }

    return None;
}

/// Body of the first closed block whatever its language, or the whole trimmed
/// text when the answer has no fences.
pub fn code_or_text(text: &str) -> String {
    match capture(&ANY_BLOCK, text) {
        Some(body) => return body.trim().to_string(),
        None => return text.trim().to_string(),
    }
}

/// Accumulates streamed fragments and tracks the extracted code block.
#[derive(Default, Debug, Clone)]
pub struct CodeExtractor {
    text: String,
    code: Option<String>,
    settled: bool,
}

impl CodeExtractor {
    /// Appends a fragment. Returns true when the extracted code changed.
    pub fn push(&mut self, fragment: &str) -> bool {
        self.text.push_str(fragment);

        // The first complete block can't move once found.
        if self.settled {
            return false;
        }

        let Some(found) = extract_code(&self.text) else {
            return false;
        };

        self.settled = matches!(found, CodeMatch::Complete(_));
        let code = found.code().to_string();
        if self.code.as_deref() == Some(code.as_str()) {
            return false;
        }

        self.code = Some(code);
        return true;
    }

    pub fn text(&self) -> &str {
        return &self.text;
    }

    pub fn code(&self) -> Option<&str> {
        return self.code.as_deref();
    }
}
