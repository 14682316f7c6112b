#[cfg(test)]
#[path = "project_parser_test.rs"]
mod tests;

use std::collections::BTreeMap;
use std::path::Component;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Captures;
use regex::Regex;

/// `// src/App.tsx` or `# app.py` on its own line, followed by a block.
static MARKED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(
        r"(?m)^[ \t]*(?P<marker>//|#)[ \t]*(?P<path>[^\s`]+)[ \t]*\n(?P<fence>```(?:\w+)?\n)(?P<content>[\s\S]*?)```",
    )
    .unwrap();
});

/// `File: src/App.tsx` or ``Path: `src/App.tsx` `` followed by a block.
static LABELED_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(
        r"(?:File|Path):[ \t]*`?(?P<path>[^`\n]+)`?\n(?P<fence>```(?:\w+)?\n)(?P<content>[\s\S]*?)```",
    )
    .unwrap();
});

/// A block whose first line is the path comment.
static INLINE_BLOCK: Lazy<Regex> = Lazy::new(|| {
    return Regex::new(
        r"(?P<fence>```(?:\w+)?\n)(?P<marker>//|#)[ \t]*(?P<path>[^\s`]+)[ \t]*\n(?P<content>[\s\S]*?)```",
    )
    .unwrap();
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub path: String,
    pub content: String,
}

impl FileEntry {
    /// True when the path stays below whatever root it is written to.
    pub fn is_contained(&self) -> bool {
        let path = Path::new(&self.path);
        return !self.path.is_empty()
            && path
                .components()
                .all(|component| return matches!(component, Component::Normal(_) | Component::CurDir));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStructure {
    pub name: String,
    pub description: String,
    pub files: Vec<FileEntry>,
}

/// `#` doubles as a markdown heading, so files named by a `#` marker must
/// carry an extension or a directory. `//` and labeled markers are trusted.
fn is_marker_accepted(caps: &Captures, path: &str) -> bool {
    let hashed = caps.name("marker").map(|marker| return marker.as_str()) == Some("#");
    return !hashed || path.contains('.') || path.contains('/');
}

fn entry(caps: &Captures) -> Option<(usize, FileEntry)> {
    let path = caps.name("path")?.as_str().trim();
    let content = caps.name("content")?.as_str();
    if path.is_empty() || content.is_empty() {
        return None;
    }

    let fence = caps.name("fence")?.start();
    return Some((
        fence,
        FileEntry {
            path: path.to_string(),
            content: content.trim().to_string(),
        },
    ));
}

pub struct ProjectParser {}

impl ProjectParser {
    /// Scans a multi-file response. Each file is one fenced block introduced
    /// by a path marker; anything else is ignored. Returns `None` when no file
    /// was found.
    pub fn parse_response(response: &str) -> Option<ProjectStructure> {
        // Keyed by the offset of the opening fence so every block counts once.
        let mut files: BTreeMap<usize, FileEntry> = BTreeMap::new();
        let patterns: [&Regex; 3] = [&*MARKED_BLOCK, &*LABELED_BLOCK, &*INLINE_BLOCK];

        for re in patterns {
            for caps in re.captures_iter(response) {
                let Some((fence, file)) = entry(&caps) else {
                    continue;
                };
                if !is_marker_accepted(&caps, &file.path) {
                    continue;
                }

                files.entry(fence).or_insert(file);
            }
        }

        if files.is_empty() {
            return None;
        }

        return Some(ProjectStructure {
            name: "Generated Project".to_string(),
            description: "AI-generated project".to_string(),
            files: files.into_values().collect(),
        });
    }
}

impl ProjectStructure {
    /// Prefixes every file path with `root`, normalising separators to `/`.
    pub fn resolve_file_paths(&self, root: &str) -> Vec<FileEntry> {
        return self
            .files
            .iter()
            .map(|file| {
                return FileEntry {
                    path: format!("{root}/{path}", path = file.path).replace('\\', "/"),
                    content: file.content.to_string(),
                };
            })
            .collect();
    }

    /// Groups files by parent directory. Top level files land under `/`.
    pub fn group_by_directory(files: &[FileEntry]) -> BTreeMap<String, Vec<FileEntry>> {
        let mut grouped: BTreeMap<String, Vec<FileEntry>> = BTreeMap::new();

        for file in files {
            let dir = match file.path.rsplit_once('/') {
                Some((dir, _)) if !dir.is_empty() => dir.to_string(),
                _ => "/".to_string(),
            };

            grouped.entry(dir).or_default().push(file.clone());
        }

        return grouped;
    }
}
