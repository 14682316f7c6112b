use test_utils::codeblock_fixture;

use super::code_or_text;
use super::extract_code;
use super::CodeExtractor;
use super::CodeMatch;

fn extract_all(fragments: &[&str]) -> Vec<Option<String>> {
    let mut extractor = CodeExtractor::default();
    return fragments
        .iter()
        .map(|fragment| {
            extractor.push(fragment);
            return extractor.code().map(|code| return code.to_string());
        })
        .collect();
}

#[test]
fn it_extracts_partial_then_complete_blocks() {
    let res = extract_all(&["```ht", "ml\nconst x=1;", "\n```"]);

    assert_eq!(
        res,
        vec![
            None,
            Some("const x=1;".to_string()),
            Some("const x=1;".to_string())
        ]
    );
}

#[test]
fn it_extracts_the_first_complete_block() {
    assert_eq!(
        extract_code(codeblock_fixture()),
        Some(CodeMatch::Complete(
            r#"export default function Counter() {
  const [count, setCount] = useState(0);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
}"#
            .to_string()
        ))
    );
}

#[test]
fn it_accepts_blocks_without_language() {
    let res = extract_code("Sure:\n```\nprint(1)\n```\n");
    assert_eq!(res, Some(CodeMatch::Complete("print(1)".to_string())));
}

#[test]
fn it_ignores_unknown_language_tags() {
    assert_eq!(extract_code("```ts\nlet a = 1;\n```"), None);
    assert_eq!(extract_code("```css\nbody {}"), None);
}

#[test]
fn it_returns_none_without_fences() {
    assert_eq!(extract_code("Just some text."), None);
    assert_eq!(extract_code("```rust"), None);
}

#[test]
fn it_extracts_open_blocks_to_the_end() {
    let res = extract_code("Here:\n```rust\nfn main() {\n    let a = 1;\n");
    assert_eq!(
        res,
        Some(CodeMatch::Partial("fn main() {\n    let a = 1;".to_string()))
    );
}

#[test]
fn it_falls_back_to_the_open_block_when_the_complete_one_is_empty() {
    let res = extract_code("```\n```\nrest");
    assert_eq!(res, Some(CodeMatch::Partial("```\nrest".to_string())));
}

#[test]
fn it_keeps_the_last_value_when_nothing_matches() {
    let mut extractor = CodeExtractor::default();
    assert!(extractor.push("```go\nfmt.Println()"));
    assert!(!extractor.push(""));
    assert_eq!(extractor.code(), Some("fmt.Println()"));
}

#[test]
fn it_stops_changing_once_a_block_is_closed() {
    let mut extractor = CodeExtractor::default();
    assert!(extractor.push("```python\nprint(1)\n```\n"));

    assert!(!extractor.push("```rust\nfn other() {}\n```"));
    assert_eq!(extractor.code(), Some("print(1)"));
    assert_eq!(
        extract_code(extractor.text()),
        Some(CodeMatch::Complete("print(1)".to_string()))
    );
}

#[test]
fn it_accumulates_every_fragment() {
    let mut extractor = CodeExtractor::default();
    for fragment in ["He", "llo", " world"] {
        extractor.push(fragment);
    }

    assert_eq!(extractor.text(), "Hello world");
    assert_eq!(extractor.code(), None);
}

#[test]
fn it_takes_blocks_in_any_language_for_tasks() {
    assert_eq!(code_or_text("Sure:\n```css\na { color: red; }\n```\nDone."), "a { color: red; }");
    assert_eq!(code_or_text("```c++\nint x;\n```"), "int x;");
    assert_eq!(code_or_text("  plain answer \n"), "plain answer");
}
