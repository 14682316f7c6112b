use serde_json::json;

/// Wraps each payload as a server-sent-event `data:` line.
pub fn sse_body(payloads: &[String]) -> String {
    return payloads
        .iter()
        .map(|payload| return format!("data: {payload}\n\n"))
        .collect::<Vec<String>>()
        .join("");
}

/// One chat completions streaming chunk carrying `text`.
pub fn chat_chunk(text: &str) -> String {
    return json!({
        "id": "chatcmpl-1",
        "object": "chat.completion.chunk",
        "choices": [{ "index": 0, "delta": { "content": text } }],
    })
    .to_string();
}

/// Newline delimited JSON, as spoken by Ollama.
pub fn json_lines(lines: &[serde_json::Value]) -> String {
    return lines
        .iter()
        .map(|line| return line.to_string())
        .collect::<Vec<String>>()
        .join("\n");
}

pub fn codeblock_fixture() -> &'static str {
    return r#"
Here's a counter component.

```tsx
export default function Counter() {
  const [count, setCount] = useState(0);
  return <button onClick={() => setCount(count + 1)}>{count}</button>;
}
```

And the same thing in plain HTML.

```html
<button id="counter">0</button>
```

That's it!
"#
    .trim();
}

pub fn project_fixture() -> &'static str {
    return r#"
Here is the project layout.

// src/main.rs
```rust
fn main() {
    println!("hello");
}
```

// src/lib/math.rs
```rust
pub fn add(a: i32, b: i32) -> i32 {
    return a + b;
}
```

# README.md
```
Run with cargo.
```
"#
    .trim();
}

/// A non-streaming chat completions body answering with `content`.
pub fn chat_completion(content: &str) -> String {
    return json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }],
        "usage": { "prompt_tokens": 20, "completion_tokens": 10, "total_tokens": 30 },
    })
    .to_string();
}
