use super::split_system_message;
use super::ChatMessage;
use super::Role;

#[test]
fn it_serializes_roles_in_lowercase() {
    let msg = ChatMessage::system("Be brief.");
    let json = serde_json::to_string(&msg).unwrap();

    insta::assert_snapshot!(json, @r###"{"role":"system","content":"Be brief."}"###);
}

#[test]
fn it_deserializes_history() {
    let history = r#"[{"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]"#;
    let messages: Vec<ChatMessage> = serde_json::from_str(history).unwrap();

    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);
    assert_eq!(messages[1].role, Role::Assistant);
    assert_eq!(messages[1].content, "hello");
}

#[test]
fn it_extracts_the_system_message() {
    let messages = vec![ChatMessage::system("X"), ChatMessage::user("Y")];
    let (system, turns) = split_system_message(&messages);

    assert_eq!(system, Some("X".to_string()));
    assert_eq!(turns, vec![ChatMessage::user("Y")]);
}

#[test]
fn it_keeps_turn_order_without_a_system_message() {
    let messages = vec![
        ChatMessage::user("one"),
        ChatMessage::assistant("two"),
        ChatMessage::user("three"),
    ];
    let (system, turns) = split_system_message(&messages);

    assert_eq!(system, None);
    assert_eq!(turns, messages);
}

#[test]
fn it_uses_the_first_system_message() {
    let messages = vec![
        ChatMessage::user("one"),
        ChatMessage::system("first"),
        ChatMessage::system("second"),
        ChatMessage::user("two"),
    ];
    let (system, turns) = split_system_message(&messages);

    assert_eq!(system, Some("first".to_string()));
    assert_eq!(
        turns,
        vec![ChatMessage::user("one"), ChatMessage::user("two")]
    );
}
