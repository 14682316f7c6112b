#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: &str) -> ChatMessage {
        return ChatMessage {
            role,
            content: content.to_string(),
        };
    }

    pub fn system(content: &str) -> ChatMessage {
        return ChatMessage::new(Role::System, content);
    }

    pub fn user(content: &str) -> ChatMessage {
        return ChatMessage::new(Role::User, content);
    }

    pub fn assistant(content: &str) -> ChatMessage {
        return ChatMessage::new(Role::Assistant, content);
    }
}

/// Splits a conversation for backends that take system instructions
/// out-of-band. The first system message becomes the instruction, every
/// system message is removed from the returned turns, and the remaining turns
/// keep their order.
pub fn split_system_message(messages: &[ChatMessage]) -> (Option<String>, Vec<ChatMessage>) {
    let system = messages
        .iter()
        .find(|msg| return msg.role == Role::System)
        .map(|msg| return msg.content.to_string());

    let turns = messages
        .iter()
        .filter(|msg| return msg.role != Role::System)
        .cloned()
        .collect::<Vec<ChatMessage>>();

    return (system, turns);
}
