//! Chat messages produced by a voice session and the record handed to history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title used when a conversation has no user message.
pub const FALLBACK_TITLE: &str = "Voice Session";
const TITLE_CHARS: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One committed line of the conversation. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text: text.into(),
            created_at: Utc::now(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(Role::Assistant, text)
    }
}

/// A finished conversation, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: Uuid,
    pub title: String,
    pub messages: Vec<ChatMessage>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Snapshots `messages`, or `None` when there is nothing worth keeping.
    pub fn from_conversation(
        id: Uuid,
        started_at: DateTime<Utc>,
        messages: &[ChatMessage],
    ) -> Option<Self> {
        if messages.is_empty() {
            return None;
        }
        Some(Self {
            id,
            title: derive_title(messages),
            messages: messages.to_vec(),
            started_at,
            ended_at: Utc::now(),
        })
    }
}

/// The first user message cut to its first 30 characters, or [`FALLBACK_TITLE`].
pub fn derive_title(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .find(|message| message.role == Role::User)
        .map(|message| message.text.trim())
        .filter(|text| !text.is_empty())
        .map(|text| text.chars().take(TITLE_CHARS).collect::<String>().trim_end().to_string())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn title_uses_first_user_message() {
        let messages = vec![
            ChatMessage::assistant("Welcome back"),
            ChatMessage::user("What is the capital of Portugal and why is it there?"),
            ChatMessage::user("second"),
        ];
        assert_eq!(derive_title(&messages), "What is the capital of Portuga");
    }

    #[test]
    fn title_counts_characters_not_bytes() {
        let messages = vec![ChatMessage::user("日本語".repeat(20))];
        assert_eq!(derive_title(&messages).chars().count(), 30);
    }

    #[test]
    fn title_falls_back_without_user_message() {
        let messages = vec![ChatMessage::assistant("Hi, I'm listening")];
        assert_eq!(derive_title(&messages), FALLBACK_TITLE);
        assert_eq!(derive_title(&[ChatMessage::user("   ")]), FALLBACK_TITLE);
    }

    #[test]
    fn empty_conversation_has_no_record() {
        assert!(SessionRecord::from_conversation(Uuid::new_v4(), Utc::now(), &[]).is_none());
    }

    #[test]
    fn record_keeps_message_order() {
        let id = Uuid::new_v4();
        let messages = vec![ChatMessage::user("Hello"), ChatMessage::assistant("Hi")];
        let record = SessionRecord::from_conversation(id, Utc::now(), &messages).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.title, "Hello");
        assert_eq!(record.messages, messages);
        assert!(record.ended_at >= record.started_at);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::user("x")).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("createdAt").is_some());
    }
}
