//! API and Database Models
//!
//! This module defines the data structures used for both database mapping
//! with `sqlx` and for generating OpenAPI documentation with `utoipa`.

use chrono::{DateTime, Utc};
use lumen_core::Role;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(sqlx::Type, Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

/// One archived voice session, without its messages.
#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct SessionSummary {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(example = "What is the capital of Portuga")]
    pub title: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub message_count: i64,
}

#[derive(Serialize, Deserialize, ToSchema, FromRow, Debug, Clone)]
pub struct Message {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// An archived session with its full, ordered transcript.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
pub struct SessionDetail {
    #[serde(flatten)]
    pub session: SessionSummary,
    pub messages: Vec<Message>,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn summary() -> SessionSummary {
        SessionSummary {
            id: Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap(),
            title: "Voice Session".to_string(),
            started_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
            ended_at: Utc.with_ymd_and_hms(2024, 1, 15, 10, 45, 0).unwrap(),
            message_count: 2,
        }
    }

    #[test]
    fn test_message_role_serialization() {
        assert_eq!(serde_json::to_string(&MessageRole::User).unwrap(), "\"User\"");
        assert_eq!(
            serde_json::to_string(&MessageRole::Assistant).unwrap(),
            "\"Assistant\""
        );
        let result: Result<MessageRole, _> = serde_json::from_str("\"Ai\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_message_role_display() {
        assert_eq!(format!("{}", MessageRole::User), "user");
        assert_eq!(format!("{}", MessageRole::Assistant), "assistant");
    }

    #[test]
    fn test_message_role_from_core_role() {
        assert_eq!(MessageRole::from(Role::User), MessageRole::User);
        assert_eq!(MessageRole::from(Role::Assistant), MessageRole::Assistant);
    }

    #[test]
    fn test_session_detail_flattens_summary() {
        let detail = SessionDetail {
            session: summary(),
            messages: vec![Message {
                id: Uuid::new_v4(),
                session_id: summary().id,
                role: MessageRole::User,
                content: "Hello".to_string(),
                created_at: Utc::now(),
            }],
        };

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "550e8400-e29b-41d4-a716-446655440000");
        assert_eq!(json["title"], "Voice Session");
        assert_eq!(json["message_count"], 2);
        assert_eq!(json["messages"][0]["content"], "Hello");
        assert_eq!(json["messages"][0]["role"], "User");
    }

    #[test]
    fn test_datetime_handling() {
        let json = serde_json::to_string(&summary()).unwrap();
        let deserialized: SessionSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.started_at, summary().started_at);
        assert_eq!(deserialized.ended_at, summary().ended_at);
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "Session not found".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"Session not found"}"#);
    }
}
