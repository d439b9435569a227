//! Data Access Layer
//!
//! This module contains all the functions for interacting with the PostgreSQL database.
//! It uses `sqlx` runtime queries and connection pooling.

use anyhow::Result;
use async_trait::async_trait;
use lumen_core::{HistoryStore, SessionRecord};
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{Message, MessageRole, SessionDetail, SessionSummary};

const SUMMARY_COLUMNS: &str = r#"
    SELECT s.id, s.title, s.started_at, s.ended_at,
           (SELECT COUNT(*) FROM messages m WHERE m.session_id = s.id) AS message_count
    FROM sessions s
"#;

/// A wrapper around the `PgPool` to provide a clear data access interface.
#[derive(Clone)]
pub struct Db {
    pool: PgPool,
}

impl Db {
    /// Creates a new `Db` instance.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Runs all pending `sqlx` migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Stores a finished session and its messages in a single transaction.
    pub async fn save_session(&self, record: &SessionRecord) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO sessions (id, title, started_at, ended_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(&record.title)
        .bind(record.started_at)
        .bind(record.ended_at)
        .execute(&mut *tx)
        .await?;

        for (position, message) in record.messages.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO messages (id, session_id, position, role, content, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(message.id)
            .bind(record.id)
            .bind(i32::try_from(position)?)
            .bind(MessageRole::from(message.role))
            .bind(&message.text)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(session_id = %record.id, messages = record.messages.len(), "Session stored");
        Ok(())
    }

    /// Lists archived sessions, most recent first.
    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>> {
        let sessions = sqlx::query_as::<_, SessionSummary>(&format!(
            "{SUMMARY_COLUMNS} ORDER BY s.ended_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// Retrieves one archived session with its messages in conversation order.
    pub async fn get_session(&self, session_id: Uuid) -> Result<Option<SessionDetail>> {
        let session = sqlx::query_as::<_, SessionSummary>(&format!(
            "{SUMMARY_COLUMNS} WHERE s.id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(session) = session else {
            return Ok(None);
        };

        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT id, session_id, role, content, created_at
            FROM messages
            WHERE session_id = $1
            ORDER BY position ASC
            "#,
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(SessionDetail { session, messages }))
    }
}

#[async_trait]
impl HistoryStore for Db {
    async fn save(&self, record: SessionRecord) -> Result<()> {
        self.save_session(&record).await
    }
}
