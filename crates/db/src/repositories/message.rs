use sqlx::{sqlite::SqliteRow, Row};

use tourlead_core::domain::message::{Message, MessageId, MessageRole};
use tourlead_core::domain::session::SessionId;

use super::tenant::{format_timestamp, parse_timestamp};
use super::{MessageRepository, RepositoryError};
use crate::DbPool;

pub struct SqlMessageRepository {
    pool: DbPool,
}

impl SqlMessageRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl MessageRepository for SqlMessageRepository {
    async fn append(&self, message: Message) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO chat_message (id, session_id, role, content, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&message.id.0)
        .bind(&message.session_id.0)
        .bind(message.role.as_str())
        .bind(&message.content)
        .bind(format_timestamp(&message.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<Message>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, session_id, role, content, created_at
             FROM chat_message
             WHERE session_id = ?
             ORDER BY created_at ASC, rowid ASC",
        )
        .bind(&session_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }
}

fn message_from_row(row: SqliteRow) -> Result<Message, RepositoryError> {
    let role_raw = row.try_get::<String, _>("role")?;
    let role = MessageRole::parse(&role_raw)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown message role `{role_raw}`")))?;

    Ok(Message {
        id: MessageId(row.try_get("id")?),
        session_id: SessionId(row.try_get("session_id")?),
        role,
        content: row.try_get("content")?,
        created_at: parse_timestamp("created_at", row.try_get("created_at")?)?,
    })
}
