//! PostgreSQL implementation of MessageStore

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::instrument;

use relay_core::entities::{Message, NewMessage, ReadReceipt};
use relay_core::traits::{MessageStore, RepoResult};
use relay_core::value_objects::{Snowflake, SnowflakeGenerator};

use crate::mappers::MessageInsert;
use crate::models::{MessageModel, MessageRefModel};

use super::error::{map_db_error, map_fk_violation, message_not_found, room_not_found};

/// PostgreSQL implementation of MessageStore
#[derive(Clone)]
pub struct PgMessageRepository {
    pool: PgPool,
    ids: Arc<SnowflakeGenerator>,
}

impl PgMessageRepository {
    /// Create a new PgMessageRepository
    pub fn new(pool: PgPool, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, ids }
    }
}

#[async_trait]
impl MessageStore for PgMessageRepository {
    #[instrument(skip(self, message), fields(room_id = %message.room_id, sender_id = %message.sender_id))]
    async fn append(&self, message: NewMessage) -> RepoResult<Message> {
        let room_id = message.room_id;
        let insert = MessageInsert::new(self.ids.generate(), &message);

        let stored = sqlx::query_as::<_, MessageModel>(
            r"
            INSERT INTO messages (id, room_id, sender_id, content, kind)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, room_id, sender_id, content, kind, created_at
            ",
        )
        .bind(insert.id)
        .bind(insert.room_id)
        .bind(insert.sender_id)
        .bind(insert.content)
        .bind(insert.kind)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_fk_violation(e, || room_not_found(room_id)))?;

        Ok(Message::from(stored))
    }

    #[instrument(skip(self))]
    async fn mark_read(
        &self,
        room_id: Snowflake,
        message_id: Snowflake,
        reader_id: Snowflake,
    ) -> RepoResult<Option<ReadReceipt>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let target = sqlx::query_as::<_, MessageRefModel>(
            r"
            SELECT id, room_id, sender_id
            FROM messages
            WHERE id = $1 AND room_id = $2
            ",
        )
        .bind(message_id.into_inner())
        .bind(room_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| message_not_found(message_id))?;

        let read_at = sqlx::query_scalar::<_, DateTime<Utc>>(
            r"
            INSERT INTO message_reads (message_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (message_id, user_id) DO NOTHING
            RETURNING read_at
            ",
        )
        .bind(target.id)
        .bind(reader_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Ok(read_at.map(|read_at| ReadReceipt {
            message_id,
            room_id: Snowflake::new(target.room_id),
            sender_id: Snowflake::new(target.sender_id),
            reader_id,
            read_at,
        }))
    }
}
