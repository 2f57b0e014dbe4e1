//! PostgreSQL implementation of MembershipStore and ConversationStore

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use relay_core::entities::{ConversationUpdate, NewConversation, Room, RoomKind};
use relay_core::traits::{ConversationStore, MembershipStore, RepoResult};
use relay_core::value_objects::{Snowflake, SnowflakeGenerator};

use crate::mappers::{member_ids, RoomInsert};
use crate::models::RoomModel;

use super::error::{map_db_error, room_not_found};

/// PostgreSQL implementation of the room stores
#[derive(Clone)]
pub struct PgRoomRepository {
    pool: PgPool,
    ids: Arc<SnowflakeGenerator>,
}

impl PgRoomRepository {
    /// Create a new PgRoomRepository
    pub fn new(pool: PgPool, ids: Arc<SnowflakeGenerator>) -> Self {
        Self { pool, ids }
    }

    async fn load_members(
        tx: &mut Transaction<'_, Postgres>,
        room_id: i64,
    ) -> RepoResult<Vec<i64>> {
        sqlx::query_scalar::<_, i64>(
            r"
            SELECT user_id FROM room_members WHERE room_id = $1
            ",
        )
        .bind(room_id)
        .fetch_all(&mut **tx)
        .await
        .map_err(map_db_error)
    }

    /// Existing direct room between exactly these two users
    async fn find_direct(
        tx: &mut Transaction<'_, Postgres>,
        user1: i64,
        user2: i64,
    ) -> RepoResult<Option<RoomModel>> {
        sqlx::query_as::<_, RoomModel>(
            r"
            SELECT r.id, r.kind, r.name, r.created_by, r.created_at, r.updated_at
            FROM rooms r
            JOIN room_members m1 ON m1.room_id = r.id AND m1.user_id = $1
            JOIN room_members m2 ON m2.room_id = r.id AND m2.user_id = $2
            WHERE r.kind = 'direct'
              AND (SELECT COUNT(*) FROM room_members WHERE room_id = r.id) = 2
            LIMIT 1
            ",
        )
        .bind(user1)
        .bind(user2)
        .fetch_optional(&mut **tx)
        .await
        .map_err(map_db_error)
    }
}

#[async_trait]
impl MembershipStore for PgRoomRepository {
    #[instrument(skip(self))]
    async fn get_room(&self, room_id: Snowflake) -> RepoResult<Room> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let model = sqlx::query_as::<_, RoomModel>(
            r"
            SELECT id, kind, name, created_by, created_at, updated_at
            FROM rooms
            WHERE id = $1
            ",
        )
        .bind(room_id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| room_not_found(room_id))?;

        let members = Self::load_members(&mut tx, model.id).await?;
        tx.commit().await.map_err(map_db_error)?;

        Ok(model.into_room(members))
    }
}

#[async_trait]
impl ConversationStore for PgRoomRepository {
    #[instrument(skip(self), fields(creator_id = %conversation.creator_id))]
    async fn create(&self, conversation: NewConversation) -> RepoResult<Room> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        if conversation.kind == RoomKind::Direct {
            let pair = member_ids(conversation.participants.iter().copied());
            if let [a, b] = pair[..] {
                if let Some(existing) = Self::find_direct(&mut tx, a, b).await? {
                    let members = Self::load_members(&mut tx, existing.id).await?;
                    tx.commit().await.map_err(map_db_error)?;
                    tracing::debug!(room_id = existing.id, "Reusing existing direct room");
                    return Ok(existing.into_room(members));
                }
            }
        }

        let room = Room::new(
            self.ids.generate(),
            conversation.kind,
            conversation.name,
            conversation.creator_id,
            conversation.participants,
        );
        let insert = RoomInsert::new(&room);

        sqlx::query(
            r"
            INSERT INTO rooms (id, kind, name, created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ",
        )
        .bind(insert.id)
        .bind(insert.kind)
        .bind(insert.name)
        .bind(insert.created_by)
        .bind(room.created_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        sqlx::query(
            r"
            INSERT INTO room_members (room_id, user_id)
            SELECT $1, UNNEST($2::BIGINT[])
            ",
        )
        .bind(insert.id)
        .bind(&insert.members)
        .execute(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;
        Ok(room)
    }

    #[instrument(skip(self), fields(room_id = %update.room_id))]
    async fn update(&self, update: ConversationUpdate) -> RepoResult<Room> {
        let room_id = update.room_id.into_inner();
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        // Lock the row so concurrent updates to one room serialize
        let model = sqlx::query_as::<_, RoomModel>(
            r"
            UPDATE rooms
            SET name = COALESCE($2, name), updated_at = NOW()
            WHERE id = $1
            RETURNING id, kind, name, created_by, created_at, updated_at
            ",
        )
        .bind(room_id)
        .bind(update.name.as_deref())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or_else(|| room_not_found(update.room_id))?;

        if !update.remove_user_ids.is_empty() {
            sqlx::query(
                r"
                DELETE FROM room_members
                WHERE room_id = $1 AND user_id = ANY($2)
                ",
            )
            .bind(room_id)
            .bind(member_ids(update.remove_user_ids.iter().copied()))
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        }

        if !update.add_user_ids.is_empty() {
            sqlx::query(
                r"
                INSERT INTO room_members (room_id, user_id)
                SELECT $1, UNNEST($2::BIGINT[])
                ON CONFLICT (room_id, user_id) DO NOTHING
                ",
            )
            .bind(room_id)
            .bind(member_ids(update.add_user_ids.iter().copied()))
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
        }

        let members = Self::load_members(&mut tx, room_id).await?;
        tx.commit().await.map_err(map_db_error)?;

        Ok(model.into_room(members))
    }
}
