//! Message database models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the messages table
#[derive(Debug, Clone, FromRow)]
pub struct MessageModel {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
    pub content: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Minimal projection used when recording read receipts
#[derive(Debug, Clone, Copy, FromRow)]
pub struct MessageRefModel {
    pub id: i64,
    pub room_id: i64,
    pub sender_id: i64,
}
