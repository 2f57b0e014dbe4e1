//! Room database model

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for the rooms table
#[derive(Debug, Clone, FromRow)]
pub struct RoomModel {
    pub id: i64,
    pub kind: String,
    pub name: Option<String>,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl RoomModel {
    #[inline]
    pub fn is_group(&self) -> bool {
        self.kind == "group"
    }
}
