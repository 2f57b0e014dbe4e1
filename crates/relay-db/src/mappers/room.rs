//! Room entity <-> model mapper

use relay_core::entities::{Room, RoomKind};
use relay_core::value_objects::Snowflake;

use crate::models::RoomModel;

impl RoomModel {
    /// Combine the room row with its member ids
    pub fn into_room(self, members: Vec<i64>) -> Room {
        Room {
            id: Snowflake::new(self.id),
            kind: RoomKind::from_str(&self.kind).unwrap_or_default(),
            name: self.name,
            created_by: Snowflake::new(self.created_by),
            members: members.into_iter().map(Snowflake::new).collect(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Room values prepared for insertion
pub struct RoomInsert<'a> {
    pub id: i64,
    pub kind: &'static str,
    pub name: Option<&'a str>,
    pub created_by: i64,
    pub members: Vec<i64>,
}

impl<'a> RoomInsert<'a> {
    pub fn new(room: &'a Room) -> Self {
        Self {
            id: room.id.into_inner(),
            kind: room.kind.as_str(),
            name: room.name.as_deref(),
            created_by: room.created_by.into_inner(),
            members: member_ids(room.members.iter().copied()),
        }
    }
}

/// Collect user ids into the `BIGINT[]` form bound to queries, sorted for stable locking order
pub fn member_ids(ids: impl IntoIterator<Item = Snowflake>) -> Vec<i64> {
    let mut ids: Vec<i64> = ids.into_iter().map(Snowflake::into_inner).collect();
    ids.sort_unstable();
    ids
}
