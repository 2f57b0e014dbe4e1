//! Room entity - a direct conversation or a group chat

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::value_objects::Snowflake;

/// Room kind
///
/// Direct rooms always have exactly two members; group rooms have a name and
/// at least two members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RoomKind {
    #[default]
    Direct,
    Group,
}

impl RoomKind {
    /// Get the string representation used in storage
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Group => "group",
        }
    }

    /// Parse from the storage representation
    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "direct" => Some(Self::Direct),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    #[inline]
    #[must_use]
    pub fn is_group(self) -> bool {
        matches!(self, Self::Group)
    }
}

/// Room entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Room {
    pub id: Snowflake,
    pub kind: RoomKind,
    pub name: Option<String>,
    pub created_by: Snowflake,
    pub members: HashSet<Snowflake>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Room {
    /// Create a new room
    pub fn new(
        id: Snowflake,
        kind: RoomKind,
        name: Option<String>,
        created_by: Snowflake,
        members: impl IntoIterator<Item = Snowflake>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            kind,
            name,
            created_by,
            members: members.into_iter().collect(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Check if a user is a member of this room
    #[inline]
    pub fn has_member(&self, user_id: Snowflake) -> bool {
        self.members.contains(&user_id)
    }

    /// Members other than the given user
    pub fn others(&self, user_id: Snowflake) -> impl Iterator<Item = Snowflake> + '_ {
        self.members.iter().copied().filter(move |id| *id != user_id)
    }

    #[inline]
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Request to persist a new conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewConversation {
    pub creator_id: Snowflake,
    pub kind: RoomKind,
    pub name: Option<String>,
    /// All participants, creator included
    pub participants: HashSet<Snowflake>,
}

/// Request to change a group conversation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationUpdate {
    pub room_id: Snowflake,
    pub name: Option<String>,
    pub add_user_ids: HashSet<Snowflake>,
    pub remove_user_ids: HashSet<Snowflake>,
}

impl ConversationUpdate {
    /// Check if the update changes nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.add_user_ids.is_empty() && self.remove_user_ids.is_empty()
    }
}
