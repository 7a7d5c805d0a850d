use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Title shown for a chat whose only participant is the viewer.
pub const SELF_CHAT_TITLE: &str = "Saved Messages";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: i64,
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub identifier: Option<String>,
    pub biography: String,
}

impl Profile {
    /// First and last name joined by a space, trimmed.
    pub fn full_name(&self) -> String {
        full_name(&self.first_name, &self.last_name)
    }
}

pub fn full_name(first_name: &str, last_name: &str) -> String {
    format!("{} {}", first_name, last_name).trim().to_string()
}

/// A direct chat. One participant means a self chat (notes to self).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    /// Sorted, one or two entries.
    pub participants: Vec<Uuid>,
    pub last_activity: DateTime<Utc>,
}

impl Chat {
    pub fn is_self_chat(&self) -> bool {
        self.participants.len() == 1
    }

    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.participants.contains(&user_id)
    }

    /// The participant that is not `viewer`, if any.
    pub fn other_participant(&self, viewer: Uuid) -> Option<Uuid> {
        self.participants.iter().copied().find(|p| *p != viewer)
    }
}

/// Canonical key of a participant set: `"<id>"` for a self chat, the two
/// ids in ascending order joined by `:` otherwise.
pub fn pair_key(a: Uuid, b: Uuid) -> String {
    if a == b {
        return a.to_string();
    }
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    format!("{}:{}", lo, hi)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub send_time: DateTime<Utc>,
    pub is_seen: bool,
}
