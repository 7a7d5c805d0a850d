//! Database row types — these map directly to SQLite rows.
//! Distinct from msgr-types models to keep the DB layer independent;
//! `into_model` does the parsing and logs anything corrupt.

use msgr_types::models::{Chat, Message, Profile, SELF_CHAT_TITLE, full_name};
use tracing::warn;
use uuid::Uuid;

use crate::micros_to_datetime;

fn parse_uuid(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password: String,
}

pub struct ProfileRow {
    pub id: i64,
    pub user_id: String,
    pub first_name: String,
    pub last_name: String,
    pub identifier: Option<String>,
    pub biography: String,
}

impl ProfileRow {
    pub fn into_model(self) -> Profile {
        Profile {
            id: self.id,
            user_id: parse_uuid(&self.user_id, "profile user_id"),
            first_name: self.first_name,
            last_name: self.last_name,
            identifier: self.identifier,
            biography: self.biography,
        }
    }
}

pub struct ChatRow {
    pub id: i64,
    pub pair_key: String,
    pub last_activity: i64,
    pub participants: Vec<String>,
}

impl ChatRow {
    pub fn into_model(self) -> Chat {
        let mut participants: Vec<Uuid> = self
            .participants
            .iter()
            .map(|p| parse_uuid(p, "chat participant"))
            .collect();
        participants.sort();
        Chat {
            id: self.id,
            participants,
            last_activity: micros_to_datetime(self.last_activity),
        }
    }
}

pub struct MessageRow {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: String,
    pub content: String,
    pub send_time: i64,
    pub is_seen: bool,
}

impl MessageRow {
    pub fn into_model(self) -> Message {
        Message {
            id: self.id,
            chat_id: self.chat_id,
            sender_id: parse_uuid(&self.sender_id, "message sender_id"),
            content: self.content,
            send_time: micros_to_datetime(self.send_time),
            is_seen: self.is_seen,
        }
    }
}

/// One line of a user's chat list, joined with the other participant's
/// profile names (both `None` for a self chat).
pub struct ChatListRow {
    pub chat_id: i64,
    pub last_activity: i64,
    pub unread_count: i64,
    pub other_user_id: Option<String>,
    pub other_first_name: Option<String>,
    pub other_last_name: Option<String>,
}

impl ChatListRow {
    pub fn title(&self) -> String {
        match &self.other_user_id {
            None => SELF_CHAT_TITLE.to_string(),
            Some(_) => match &self.other_first_name {
                Some(first) => full_name(first, self.other_last_name.as_deref().unwrap_or("")),
                None => "unknown".to_string(),
            },
        }
    }
}
