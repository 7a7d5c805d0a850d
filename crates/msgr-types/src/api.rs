use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Message;

// -- JWT Claims --

/// Claims carried by the bearer token. `sub` is the trusted current user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub token: String,
}

// -- Chats --

/// Cursors supplied by a polling client. Absent cursors mean "chat entry".
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PollQuery {
    pub latest_pk: Option<i64>,
    pub latest_seen_pk: Option<i64>,
}

impl PollQuery {
    pub fn is_poll(&self) -> bool {
        self.latest_pk.is_some() || self.latest_seen_pk.is_some()
    }
}

/// Body of `POST /chats/{id}`. No `content` field means the user left the view.
#[derive(Debug, Default, Deserialize)]
pub struct ChatPostForm {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMessageForm {
    pub message: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageResponse {
    pub id: i64,
    pub sender_id: Uuid,
    pub content: String,
    pub send_time: DateTime<Utc>,
    pub is_seen: bool,
    pub is_own: bool,
}

impl MessageResponse {
    pub fn from_message(message: Message, viewer: Uuid) -> Self {
        Self {
            id: message.id,
            is_own: message.sender_id == viewer,
            sender_id: message.sender_id,
            content: message.content,
            send_time: message.send_time,
            is_seen: message.is_seen,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PollResponse {
    pub new_messages: Vec<MessageResponse>,
    pub latest_pk: i64,
    pub seen_message_ids: Vec<i64>,
    pub latest_seen_pk: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatPageResponse {
    pub chat_id: i64,
    pub title: String,
    pub messages: Vec<MessageResponse>,
    pub latest_pk: i64,
    pub latest_seen_pk: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatListEntry {
    pub chat_id: i64,
    pub title: String,
    pub unread_count: i64,
    pub last_activity: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

fn default_page() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Newest first.
    pub messages: Vec<MessageResponse>,
    pub page: u32,
    pub has_more: bool,
    pub first_item_pk: i64,
}

// -- Users --

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub profile_id: i64,
    pub user_id: Uuid,
    pub display_name: String,
    pub identifier: Option<String>,
    pub biography: String,
}
