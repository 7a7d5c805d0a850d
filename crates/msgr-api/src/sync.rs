//! Polling synchronization between the two sides of a chat.
//!
//! Each client keeps two cursors and sends them on every poll:
//!
//! - `latest_pk`: the newest message id it has rendered.
//! - `latest_seen_pk`: the newest of its own messages it already knows is seen.
//!
//! A poll returns everything past `latest_pk` (marking other people's messages
//! seen on the way) and the ids of the requester's messages that became seen
//! past `latest_seen_pk`, together with the advanced cursors. Re-polling with
//! the returned cursors and no new activity yields empty deltas, so a client
//! that times out simply retries with what it had.
//!
//! Every function here takes a chat that already passed the access guard.

use tracing::debug;
use uuid::Uuid;

use msgr_db::Database;
use msgr_types::api::{ChatPageResponse, MessageResponse, PollQuery, PollResponse};
use msgr_types::models::{Chat, Message};

use crate::error::ChatError;
use crate::inbox;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    pub latest_pk: i64,
    pub latest_seen_pk: i64,
}

impl From<PollQuery> for Cursors {
    fn from(query: PollQuery) -> Self {
        Self {
            latest_pk: query.latest_pk.unwrap_or(0),
            latest_seen_pk: query.latest_seen_pk.unwrap_or(0),
        }
    }
}

/// New messages past `cursor`, marked seen for `viewer`, plus the advanced cursor.
fn new_message_delta(
    db: &Database,
    viewer: Uuid,
    chat: &Chat,
    cursor: i64,
) -> Result<(Vec<MessageResponse>, i64), ChatError> {
    let rows = db.take_new_messages(chat.id, cursor, viewer)?;
    let latest = rows.last().map_or(cursor, |row| row.id.max(cursor));
    let messages = rows
        .into_iter()
        .map(|row| MessageResponse::from_message(row.into_model(), viewer))
        .collect();
    Ok((messages, latest))
}

/// One poll round.
pub fn poll(db: &Database, viewer: Uuid, chat: &Chat, cursors: Cursors) -> Result<PollResponse, ChatError> {
    let (new_messages, latest_pk) = new_message_delta(db, viewer, chat, cursors.latest_pk)?;

    let seen_message_ids = db.seen_messages_since(chat.id, viewer, cursors.latest_seen_pk)?;
    let latest_seen_pk = seen_message_ids
        .last()
        .map_or(cursors.latest_seen_pk, |id| (*id).max(cursors.latest_seen_pk));

    if !new_messages.is_empty() || !seen_message_ids.is_empty() {
        debug!(
            "Poll chat {} by {}: {} new, {} seen",
            chat.id,
            viewer,
            new_messages.len(),
            seen_message_ids.len()
        );
    }

    Ok(PollResponse {
        new_messages,
        latest_pk,
        seen_message_ids,
        latest_seen_pk,
    })
}

/// Chat entry: fetch everything from the start, which marks it all seen.
pub fn enter(db: &Database, viewer: Uuid, chat: &Chat) -> Result<ChatPageResponse, ChatError> {
    let (messages, latest_pk) = new_message_delta(db, viewer, chat, 0)?;
    let latest_seen_pk = messages
        .iter()
        .filter(|m| m.is_own && m.is_seen)
        .map(|m| m.id)
        .max()
        .unwrap_or(0);

    Ok(ChatPageResponse {
        chat_id: chat.id,
        title: inbox::chat_title(db, viewer, chat)?,
        messages,
        latest_pk,
        latest_seen_pk,
    })
}

/// Reject empty and oversized content before anything is written.
pub fn validate_content(content: &str, max_len: usize) -> Result<(), ChatError> {
    if content.trim().is_empty() {
        return Err(ChatError::Validation("Message content is empty.".into()));
    }
    if content.chars().count() > max_len {
        return Err(ChatError::Validation(format!(
            "Message content is longer than {} characters.",
            max_len
        )));
    }
    Ok(())
}

/// Append a validated message. Sending does not mark anything seen.
pub fn send(db: &Database, viewer: Uuid, chat: &Chat, content: &str) -> Result<Message, ChatError> {
    let message = db.append_message(chat.id, viewer, content)?.into_model();
    debug!("Chat {}: message {} from {}", chat.id, message.id, viewer);
    Ok(message)
}

/// The viewer left the chat view; unread counts restart from now.
pub fn leave(db: &Database, viewer: Uuid, chat: &Chat) -> Result<(), ChatError> {
    if !db.touch_membership(chat.id, viewer)? {
        // Guarded callers always have a membership; losing it mid-request
        // means the user was removed.
        return Err(ChatError::Forbidden);
    }
    Ok(())
}

/// Delete a message on behalf of `viewer`. Messages that do not exist or
/// belong to someone else are left alone without telling the caller.
pub fn delete_message(db: &Database, viewer: Uuid, message_id: i64) -> Result<(), ChatError> {
    if db.delete_message(message_id, viewer)? {
        debug!("Message {} deleted by its sender {}", message_id, viewer);
    }
    Ok(())
}
