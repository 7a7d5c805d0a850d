use tracing::debug;
use uuid::Uuid;

use msgr_db::Database;
use msgr_types::models::Chat;

use crate::error::ChatError;

/// True iff `user` is one of the chat's participants.
pub fn authorize(user: Uuid, chat: &Chat) -> bool {
    chat.has_participant(user)
}

/// Load a chat and check that `user` may read or write it.
/// Unknown ids are `NotFound`; existing chats the user is not in are `Forbidden`.
pub fn authorized_chat(db: &Database, user: Uuid, chat_id: i64) -> Result<Chat, ChatError> {
    let chat = db
        .get_chat(chat_id)?
        .ok_or(ChatError::NotFound("chat"))?
        .into_model();

    if !authorize(user, &chat) {
        debug!("User {} denied access to chat {}", user, chat_id);
        return Err(ChatError::Forbidden);
    }

    Ok(chat)
}
