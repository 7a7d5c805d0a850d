use uuid::Uuid;

use msgr_db::{Database, micros_to_datetime};
use msgr_types::api::{ChatListEntry, HistoryResponse, MessageResponse};
use msgr_types::models::{Chat, SELF_CHAT_TITLE};

use crate::error::ChatError;

/// The other participant's display name, or "Saved Messages" for a self chat.
pub fn chat_title(db: &Database, viewer: Uuid, chat: &Chat) -> Result<String, ChatError> {
    let Some(other) = chat.other_participant(viewer) else {
        return Ok(SELF_CHAT_TITLE.to_string());
    };
    let title = db
        .get_profile_by_user(other)?
        .map(|row| row.into_model().full_name())
        .unwrap_or_else(|| "unknown".to_string());
    Ok(title)
}

/// The viewer's chats, most recently active first, with derived unread counts.
pub fn chat_list(db: &Database, viewer: Uuid) -> Result<Vec<ChatListEntry>, ChatError> {
    let rows = db.list_chats_for_user(viewer)?;
    Ok(rows
        .into_iter()
        .map(|row| ChatListEntry {
            chat_id: row.chat_id,
            title: row.title(),
            unread_count: row.unread_count,
            last_activity: micros_to_datetime(row.last_activity),
        })
        .collect())
}

/// One page of older messages, newest first. Read-only: seen flags are untouched.
pub fn history(
    db: &Database,
    viewer: Uuid,
    chat: &Chat,
    page: u32,
    page_size: u32,
) -> Result<HistoryResponse, ChatError> {
    if page == 0 {
        return Err(ChatError::Validation("Page numbers start at 1.".into()));
    }
    let page_size = page_size.max(1);
    let offset = (page - 1).saturating_mul(page_size);

    // One extra row tells whether another page follows.
    let mut rows = db.message_page(chat.id, offset, page_size.saturating_add(1))?;
    let has_more = rows.len() > page_size as usize;
    rows.truncate(page_size as usize);

    let first_item_pk = if page == 1 {
        rows.first().map_or(0, |row| row.id)
    } else {
        db.message_page(chat.id, 0, 1)?.first().map_or(0, |row| row.id)
    };

    Ok(HistoryResponse {
        messages: rows
            .into_iter()
            .map(|row| MessageResponse::from_message(row.into_model(), viewer))
            .collect(),
        page,
        has_more,
        first_item_pk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync;
    use crate::test_support::{chat_between, open_temp, user};

    #[test]
    fn history_pages_newest_first() {
        let db = open_temp();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        let chat = chat_between(&db, a, b);
        let ids: Vec<i64> = (0..5)
            .map(|i| sync::send(&db, a, &chat, &format!("m{}", i)).unwrap().id)
            .collect();

        let first = history(&db, b, &chat, 1, 2).unwrap();
        assert_eq!(first.messages.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[4], ids[3]]);
        assert!(first.has_more);
        assert_eq!(first.first_item_pk, ids[4]);

        let last = history(&db, b, &chat, 3, 2).unwrap();
        assert_eq!(last.messages.len(), 1);
        assert!(!last.has_more);
        assert_eq!(last.first_item_pk, ids[4]);

        // Reading history does not mark anything seen.
        assert!(!db.get_message(ids[0]).unwrap().unwrap().is_seen);
        assert!(history(&db, b, &chat, 0, 2).is_err());
    }

    #[test]
    fn largest_page_size_returns_everything() {
        let db = open_temp();
        let a = user(&db, "a@example.com");
        let notes = chat_between(&db, a, a);
        for i in 0..3 {
            sync::send(&db, a, &notes, &format!("note {}", i)).unwrap();
        }

        let page = history(&db, a, &notes, 1, u32::MAX).unwrap();
        assert_eq!(page.messages.len(), 3);
        assert!(!page.has_more);
        assert!(history(&db, a, &notes, 2, u32::MAX).unwrap().messages.is_empty());
    }

    #[test]
    fn chat_list_reports_unread_counts() {
        let db = open_temp();
        let a = user(&db, "a@example.com");
        let b = user(&db, "b@example.com");
        db.update_profile(a, "Ada", "", None, "").unwrap();
        let chat = chat_between(&db, a, b);
        sync::send(&db, a, &chat, "hi").unwrap();
        sync::send(&db, a, &chat, "there").unwrap();

        let list = chat_list(&db, b).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Ada");
        assert_eq!(list[0].unread_count, 2);

        sync::leave(&db, b, &chat).unwrap();
        assert_eq!(chat_list(&db, b).unwrap()[0].unread_count, 0);
    }

    #[test]
    fn self_chat_title() {
        let db = open_temp();
        let a = user(&db, "a@example.com");
        let notes = chat_between(&db, a, a);
        assert_eq!(chat_title(&db, a, &notes).unwrap(), "Saved Messages");
    }
}
