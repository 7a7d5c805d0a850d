use anyhow::Result;
use rusqlite::OptionalExtension;
use uuid::Uuid;

use crate::Database;
use crate::models::ChatListRow;

/// Messages in membership `m`'s chat sent after its owner last left the chat
/// view. Every unread count is derived through this expression.
const UNREAD_SINCE_LAST_EXIT: &str = "(SELECT COUNT(*) FROM messages msg
      WHERE msg.chat_id = m.chat_id AND msg.send_time > m.last_active)";

impl Database {
    /// Record that the user left (or closed) the chat view just now.
    /// Returns false when the user has no membership in the chat.
    pub fn touch_membership(&self, chat_id: i64, user_id: Uuid) -> Result<bool> {
        let now = self.now_micros();
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE memberships SET last_active = ?3 WHERE chat_id = ?1 AND user_id = ?2",
                rusqlite::params![chat_id, user_id.to_string(), now],
            )?;
            Ok(changed == 1)
        })
    }

    /// Messages sent after the user's last recorded exit. Derived on every
    /// call; nothing is cached. Zero when the user is not a member.
    pub fn unread_count(&self, chat_id: i64, user_id: Uuid) -> Result<i64> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM memberships m WHERE m.chat_id = ?1 AND m.user_id = ?2",
                UNREAD_SINCE_LAST_EXIT
            );
            let count = conn
                .query_row(&sql, rusqlite::params![chat_id, user_id.to_string()], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(count.unwrap_or(0))
        })
    }

    /// Every chat the user belongs to, most recently active first, with the
    /// unread count and the other participant's names in the same query.
    pub fn list_chats_for_user(&self, user_id: Uuid) -> Result<Vec<ChatListRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT c.id, c.last_activity, {},
                        o.user_id, p.first_name, p.last_name
                 FROM memberships m
                 JOIN chats c ON c.id = m.chat_id
                 LEFT JOIN memberships o ON o.chat_id = c.id AND o.user_id != m.user_id
                 LEFT JOIN profiles p ON p.user_id = o.user_id
                 WHERE m.user_id = ?1
                 ORDER BY c.last_activity DESC, c.id DESC",
                UNREAD_SINCE_LAST_EXIT
            );
            let mut stmt = conn.prepare(&sql)?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(ChatListRow {
                        chat_id: row.get(0)?,
                        last_activity: row.get(1)?,
                        unread_count: row.get(2)?,
                        other_user_id: row.get(3)?,
                        other_first_name: row.get(4)?,
                        other_last_name: row.get(5)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}
