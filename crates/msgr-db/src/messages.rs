use anyhow::Result;
use rusqlite::{Connection, OptionalExtension, Row};
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::models::MessageRow;

const MESSAGE_COLUMNS: &str = "id, chat_id, sender_id, content, send_time, is_seen";

impl Database {
    /// Append a message and bump the chat's activity time, atomically.
    pub fn append_message(&self, chat_id: i64, sender_id: Uuid, content: &str) -> Result<MessageRow> {
        self.with_conn_mut(|conn| {
            let now = self.now_micros();
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO messages (chat_id, sender_id, content, send_time, is_seen)
                 VALUES (?1, ?2, ?3, ?4, 0)",
                rusqlite::params![chat_id, sender_id.to_string(), content, now],
            )?;
            let id = tx.last_insert_rowid();
            tx.execute(
                "UPDATE chats SET last_activity = ?2 WHERE id = ?1",
                rusqlite::params![chat_id, now],
            )?;
            tx.commit()?;

            Ok(MessageRow {
                id,
                chat_id,
                sender_id: sender_id.to_string(),
                content: content.to_string(),
                send_time: now,
                is_seen: false,
            })
        })
    }

    pub fn get_message(&self, message_id: i64) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM messages WHERE id = ?1", MESSAGE_COLUMNS);
            let row = conn.query_row(&sql, [message_id], message_from_row).optional()?;
            Ok(row)
        })
    }

    /// Delete a message if and only if `requester` sent it.
    /// Returns whether a row was removed.
    pub fn delete_message(&self, message_id: i64, requester: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "DELETE FROM messages WHERE id = ?1 AND sender_id = ?2",
                rusqlite::params![message_id, requester.to_string()],
            )?;
            Ok(changed == 1)
        })
    }

    /// Flip `is_seen` on every message of the chat newer than `cursor` that
    /// `excluding` did not send. Returns how many flags changed.
    pub fn mark_seen_since(&self, chat_id: i64, cursor: i64, excluding: Uuid) -> Result<usize> {
        self.with_conn_mut(|conn| mark_seen_since(conn, chat_id, cursor, excluding))
    }

    /// Messages newer than `cursor`, ascending, after marking the ones
    /// `reader` did not send as seen. Select and update share a transaction
    /// on the writer, so nothing appended in between is marked unreturned.
    pub fn take_new_messages(&self, chat_id: i64, cursor: i64, reader: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let flipped = mark_seen_since(&tx, chat_id, cursor, reader)?;
            let rows = query_messages_after(&tx, chat_id, cursor)?;
            tx.commit()?;

            if flipped > 0 {
                debug!("Chat {}: {} message(s) seen by {}", chat_id, flipped, reader);
            }
            Ok(rows)
        })
    }

    /// Ids of `sender`'s messages newer than `cursor` that have been seen,
    /// ascending.
    pub fn seen_messages_since(&self, chat_id: i64, sender: Uuid, cursor: i64) -> Result<Vec<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM messages
                 WHERE chat_id = ?1 AND sender_id = ?2 AND id > ?3 AND is_seen = 1
                 ORDER BY id ASC",
            )?;
            let ids = stmt
                .query_map(rusqlite::params![chat_id, sender.to_string(), cursor], |row| row.get(0))?
                .collect::<std::result::Result<Vec<i64>, _>>()?;
            Ok(ids)
        })
    }

    /// A page of history, newest first.
    pub fn message_page(&self, chat_id: i64, offset: u32, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM messages WHERE chat_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
                MESSAGE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![chat_id, limit, offset], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn mark_seen_since(conn: &Connection, chat_id: i64, cursor: i64, excluding: Uuid) -> Result<usize> {
    // is_seen only ever goes 0 -> 1; there is no statement that clears it.
    let changed = conn.execute(
        "UPDATE messages SET is_seen = 1
         WHERE chat_id = ?1 AND id > ?2 AND sender_id != ?3 AND is_seen = 0",
        rusqlite::params![chat_id, cursor, excluding.to_string()],
    )?;
    Ok(changed)
}

fn query_messages_after(conn: &Connection, chat_id: i64, cursor: i64) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "SELECT {} FROM messages WHERE chat_id = ?1 AND id > ?2 ORDER BY id ASC",
        MESSAGE_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(rusqlite::params![chat_id, cursor], message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        sender_id: row.get(2)?,
        content: row.get(3)?,
        send_time: row.get(4)?,
        is_seen: row.get(5)?,
    })
}
