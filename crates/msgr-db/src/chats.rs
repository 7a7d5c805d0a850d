use anyhow::{Result, anyhow};
use rusqlite::{Connection, OptionalExtension, ffi};
use tracing::{debug, info};
use uuid::Uuid;

use msgr_types::models::pair_key;

use crate::Database;
use crate::models::ChatRow;

/// Creation attempts before giving up. A lost race is followed by a lookup
/// that finds the winner's chat, so a second attempt is already unusual.
const RESOLVE_ATTEMPTS: usize = 3;

impl Database {
    /// Find the chat whose participant set is exactly `{actor, target}`
    /// (`{actor}` when they are equal), creating it with one membership per
    /// participant if it does not exist yet.
    ///
    /// Uniqueness rests on `chats.pair_key`: if a concurrent writer (this or
    /// another process) inserts the same set first, the insert fails with a
    /// constraint violation and the winner's chat is looked up instead.
    pub fn resolve_chat(&self, actor: Uuid, target: Uuid) -> Result<ChatRow> {
        let key = pair_key(actor, target);

        for _ in 0..RESOLVE_ATTEMPTS {
            if let Some(chat_id) = self.with_conn(|conn| find_chat_id(conn, &key))? {
                return self.load_chat(chat_id);
            }

            let now = self.now_micros();
            let created = self.with_conn_mut(|conn| {
                match insert_chat(conn, &key, &[actor, target], now) {
                    Ok(id) => Ok(Some(id)),
                    Err(rusqlite::Error::SqliteFailure(e, _))
                        if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                    {
                        debug!("Chat creation for {} lost a race, retrying as lookup", key);
                        Ok(None)
                    }
                    Err(e) => Err(e.into()),
                }
            })?;

            if let Some(chat_id) = created {
                info!("Created chat {} for {}", chat_id, key);
                return self.load_chat(chat_id);
            }
        }

        Err(anyhow!("Could not resolve chat for {}", key))
    }

    pub fn get_chat(&self, chat_id: i64) -> Result<Option<ChatRow>> {
        self.with_conn(|conn| query_chat(conn, chat_id))
    }

    fn load_chat(&self, chat_id: i64) -> Result<ChatRow> {
        self.get_chat(chat_id)?
            .ok_or_else(|| anyhow!("Chat {} vanished after resolve", chat_id))
    }
}

fn find_chat_id(conn: &Connection, key: &str) -> Result<Option<i64>> {
    let id = conn
        .query_row("SELECT id FROM chats WHERE pair_key = ?1", [key], |row| row.get(0))
        .optional()?;
    Ok(id)
}

/// Insert the chat and its memberships in one transaction.
fn insert_chat(
    conn: &mut Connection,
    key: &str,
    participants: &[Uuid],
    now: i64,
) -> rusqlite::Result<i64> {
    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO chats (pair_key, last_activity) VALUES (?1, ?2)",
        rusqlite::params![key, now],
    )?;
    let chat_id = tx.last_insert_rowid();

    let mut members: Vec<Uuid> = participants.to_vec();
    members.sort();
    members.dedup();
    for user_id in members {
        tx.execute(
            "INSERT INTO memberships (chat_id, user_id, date_joined, last_active)
             VALUES (?1, ?2, date(?3 / 1000000, 'unixepoch'), ?3)",
            rusqlite::params![chat_id, user_id.to_string(), now],
        )?;
    }

    tx.commit()?;
    Ok(chat_id)
}

fn query_chat(conn: &Connection, chat_id: i64) -> Result<Option<ChatRow>> {
    let chat = conn
        .query_row(
            "SELECT id, pair_key, last_activity FROM chats WHERE id = ?1",
            [chat_id],
            |row| {
                Ok(ChatRow {
                    id: row.get(0)?,
                    pair_key: row.get(1)?,
                    last_activity: row.get(2)?,
                    participants: vec![],
                })
            },
        )
        .optional()?;

    let Some(mut chat) = chat else {
        return Ok(None);
    };

    let mut stmt = conn.prepare("SELECT user_id FROM memberships WHERE chat_id = ?1 ORDER BY user_id")?;
    chat.participants = stmt
        .query_map([chat_id], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;

    Ok(Some(chat))
}
