use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);",
    )?;

    let version: i64 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id          TEXT PRIMARY KEY,
                email       TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password    TEXT NOT NULL,
                created_at  INTEGER NOT NULL
            );

            CREATE TABLE profiles (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
                first_name  TEXT NOT NULL DEFAULT 'new user',
                last_name   TEXT NOT NULL DEFAULT '',
                identifier  TEXT UNIQUE COLLATE NOCASE,
                biography   TEXT NOT NULL DEFAULT ''
            );

            -- pair_key is the canonical participant set, one chat per set
            CREATE TABLE chats (
                id              INTEGER PRIMARY KEY AUTOINCREMENT,
                pair_key        TEXT NOT NULL UNIQUE,
                last_activity   INTEGER NOT NULL
            );

            CREATE TABLE memberships (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                date_joined TEXT NOT NULL,
                last_active INTEGER NOT NULL,
                UNIQUE(user_id, chat_id)
            );

            CREATE INDEX idx_memberships_chat ON memberships(chat_id);

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                chat_id     INTEGER NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
                sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                content     TEXT NOT NULL,
                send_time   INTEGER NOT NULL,
                is_seen     INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX idx_messages_chat ON messages(chat_id, id);
            CREATE INDEX idx_messages_chat_time ON messages(chat_id, send_time);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
