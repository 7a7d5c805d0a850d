use anyhow::Result;
use rusqlite::{OptionalExtension, Row, ffi};
use tracing::debug;
use uuid::Uuid;

use crate::Database;
use crate::models::{ProfileRow, UserRow};

const PROFILE_COLUMNS: &str = "id, user_id, first_name, last_name, identifier, biography";

impl Database {
    // -- Users --

    /// Create a user together with its default profile. Returns the profile
    /// id, or `None` when the email is already registered (checked by the
    /// UNIQUE constraint, so concurrent registrations cannot both succeed).
    pub fn create_user(&self, id: Uuid, email: &str, password_hash: &str) -> Result<Option<i64>> {
        let now = self.now_micros();
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT INTO users (id, email, password, created_at) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![id.to_string(), email, password_hash, now],
            );
            match inserted {
                Ok(_) => {}
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE =>
                {
                    debug!("Registration for {} hit an existing account", email);
                    return Ok(None);
                }
                Err(e) => return Err(e.into()),
            }
            tx.execute("INSERT INTO profiles (user_id) VALUES (?1)", [id.to_string()])?;
            let profile_id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(Some(profile_id))
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, email, password FROM users WHERE email = ?1",
                    [email],
                    |row| {
                        Ok(UserRow {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            password: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    // -- Profiles --

    pub fn get_profile(&self, profile_id: i64) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM profiles WHERE id = ?1", PROFILE_COLUMNS);
            let row = conn.query_row(&sql, [profile_id], profile_from_row).optional()?;
            Ok(row)
        })
    }

    pub fn get_profile_by_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM profiles WHERE user_id = ?1", PROFILE_COLUMNS);
            let row = conn
                .query_row(&sql, [user_id.to_string()], profile_from_row)
                .optional()?;
            Ok(row)
        })
    }

    /// Overwrite a user's profile fields. Profile editing screens live outside
    /// this service; this is the write path they (and tests) go through.
    pub fn update_profile(
        &self,
        user_id: Uuid,
        first_name: &str,
        last_name: &str,
        identifier: Option<&str>,
        biography: &str,
    ) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE profiles SET first_name = ?2, last_name = ?3, identifier = ?4, biography = ?5
                 WHERE user_id = ?1",
                rusqlite::params![user_id.to_string(), first_name, last_name, identifier, biography],
            )?;
            Ok(changed == 1)
        })
    }

    /// Case-insensitive substring search over identifier and names.
    pub fn search_profiles(&self, query: &str, limit: u32) -> Result<Vec<ProfileRow>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(vec![]);
        }
        let pattern = format!("%{}%", escape_like(query));

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM profiles
                 WHERE identifier LIKE ?1 ESCAPE '\\'
                    OR first_name LIKE ?1 ESCAPE '\\'
                    OR last_name LIKE ?1 ESCAPE '\\'
                 ORDER BY id
                 LIMIT ?2",
                PROFILE_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![pattern, limit], profile_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}

fn profile_from_row(row: &Row<'_>) -> rusqlite::Result<ProfileRow> {
    Ok(ProfileRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        identifier: row.get(4)?,
        biography: row.get(5)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
