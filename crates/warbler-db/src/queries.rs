use crate::models::{DeleteOutcome, MessageRow, ProfileUpdate, UserRow, format_timestamp};
use crate::{Database, OptionalExt};
use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

pub(crate) const USER_COLUMNS: &str =
    "u.id, u.username, u.email, u.password, u.image_url, u.header_image_url, u.bio, u.location, u.created_at";

// JOIN users and count likes in one query (no N+1 per message)
pub(crate) const MESSAGE_SELECT: &str =
    "SELECT m.id, m.text, m.user_id, u.username, u.image_url, m.created_at,
            (SELECT COUNT(*) FROM likes l WHERE l.message_id = m.id)
     FROM messages m
     JOIN users u ON u.id = m.user_id";

impl Database {
    // -- Users --

    pub fn create_user(
        &self,
        id: Uuid,
        username: &str,
        email: &str,
        password_hash: &str,
        image_url: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, password, image_url) VALUES (?1, ?2, ?3, ?4, ?5)",
                (id.to_string(), username, email, password_hash, image_url),
            )?;
            Ok(())
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!("SELECT {} FROM users u WHERE u.username = ?1", USER_COLUMNS);
            conn.query_row(&sql, [username], user_from_row).optional()
        })
    }

    pub fn get_user_by_id(&self, id: Uuid) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_id(conn, id))
    }

    /// All users, or those whose username contains `needle` (case-insensitive).
    pub fn search_users(&self, needle: Option<&str>) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let pattern = match needle.map(str::trim) {
                Some(q) if !q.is_empty() => format!("%{}%", escape_like(q)),
                _ => "%".to_string(),
            };
            let sql = format!(
                "SELECT {} FROM users u WHERE u.username LIKE ?1 ESCAPE '\\' ORDER BY u.username",
                USER_COLUMNS
            );
            query_users(conn, &sql, [pattern])
        })
    }

    /// Returns false when no such user exists.
    pub fn update_profile(&self, id: Uuid, update: &ProfileUpdate<'_>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users
                 SET username = ?2, email = ?3, image_url = ?4, header_image_url = ?5, bio = ?6, location = ?7
                 WHERE id = ?1",
                rusqlite::params![
                    id.to_string(),
                    update.username,
                    update.email,
                    update.image_url,
                    update.header_image_url,
                    update.bio,
                    update.location,
                ],
            )?;
            Ok(changed == 1)
        })
    }

    /// Deletes the user; their messages, follows, likes and sessions go with it.
    pub fn delete_user(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?;
            Ok(removed == 1)
        })
    }

    // -- Messages --

    pub fn insert_message(&self, id: Uuid, user_id: Uuid, text: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, user_id, text) VALUES (?1, ?2, ?3)",
                (id.to_string(), user_id.to_string(), text),
            )?;
            Ok(())
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!("{} WHERE m.id = ?1", MESSAGE_SELECT);
            conn.query_row(&sql, [id.to_string()], message_from_row).optional()
        })
    }

    /// Deletes a message only if `owner_id` wrote it. Likes on it cascade.
    pub fn delete_message(&self, id: Uuid, owner_id: Uuid) -> Result<DeleteOutcome> {
        self.with_tx(|conn| {
            let author: Option<String> = conn
                .query_row(
                    "SELECT user_id FROM messages WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )
                .optional()?;

            match author {
                None => Ok(DeleteOutcome::NotFound),
                Some(author) if author != owner_id.to_string() => Ok(DeleteOutcome::NotOwner),
                Some(_) => {
                    conn.execute("DELETE FROM messages WHERE id = ?1", [id.to_string()])?;
                    Ok(DeleteOutcome::Deleted)
                }
            }
        })
    }

    /// Newest first.
    pub fn messages_by(&self, user_id: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.user_id = ?1 ORDER BY m.created_at DESC, m.rowid DESC LIMIT ?2",
                MESSAGE_SELECT
            );
            query_messages(conn, &sql, rusqlite::params![user_id.to_string(), limit])
        })
    }

    /// Messages written by `user_id` or by anyone they follow, newest first.
    pub fn timeline(&self, user_id: Uuid, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} WHERE m.user_id = ?1
                    OR m.user_id IN (SELECT user_being_followed_id FROM follows WHERE user_following_id = ?1)
                 ORDER BY m.created_at DESC, m.rowid DESC
                 LIMIT ?2",
                MESSAGE_SELECT
            );
            query_messages(conn, &sql, rusqlite::params![user_id.to_string(), limit])
        })
    }

    // -- Sessions --

    pub fn create_session(&self, id: Uuid, user_id: Uuid, expires_at: DateTime<Utc>) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, expires_at) VALUES (?1, ?2, ?3)",
                (id.to_string(), user_id.to_string(), format_timestamp(expires_at)),
            )?;
            Ok(())
        })
    }

    /// The user a session is signed in as. `None` for unknown, expired or
    /// anonymous sessions.
    pub fn session_user(&self, session_id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM sessions s JOIN users u ON u.id = s.user_id
                 WHERE s.id = ?1 AND s.expires_at > strftime('%Y-%m-%d %H:%M:%f', 'now')",
                USER_COLUMNS
            );
            conn.query_row(&sql, [session_id], user_from_row).optional()
        })
    }

    /// Deletes every session past its expiry. Returns how many went.
    pub fn prune_expired_sessions(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let pruned = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= strftime('%Y-%m-%d %H:%M:%f', 'now')",
                [],
            )?;
            Ok(pruned)
        })
    }

    pub fn delete_session(&self, session_id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [session_id])?;
            Ok(())
        })
    }
}

fn query_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {} FROM users u WHERE u.id = ?1", USER_COLUMNS);
    conn.query_row(&sql, [id.to_string()], user_from_row).optional()
}

pub(crate) fn query_users<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, user_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub(crate) fn query_messages<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<MessageRow>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, message_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        image_url: row.get(4)?,
        header_image_url: row.get(5)?,
        bio: row.get(6)?,
        location: row.get(7)?,
        created_at: row.get(8)?,
    })
}

fn message_from_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        text: row.get(1)?,
        user_id: row.get(2)?,
        username: row.get(3)?,
        image_url: row.get(4)?,
        created_at: row.get(5)?,
        like_count: row.get(6)?,
    })
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}
