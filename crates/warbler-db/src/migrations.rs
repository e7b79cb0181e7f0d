use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);"
    )?;

    let version: i64 = conn
        .query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, messages, follows, likes, sessions)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id                TEXT PRIMARY KEY,
                email             TEXT NOT NULL UNIQUE,
                username          TEXT NOT NULL UNIQUE,
                image_url         TEXT NOT NULL DEFAULT '/static/images/default-pic.png',
                header_image_url  TEXT NOT NULL DEFAULT '/static/images/warbler-hero.jpg',
                bio               TEXT,
                location          TEXT,
                password          TEXT NOT NULL,
                created_at        TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                text        TEXT NOT NULL CHECK (length(text) BETWEEN 1 AND 140),
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            CREATE INDEX idx_messages_user
                ON messages(user_id, created_at);

            CREATE TABLE follows (
                user_being_followed_id  TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                user_following_id       TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at              TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                PRIMARY KEY (user_following_id, user_being_followed_id)
            );

            CREATE INDEX idx_follows_followed
                ON follows(user_being_followed_id);

            CREATE TABLE likes (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                message_id  TEXT NOT NULL REFERENCES messages(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
                UNIQUE(user_id, message_id)
            );

            CREATE INDEX idx_likes_message
                ON likes(message_id);

            -- Server-side session store; a NULL user_id is an anonymous session
            CREATE TABLE sessions (
                id          TEXT PRIMARY KEY,
                user_id     TEXT REFERENCES users(id) ON DELETE CASCADE,
                created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now'))
            );

            INSERT INTO schema_version (version) VALUES (1);
            "
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (session expiry)");
        // Rows from before v2 get an expiry in the past and stop authenticating
        conn.execute_batch(
            "
            ALTER TABLE sessions ADD COLUMN expires_at TEXT NOT NULL DEFAULT '1970-01-01 00:00:00.000';

            CREATE INDEX idx_sessions_expires
                ON sessions(expires_at);

            INSERT INTO schema_version (version) VALUES (2);
            "
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}
