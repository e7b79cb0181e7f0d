//! Follow graph and likes.
//!
//! Follows are directed edges keyed on (follower, followed). Listings are
//! plain edge-set queries; nothing here walks the graph transitively.

use crate::models::{LikeRow, LikeState, MessageRow, UserRow};
use crate::queries::{MESSAGE_SELECT, USER_COLUMNS, query_messages, query_users};
use crate::{Database, OptionalExt};
use anyhow::Result;
use rusqlite::Connection;
use tracing::debug;
use uuid::Uuid;

impl Database {
    // -- Follows --

    /// Adds the edge `follower -> followed`. Returns false if it already existed.
    pub fn add_follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (user_following_id, user_being_followed_id) VALUES (?1, ?2)",
                (follower.to_string(), followed.to_string()),
            )?;
            debug!(%follower, %followed, inserted = inserted == 1, "follow");
            Ok(inserted == 1)
        })
    }

    /// Removes the edge `follower -> followed`. Returns false if there was none.
    pub fn remove_follow(&self, follower: Uuid, followed: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE user_following_id = ?1 AND user_being_followed_id = ?2",
                (follower.to_string(), followed.to_string()),
            )?;
            debug!(%follower, %followed, removed = removed == 1, "unfollow");
            Ok(removed == 1)
        })
    }

    /// Does `a` follow `b`?
    pub fn is_following(&self, a: Uuid, b: Uuid) -> Result<bool> {
        self.with_conn(|conn| edge_exists(conn, a, b))
    }

    /// Is `a` followed by `b`?
    pub fn is_followed_by(&self, a: Uuid, b: Uuid) -> Result<bool> {
        self.with_conn(|conn| edge_exists(conn, b, a))
    }

    /// Users `user_id` follows, by username.
    pub fn following(&self, user_id: Uuid) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM follows f
                 JOIN users u ON u.id = f.user_being_followed_id
                 WHERE f.user_following_id = ?1
                 ORDER BY u.username",
                USER_COLUMNS
            );
            query_users(conn, &sql, [user_id.to_string()])
        })
    }

    /// Users following `user_id`, by username.
    pub fn followers(&self, user_id: Uuid) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM follows f
                 JOIN users u ON u.id = f.user_following_id
                 WHERE f.user_being_followed_id = ?1
                 ORDER BY u.username",
                USER_COLUMNS
            );
            query_users(conn, &sql, [user_id.to_string()])
        })
    }

    /// (following, followers) counts.
    pub fn follow_counts(&self, user_id: Uuid) -> Result<(u64, u64)> {
        self.with_conn(|conn| {
            let id = user_id.to_string();
            let following: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE user_following_id = ?1",
                [&id],
                |r| r.get(0),
            )?;
            let followers: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE user_being_followed_id = ?1",
                [&id],
                |r| r.get(0),
            )?;
            Ok((following as u64, followers as u64))
        })
    }

    // -- Likes --

    /// Toggle a like: removes it if present, inserts it (with `id`) if not.
    /// Returns `None` when the message does not exist.
    pub fn toggle_like(
        &self,
        id: Uuid,
        user_id: Uuid,
        message_id: Uuid,
    ) -> Result<Option<LikeState>> {
        self.with_tx(|conn| {
            let message_exists: Option<i64> = conn
                .query_row("SELECT 1 FROM messages WHERE id = ?1", [message_id.to_string()], |r| {
                    r.get(0)
                })
                .optional()?;
            if message_exists.is_none() {
                return Ok(None);
            }

            let removed = conn.execute(
                "DELETE FROM likes WHERE user_id = ?1 AND message_id = ?2",
                (user_id.to_string(), message_id.to_string()),
            )?;

            let state = if removed > 0 {
                LikeState::Unliked
            } else {
                conn.execute(
                    "INSERT INTO likes (id, user_id, message_id) VALUES (?1, ?2, ?3)",
                    (id.to_string(), user_id.to_string(), message_id.to_string()),
                )?;
                LikeState::Liked
            };

            Ok(Some(state))
        })
    }

    pub fn likes_of(&self, user_id: Uuid) -> Result<Vec<LikeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, message_id, created_at FROM likes
                 WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;

            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(LikeRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        message_id: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Messages `user_id` has liked, most recently liked first.
    pub fn liked_messages(&self, user_id: Uuid) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "{} JOIN likes lk ON lk.message_id = m.id
                 WHERE lk.user_id = ?1
                 ORDER BY lk.created_at DESC, lk.rowid DESC",
                MESSAGE_SELECT
            );
            query_messages(conn, &sql, [user_id.to_string()])
        })
    }

    /// Which of `message_ids` has `user_id` liked?
    pub fn liked_among(&self, user_id: Uuid, message_ids: &[String]) -> Result<Vec<String>> {
        if message_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (2..=message_ids.len() + 1).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT message_id FROM likes WHERE user_id = ?1 AND message_id IN ({})",
                placeholders.join(", ")
            );

            let uid = user_id.to_string();
            let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(message_ids.len() + 1);
            params.push(&uid);
            params.extend(message_ids.iter().map(|id| id as &dyn rusqlite::types::ToSql));

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params.as_slice(), |row| row.get(0))?
                .collect::<std::result::Result<Vec<String>, _>>()?;

            Ok(rows)
        })
    }
}

fn edge_exists(conn: &Connection, follower: Uuid, followed: Uuid) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM follows WHERE user_following_id = ?1 AND user_being_followed_id = ?2",
            (follower.to_string(), followed.to_string()),
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seed_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.create_user(id, username, &format!("{}@test.com", username), "HASHED_PASSWORD", "/img.png")
            .unwrap();
        id
    }

    fn seed_message(db: &Database, author: Uuid, text: &str) -> Uuid {
        let id = Uuid::new_v4();
        db.insert_message(id, author, text).unwrap();
        id
    }

    #[test]
    fn following_and_followed_by_agree() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let u2 = seed_user(&db, "testuser2");

        assert!(!db.is_following(u, u2).unwrap());
        assert!(!db.is_followed_by(u2, u).unwrap());

        db.add_follow(u, u2).unwrap();

        assert!(db.is_following(u, u2).unwrap());
        assert!(db.is_followed_by(u2, u).unwrap());
        // the edge is directed
        assert!(!db.is_following(u2, u).unwrap());
        assert!(!db.is_followed_by(u, u2).unwrap());
    }

    #[test]
    fn follow_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");
        let b = seed_user(&db, "b");

        assert!(db.add_follow(a, b).unwrap());
        assert!(!db.add_follow(a, b).unwrap());
        assert_eq!(db.following(a).unwrap().len(), 1);
        assert_eq!(db.follow_counts(a).unwrap(), (1, 0));
        assert_eq!(db.follow_counts(b).unwrap(), (0, 1));

        assert!(db.remove_follow(a, b).unwrap());
        assert!(!db.remove_follow(a, b).unwrap());
        assert!(db.following(a).unwrap().is_empty());
    }

    #[test]
    fn self_follow_is_allowed() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "a");

        assert!(db.add_follow(a, a).unwrap());
        assert!(db.is_following(a, a).unwrap());
    }

    #[test]
    fn listings_are_edge_sets() {
        let db = Database::open_in_memory().unwrap();
        let a = seed_user(&db, "alice");
        let b = seed_user(&db, "bob");
        let c = seed_user(&db, "carol");
        db.add_follow(a, b).unwrap();
        db.add_follow(b, c).unwrap();

        // no transitive closure: alice does not reach carol
        let names: Vec<String> = db.following(a).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["bob"]);

        let names: Vec<String> = db.followers(b).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice"]);
    }

    #[test]
    fn listings_are_sorted_by_username() {
        let db = Database::open_in_memory().unwrap();
        let hub = seed_user(&db, "hub");
        // followed out of alphabetical order
        for name in ["mallory", "carol", "zed", "alice"] {
            let other = seed_user(&db, name);
            db.add_follow(hub, other).unwrap();
            db.add_follow(other, hub).unwrap();
        }

        let names: Vec<String> = db.following(hub).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice", "carol", "mallory", "zed"]);

        let names: Vec<String> = db.followers(hub).unwrap().into_iter().map(|u| u.username).collect();
        assert_eq!(names, vec!["alice", "carol", "mallory", "zed"]);
    }

    #[test]
    fn like_toggles() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let m = seed_message(&db, u, "Test message.");

        let like_id = Uuid::new_v4();
        assert_eq!(db.toggle_like(like_id, u, m).unwrap(), Some(LikeState::Liked));

        let likes = db.likes_of(u).unwrap();
        assert_eq!(likes.len(), 1);
        assert_eq!(likes[0].id, like_id.to_string());
        assert_eq!(likes[0].message_id, m.to_string());
        assert_eq!(likes[0].user_id, u.to_string());
        assert_eq!(db.get_message(m).unwrap().unwrap().like_count, 1);

        assert_eq!(db.toggle_like(Uuid::new_v4(), u, m).unwrap(), Some(LikeState::Unliked));
        assert!(db.likes_of(u).unwrap().is_empty());
    }

    #[test]
    fn like_on_missing_message() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");

        assert_eq!(db.toggle_like(Uuid::new_v4(), u, Uuid::new_v4()).unwrap(), None);
        assert!(db.likes_of(u).unwrap().is_empty());
    }

    #[test]
    fn deleting_a_message_drops_its_likes() {
        let db = Database::open_in_memory().unwrap();
        let author = seed_user(&db, "author");
        let fan = seed_user(&db, "fan");
        let m = seed_message(&db, author, "like me");
        db.toggle_like(Uuid::new_v4(), fan, m).unwrap();

        db.delete_message(m, author).unwrap();

        assert!(db.likes_of(fan).unwrap().is_empty());
        assert!(db.liked_messages(fan).unwrap().is_empty());
    }

    #[test]
    fn liked_among_filters_ids() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let m1 = seed_message(&db, u, "one");
        let m2 = seed_message(&db, u, "two");
        db.toggle_like(Uuid::new_v4(), u, m2).unwrap();

        let liked = db.liked_among(u, &[m1.to_string(), m2.to_string()]).unwrap();
        assert_eq!(liked, vec![m2.to_string()]);

        let texts: Vec<String> = db.liked_messages(u).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["two"]);
    }

    #[test]
    fn liked_messages_are_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        let u = seed_user(&db, "testuser");
        let one = seed_message(&db, u, "one");
        let two = seed_message(&db, u, "two");
        let three = seed_message(&db, u, "three");

        db.toggle_like(Uuid::new_v4(), u, two).unwrap();
        db.toggle_like(Uuid::new_v4(), u, one).unwrap();
        db.toggle_like(Uuid::new_v4(), u, three).unwrap();

        let texts: Vec<String> = db.liked_messages(u).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["three", "one", "two"]);

        // unlike then like again moves it to the front
        db.toggle_like(Uuid::new_v4(), u, two).unwrap();
        db.toggle_like(Uuid::new_v4(), u, two).unwrap();
        let texts: Vec<String> = db.liked_messages(u).unwrap().into_iter().map(|m| m.text).collect();
        assert_eq!(texts, vec!["two", "three", "one"]);
    }
}
