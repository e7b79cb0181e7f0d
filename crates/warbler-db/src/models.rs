//! Database row types. These map directly to SQLite rows.
//! Distinct from warbler-types API models to keep the DB layer independent.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use uuid::Uuid;

use warbler_types::models::{Message, User, UserSummary};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: String,
    pub header_image_url: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub created_at: String,
}

/// A message joined with its author and like count.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: String,
    pub text: String,
    pub user_id: String,
    pub username: String,
    pub image_url: String,
    pub like_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct LikeRow {
    pub id: String,
    pub user_id: String,
    pub message_id: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeState {
    Liked,
    Unliked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
    NotOwner,
}

/// Fields written by a profile edit.
#[derive(Debug, Clone)]
pub struct ProfileUpdate<'a> {
    pub username: &'a str,
    pub email: &'a str,
    pub image_url: &'a str,
    pub header_image_url: &'a str,
    pub bio: Option<&'a str>,
    pub location: Option<&'a str>,
}

impl UserRow {
    pub fn user_id(&self) -> Result<Uuid> {
        parse_id(&self.id)
    }

    pub fn into_user(self) -> Result<User> {
        Ok(User {
            id: parse_id(&self.id)?,
            created_at: parse_timestamp(&self.created_at)?,
            username: self.username,
            email: self.email,
            image_url: self.image_url,
            header_image_url: self.header_image_url,
            bio: self.bio,
            location: self.location,
        })
    }

    pub fn summary(&self) -> Result<UserSummary> {
        Ok(UserSummary {
            id: parse_id(&self.id)?,
            username: self.username.clone(),
            image_url: self.image_url.clone(),
            bio: self.bio.clone(),
        })
    }
}

impl MessageRow {
    pub fn into_message(self) -> Result<Message> {
        Ok(Message {
            id: parse_id(&self.id)?,
            user_id: parse_id(&self.user_id)?,
            created_at: parse_timestamp(&self.created_at)?,
            text: self.text,
            username: self.username,
            image_url: self.image_url,
            like_count: self.like_count.max(0) as u64,
        })
    }
}

pub fn parse_id(raw: &str) -> Result<Uuid> {
    raw.parse().with_context(|| format!("corrupt id '{}'", raw))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS.SSS" without timezone.
/// Parse as naive UTC; RFC 3339 is accepted too.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f").map(|ndt| ndt.and_utc())
        })
        .with_context(|| format!("corrupt timestamp '{}'", raw))
}

/// The inverse of [`parse_timestamp`]: the same text SQLite's `strftime`
/// writes, so stored values compare correctly as strings.
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S%.3f").to_string()
}
