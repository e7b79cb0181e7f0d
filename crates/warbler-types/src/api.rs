use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Message, User, UserSummary};

// -- Auth --

#[derive(Debug, Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewMessageForm {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: Message,
    pub liked_by_me: bool,
}

// -- Users --

#[derive(Debug, Default, Deserialize)]
pub struct UserSearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserListResponse {
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfileResponse {
    pub user: User,
    pub messages: Vec<Message>,
    pub following_count: u64,
    pub followers_count: u64,
    pub likes_count: u64,
}

/// Either side of the follow graph for one user.
#[derive(Debug, Serialize, Deserialize)]
pub struct FollowListResponse {
    pub user: UserSummary,
    pub users: Vec<UserSummary>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LikesResponse {
    pub user: UserSummary,
    pub messages: Vec<Message>,
}

/// Profile edit. `password` is the current password and must verify before
/// anything changes; blank image fields fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct ProfileForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub image_url: Option<String>,
    pub header_image_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

// -- Home --

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HomeResponse {
    Timeline {
        user: UserSummary,
        messages: Vec<Message>,
        liked_message_ids: Vec<Uuid>,
    },
    Anonymous {
        anonymous: bool,
    },
}

// -- Errors --

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
