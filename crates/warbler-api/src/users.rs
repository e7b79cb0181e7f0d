use axum::{
    Extension, Form, Json,
    extract::{Path, Query, State},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info};
use uuid::Uuid;

use warbler_db::models::{LikeState, MessageRow, ProfileUpdate, UserRow};
use warbler_types::api::{
    FollowListResponse, LikesResponse, ProfileForm, ProfileResponse, UserListResponse,
    UserSearchQuery,
};
use warbler_types::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL, Message};

use crate::auth::{non_blank, validate_account, verify_password};
use crate::error::{ApiError, ApiResult};
use crate::middleware::{AuthUser, Session, end_session};
use crate::{AppState, blocking, found};

/// Messages shown on a profile page.
const PROFILE_MESSAGE_LIMIT: u32 = 100;

pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<UserSearchQuery>,
) -> ApiResult<Json<UserListResponse>> {
    let rows = blocking(&state, move |db| db.search_users(query.q.as_deref())).await?;
    let users = rows.iter().map(UserRow::summary).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(Json(UserListResponse { users }))
}

pub async fn show_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<ProfileResponse>> {
    let profile = blocking(&state, move |db| {
        let Some(user) = db.get_user_by_id(user_id)? else {
            return Ok(None);
        };
        let messages = db.messages_by(user_id, PROFILE_MESSAGE_LIMIT)?;
        let (following, followers) = db.follow_counts(user_id)?;
        let likes = db.likes_of(user_id)?.len() as u64;
        Ok(Some((user, messages, following, followers, likes)))
    })
    .await?;

    let (user, messages, following_count, followers_count, likes_count) =
        profile.ok_or(ApiError::NotFound("User"))?;

    Ok(Json(ProfileResponse {
        user: user.into_user()?,
        messages: into_messages(messages)?,
        following_count,
        followers_count,
        likes_count,
    }))
}

/// GET /users/{id}/following: everyone this user follows.
pub async fn show_following(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<FollowListResponse>> {
    let (user, users) = blocking(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let users = match user {
            Some(_) => db.following(user_id)?,
            None => vec![],
        };
        Ok((user, users))
    })
    .await?;

    follow_list(user, users)
}

/// GET /users/{id}/followers: everyone following this user.
pub async fn show_followers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<FollowListResponse>> {
    let (user, users) = blocking(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let users = match user {
            Some(_) => db.followers(user_id)?,
            None => vec![],
        };
        Ok((user, users))
    })
    .await?;

    follow_list(user, users)
}

pub async fn show_likes(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<LikesResponse>> {
    let (user, messages) = blocking(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let messages = match user {
            Some(_) => db.liked_messages(user_id)?,
            None => vec![],
        };
        Ok((user, messages))
    })
    .await?;

    let user = user.ok_or(ApiError::NotFound("User"))?;
    Ok(Json(LikesResponse {
        user: user.summary()?,
        messages: into_messages(messages)?,
    }))
}

pub async fn add_follow(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let follower = user.id;
    let followed = blocking(&state, move |db| match db.get_user_by_id(target_id)? {
        Some(_) => db.add_follow(follower, target_id).map(Some),
        None => Ok(None),
    })
    .await?;

    if followed.is_none() {
        return Err(ApiError::NotFound("User"));
    }

    Ok(found(format!("/users/{}/following", follower)))
}

pub async fn stop_following(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(target_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let follower = user.id;
    blocking(&state, move |db| db.remove_follow(follower, target_id)).await?;

    Ok(found(format!("/users/{}/following", follower)))
}

/// POST /users/add_like/{message_id}: like if not yet liked, otherwise unlike.
pub async fn toggle_like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let like_id = Uuid::new_v4();
    let user_id = user.id;
    let state_after = blocking(&state, move |db| db.toggle_like(like_id, user_id, message_id))
        .await?
        .ok_or(ApiError::NotFound("Message"))?;

    debug!(%user_id, %message_id, liked = state_after == LikeState::Liked, "like toggled");
    Ok(found("/"))
}

/// POST /users/profile: the current password must verify before anything changes.
pub async fn edit_profile(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Form(form): Form<ProfileForm>,
) -> ApiResult<impl IntoResponse> {
    let user_id = user.id;
    let row = blocking(&state, move |db| db.get_user_by_id(user_id))
        .await?
        .ok_or(ApiError::NotFound("User"))?;

    if !verify_password(&row, &form.password) {
        return Err(ApiError::InvalidCredentials);
    }
    let (username, email) = validate_account(&form.username, &form.email)?;
    let (username, email) = (username.to_string(), email.to_string());

    blocking(&state, move |db| {
        let update = ProfileUpdate {
            username: &username,
            email: &email,
            image_url: non_blank(form.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL),
            header_image_url: non_blank(form.header_image_url.as_deref())
                .unwrap_or(DEFAULT_HEADER_IMAGE_URL),
            bio: non_blank(form.bio.as_deref()),
            location: non_blank(form.location.as_deref()),
        };
        db.update_profile(user_id, &update)
    })
    .await?;

    info!(%user_id, "profile updated");
    Ok(found(format!("/users/{}", user_id)))
}

/// POST /users/delete: remove the account and everything hanging off it.
pub async fn delete_user(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let user_id = user.id;
    blocking(&state, move |db| db.delete_user(user_id)).await?;
    info!(%user_id, username = %user.username, "user deleted");

    let jar = end_session(&state, jar, &session).await?;
    Ok((jar, found("/signup")))
}

fn follow_list(user: Option<UserRow>, users: Vec<UserRow>) -> ApiResult<Json<FollowListResponse>> {
    let user = user.ok_or(ApiError::NotFound("User"))?;
    Ok(Json(FollowListResponse {
        user: user.summary()?,
        users: users.iter().map(UserRow::summary).collect::<anyhow::Result<Vec<_>>>()?,
    }))
}

fn into_messages(rows: Vec<MessageRow>) -> ApiResult<Vec<Message>> {
    Ok(rows
        .into_iter()
        .map(MessageRow::into_message)
        .collect::<anyhow::Result<Vec<_>>>()?)
}
