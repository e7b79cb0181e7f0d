pub mod auth;
pub mod error;
pub mod home;
pub mod messages;
pub mod middleware;
pub mod users;

use std::sync::Arc;

use axum::{
    Router,
    http::{StatusCode, header},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{get, post},
};

use warbler_db::Database;

use crate::error::ApiResult;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    /// Mark the session cookie `Secure` (only sent over HTTPS).
    pub secure_cookie: bool,
}

/// Every route, with the session middleware applied.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home::homepage))
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/logout", get(auth::logout))
        .route("/messages/new", post(messages::add_message))
        .route("/messages/{message_id}", get(messages::show_message))
        .route("/messages/{message_id}/delete", post(messages::delete_message))
        .route("/users", get(users::list_users))
        .route("/users/profile", post(users::edit_profile))
        .route("/users/delete", post(users::delete_user))
        .route("/users/{user_id}", get(users::show_user))
        .route("/users/{user_id}/following", get(users::show_following))
        .route("/users/{user_id}/followers", get(users::show_followers))
        .route("/users/{user_id}/likes", get(users::show_likes))
        .route("/users/follow/{user_id}", post(users::add_follow))
        .route("/users/stop-following/{user_id}", post(users::stop_following))
        .route("/users/add_like/{message_id}", post(users::toggle_like))
        .layer(from_fn_with_state(state.clone(), middleware::load_session))
        .with_state(state)
}

/// Run a blocking store call off the async runtime.
pub(crate) async fn blocking<F, T>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let out = tokio::task::spawn_blocking(move || f(&state.db)).await??;
    Ok(out)
}

/// 302 Found with a `Location` header.
pub(crate) fn found(location: impl Into<String>) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.into())]).into_response()
}
