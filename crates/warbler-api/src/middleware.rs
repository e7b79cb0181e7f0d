use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use chrono::{Duration, Utc};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::{AppState, blocking};

pub const SESSION_COOKIE: &str = "warbler_session";

/// How long a signed-in session stays valid.
pub const SESSION_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub username: String,
}

/// Session state resolved for one request. `user` is `None` when anonymous.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub id: Option<String>,
    pub user: Option<CurrentUser>,
}

/// Resolve the session cookie to the signed-in user and attach a [`Session`]
/// to the request. Never rejects: unknown or stale sessions are anonymous.
pub async fn load_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let session_id = jar.get(SESSION_COOKIE).map(|c| c.value().to_string());

    let user = match session_id.clone() {
        Some(sid) => {
            blocking(&state, move |db| {
                db.session_user(&sid)?
                    .map(|row| {
                        Ok::<_, anyhow::Error>(CurrentUser {
                            id: row.user_id()?,
                            username: row.username,
                        })
                    })
                    .transpose()
            })
            .await?
        }
        None => None,
    };

    req.extensions_mut().insert(Session { id: session_id, user });
    Ok(next.run(req).await)
}

/// The signed-in user. Extracting it on an anonymous request fails with
/// [`ApiError::AnonymousAccess`].
#[derive(Debug, Clone)]
pub struct AuthUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .and_then(|session| session.user.clone())
            .map(AuthUser)
            .ok_or(ApiError::AnonymousAccess)
    }
}

/// Open a new server-side session for `user_id` and hand its id to the client.
/// The session the request arrived with, if any, is dropped first.
pub(crate) async fn start_session(
    state: &AppState,
    jar: CookieJar,
    previous: &Session,
    user_id: Uuid,
) -> ApiResult<CookieJar> {
    let previous_id = previous.id.clone();
    let session_id = Uuid::new_v4();
    let expires_at = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    blocking(state, move |db| {
        if let Some(sid) = previous_id {
            db.delete_session(&sid)?;
        }
        db.create_session(session_id, user_id, expires_at)
    })
    .await?;

    let cookie = Cookie::build((SESSION_COOKIE, session_id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.secure_cookie);

    Ok(jar.add(cookie))
}

/// Drop the server-side session (if any) and clear the cookie.
pub(crate) async fn end_session(
    state: &AppState,
    jar: CookieJar,
    session: &Session,
) -> ApiResult<CookieJar> {
    if let Some(sid) = session.id.clone() {
        blocking(state, move |db| db.delete_session(&sid)).await?;
    }

    Ok(jar.remove(Cookie::build(SESSION_COOKIE).path("/")))
}
