use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::{SaltString, rand_core::OsRng}};
use axum::{Extension, Form, extract::State, response::IntoResponse};
use axum_extra::extract::cookie::CookieJar;
use tracing::{info, warn};
use uuid::Uuid;

use warbler_db::models::UserRow;
use warbler_types::api::{LoginForm, SignupForm};
use warbler_types::models::DEFAULT_IMAGE_URL;

use crate::error::{ApiError, ApiResult};
use crate::middleware::{Session, end_session, start_session};
use crate::{AppState, blocking, found};

const MAX_USERNAME_LEN: usize = 30;
const MIN_PASSWORD_LEN: usize = 6;

pub async fn signup(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Form(form): Form<SignupForm>,
) -> ApiResult<impl IntoResponse> {
    let (username, email) = validate_account(&form.username, &form.email)?;
    if form.password.len() < MIN_PASSWORD_LEN {
        return Err(ApiError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    let password_hash = hash_password(&form.password)?;
    let image_url = non_blank(form.image_url.as_deref()).unwrap_or(DEFAULT_IMAGE_URL).to_string();
    let user_id = Uuid::new_v4();
    let (username, email) = (username.to_string(), email.to_string());

    // A taken username or email surfaces here as ApiError::Conflict
    let stored = username.clone();
    blocking(&state, move |db| {
        db.create_user(user_id, &stored, &email, &password_hash, &image_url)
    })
    .await?;

    info!(%user_id, %username, "user signed up");

    let jar = start_session(&state, jar, &session, user_id).await?;
    Ok((jar, found("/")))
}

pub async fn login(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
    Form(form): Form<LoginForm>,
) -> ApiResult<impl IntoResponse> {
    let username = form.username.trim().to_string();
    let lookup = username.clone();
    let user = blocking(&state, move |db| db.get_user_by_username(&lookup)).await?;

    let Some(user) = user.filter(|u| verify_password(u, &form.password)) else {
        warn!(%username, "failed login");
        return Err(ApiError::InvalidCredentials);
    };

    let user_id = user.user_id()?;
    info!(%user_id, username = %user.username, "user logged in");

    let jar = start_session(&state, jar, &session, user_id).await?;
    Ok((jar, found("/")))
}

pub async fn logout(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    if let Some(user) = &session.user {
        info!(user_id = %user.id, "user logged out");
    }

    let jar = end_session(&state, jar, &session).await?;
    Ok((jar, found("/login")))
}

/// Hash with Argon2id and a fresh salt.
pub(crate) fn hash_password(password: &str) -> ApiResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("password hashing failed: {}", e)))?
        .to_string();
    Ok(hash)
}

/// True when `password` matches the stored hash. A corrupt hash never matches.
pub(crate) fn verify_password(user: &UserRow, password: &str) -> bool {
    let Ok(parsed_hash) = PasswordHash::new(&user.password) else {
        warn!(user_id = %user.id, "stored password hash is unreadable");
        return false;
    };

    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Check a username and email pair, returning both trimmed. The trimmed
/// values are what gets stored.
pub(crate) fn validate_account<'a>(username: &'a str, email: &'a str) -> ApiResult<(&'a str, &'a str)> {
    let username = username.trim();
    let email = email.trim();

    let username_len = username.chars().count();
    if username.is_empty() || username_len > MAX_USERNAME_LEN {
        return Err(ApiError::Validation(format!(
            "Username must be 1 to {} characters",
            MAX_USERNAME_LEN
        )));
    }

    let well_formed = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty());
    if !well_formed {
        return Err(ApiError::Validation("Invalid email address".into()));
    }

    Ok((username, email))
}

/// `Some(value)` unless it is missing or whitespace.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row_with_hash(hash: String) -> UserRow {
        UserRow {
            id: Uuid::new_v4().to_string(),
            username: "testuser".into(),
            email: "test@test.com".into(),
            password: hash,
            image_url: DEFAULT_IMAGE_URL.into(),
            header_image_url: String::new(),
            bio: None,
            location: None,
            created_at: "2024-01-01 00:00:00".into(),
        }
    }

    #[test]
    fn hash_then_verify() {
        let user = row_with_hash(hash_password("testuser").unwrap());
        assert!(verify_password(&user, "testuser"));
        assert!(!verify_password(&user, "wrong"));
    }

    #[test]
    fn unreadable_hash_never_matches() {
        let user = row_with_hash("HASHED_PASSWORD".into());
        assert!(!verify_password(&user, "HASHED_PASSWORD"));
    }

    #[test]
    fn account_validation() {
        assert!(validate_account("testuser", "test@test.com").is_ok());
        assert!(validate_account("", "test@test.com").is_err());
        assert!(validate_account(&"x".repeat(31), "test@test.com").is_err());
        assert!(validate_account("testuser", "not-an-email").is_err());
        assert!(validate_account("testuser", "@test.com").is_err());
        assert!(validate_account("   ", "test@test.com").is_err());
    }

    #[test]
    fn account_fields_are_trimmed() {
        let (username, email) = validate_account("  bob ", " bob@test.com\n").unwrap();
        assert_eq!(username, "bob");
        assert_eq!(email, "bob@test.com");

        // the length limit applies after trimming
        let padded = format!(" {} ", "x".repeat(30));
        assert!(validate_account(&padded, "test@test.com").is_ok());
    }

    #[test]
    fn blank_values_are_dropped() {
        assert_eq!(non_blank(Some("  ")), None);
        assert_eq!(non_blank(None), None);
        assert_eq!(non_blank(Some(" /a.png ")), Some("/a.png"));
    }
}
