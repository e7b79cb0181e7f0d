use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use warbler_types::api::ErrorResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A protected route was hit without a signed-in session. Served as a
    /// 500: this is an unmet precondition, not a recoverable failure.
    #[error("no authenticated user in session")]
    AnonymousAccess,

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("internal server error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::AnonymousAccess | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// Unique-constraint failures on users become conflicts the caller can
/// show; every other store error is internal.
impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match warbler_db::unique_violation(&err).as_deref() {
            Some("users.username") => Self::Conflict("Username already taken".into()),
            Some("users.email") => Self::Conflict("Email already taken".into()),
            _ => Self::Internal(err),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", err);
        Self::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::AnonymousAccess => error!("protected route reached without a session user"),
            Self::Internal(err) => error!(error = %err, "internal server error"),
            _ => {}
        }

        let message = match &self {
            Self::AnonymousAccess => "internal server error".to_string(),
            other => other.to_string(),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
