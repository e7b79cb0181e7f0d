use axum::{
    Form, Json,
    extract::{Path, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use warbler_db::models::DeleteOutcome;
use warbler_types::api::{MessageResponse, NewMessageForm};
use warbler_types::models::MAX_MESSAGE_LEN;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthUser;
use crate::{AppState, blocking, found};

/// POST /messages/new: store the text exactly as submitted.
pub async fn add_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Form(form): Form<NewMessageForm>,
) -> ApiResult<impl IntoResponse> {
    if form.text.trim().is_empty() {
        return Err(ApiError::Validation("Message text is required".into()));
    }
    if form.text.chars().count() > MAX_MESSAGE_LEN {
        return Err(ApiError::Validation(format!(
            "Messages are limited to {} characters",
            MAX_MESSAGE_LEN
        )));
    }

    let message_id = Uuid::new_v4();
    let author_id = user.id;
    blocking(&state, move |db| db.insert_message(message_id, author_id, &form.text)).await?;

    info!(%message_id, %author_id, "message posted");
    Ok(found(format!("/users/{}", user.id)))
}

pub async fn show_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<Json<MessageResponse>> {
    let viewer = user.id;
    let (row, liked) = blocking(&state, move |db| {
        let row = db.get_message(message_id)?;
        let liked = db.liked_among(viewer, &[message_id.to_string()])?;
        Ok((row, liked))
    })
    .await?;

    let message = row.ok_or(ApiError::NotFound("Message"))?.into_message()?;

    Ok(Json(MessageResponse {
        message,
        liked_by_me: !liked.is_empty(),
    }))
}

/// Only the author may delete; the message's likes go with it.
pub async fn delete_message(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(message_id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let owner = user.id;
    let outcome = blocking(&state, move |db| db.delete_message(message_id, owner)).await?;

    match outcome {
        DeleteOutcome::Deleted => {
            info!(%message_id, user_id = %owner, "message deleted");
            Ok(found(format!("/users/{}", owner)))
        }
        DeleteOutcome::NotFound => Err(ApiError::NotFound("Message")),
        DeleteOutcome::NotOwner => Err(ApiError::Forbidden("Access unauthorized")),
    }
}
