use axum::{Extension, Json, extract::State};
use uuid::Uuid;

use warbler_db::models::{MessageRow, parse_id};
use warbler_types::api::HomeResponse;
use warbler_types::models::UserSummary;

use crate::error::{ApiError, ApiResult};
use crate::middleware::Session;
use crate::{AppState, blocking};

/// How many messages the home timeline shows.
const TIMELINE_LIMIT: u32 = 100;

/// GET /: anonymous visitors get a marker; signed-in users get their
/// timeline (own messages plus everyone they follow).
pub async fn homepage(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<HomeResponse>> {
    let Some(current) = session.user else {
        return Ok(Json(HomeResponse::Anonymous { anonymous: true }));
    };

    let user_id = current.id;
    let (user, rows, liked) = blocking(&state, move |db| {
        let user = db.get_user_by_id(user_id)?;
        let rows = db.timeline(user_id, TIMELINE_LIMIT)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        let liked = db.liked_among(user_id, &ids)?;
        Ok((user, rows, liked))
    })
    .await?;

    let user: UserSummary = user.ok_or(ApiError::NotFound("User"))?.summary()?;
    let messages = rows
        .into_iter()
        .map(MessageRow::into_message)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let liked_message_ids = liked
        .iter()
        .map(|id| parse_id(id))
        .collect::<anyhow::Result<Vec<Uuid>>>()?;

    Ok(Json(HomeResponse::Timeline {
        user,
        messages,
        liked_message_ids,
    }))
}
