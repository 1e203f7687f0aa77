use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use validator::Validate;

use crate::api::room_access;
use crate::errors::{AppError, AppResult};
use crate::feed;
use crate::messages;
use crate::middleware::AuthUser;
use crate::models::{validation_error, Message, MessageView, ReactionRequest, SendMessageRequest};
use crate::store::{paths, Direction, Query};
use crate::users;
use crate::AppState;

/// GET /api/v1/rooms/:kind/:room_id/messages
/// Oldest first, joined with author profiles.
pub async fn list_messages(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((kind, room_id)): Path<(String, String)>,
) -> AppResult<Json<Vec<MessageView>>> {
    let room = room_access(&state, &kind, &room_id, &claims.sub).await?;
    let docs = state
        .store
        .query(
            &paths::messages(&room),
            &Query::new().order_by("timestamp", Direction::Asc),
        )
        .await?;
    Ok(Json(feed::project(&docs, &state.authors).await))
}

/// POST /api/v1/rooms/:kind/:room_id/messages
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((kind, room_id)): Path<(String, String)>,
    Json(req): Json<SendMessageRequest>,
) -> AppResult<(StatusCode, Json<Message>)> {
    let room = room_access(&state, &kind, &room_id, &claims.sub).await?;
    let author = users::fetch_user(state.store.as_ref(), &claims.sub).await?;

    let message = messages::send_message(state.store.as_ref(), &room, &author, &req.text)
        .await?
        .ok_or_else(|| AppError::Validation("Message is empty".into()))?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// DELETE /api/v1/rooms/:kind/:room_id/messages/:message_id
pub async fn delete_message(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((kind, room_id, message_id)): Path<(String, String, String)>,
) -> AppResult<StatusCode> {
    let room = room_access(&state, &kind, &room_id, &claims.sub).await?;
    messages::delete_message(
        state.store.as_ref(),
        &room,
        &message_id,
        &claims.sub,
        state.config.is_moderator(&claims.sub),
    )
    .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/rooms/:kind/:room_id/messages/:message_id/reactions
pub async fn add_reaction(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((kind, room_id, message_id)): Path<(String, String, String)>,
    Json(req): Json<ReactionRequest>,
) -> AppResult<StatusCode> {
    req.validate().map_err(validation_error)?;
    let room = room_access(&state, &kind, &room_id, &claims.sub).await?;
    messages::add_reaction(state.store.as_ref(), &room, &message_id, &req.emoji).await?;
    Ok(StatusCode::NO_CONTENT)
}
