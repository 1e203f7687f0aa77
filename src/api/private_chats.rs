use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::errors::{AppError, AppResult};
use crate::invitations;
use crate::middleware::AuthUser;
use crate::models::{CreateChatRequest, InviteUserRequest, PrivateChat, User};
use crate::users;
use crate::AppState;

/// GET /api/v1/private-chats
/// Chats the caller created or was invited to.
pub async fn list_chats(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<Vec<PrivateChat>>> {
    let chats = invitations::chats_for_user(state.store.as_ref(), &claims.sub).await?;
    Ok(Json(chats))
}

/// POST /api/v1/private-chats
pub async fn create_chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<CreateChatRequest>,
) -> AppResult<(StatusCode, Json<PrivateChat>)> {
    let creator = users::fetch_user(state.store.as_ref(), &claims.sub).await?;
    let chat = invitations::create_chat(
        state.store.as_ref(),
        &creator,
        &req,
        state.config.max_private_chats,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(chat)))
}

/// GET /api/v1/private-chats/:chat_id
pub async fn get_chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<PrivateChat>> {
    let chat = invitations::get_chat(state.store.as_ref(), &chat_id).await?;
    if !chat.is_member(&claims.sub) {
        return Err(AppError::Forbidden("Not a member of this chat".into()));
    }
    Ok(Json(chat))
}

/// GET /api/v1/private-chats/:chat_id/members
pub async fn list_members(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(chat_id): Path<String>,
) -> AppResult<Json<Vec<User>>> {
    let chat = invitations::get_chat(state.store.as_ref(), &chat_id).await?;
    if !chat.is_member(&claims.sub) {
        return Err(AppError::Forbidden("Not a member of this chat".into()));
    }
    let members = invitations::chat_members(state.store.as_ref(), &chat_id).await?;
    Ok(Json(members))
}

/// POST /api/v1/private-chats/:chat_id/invite
/// `added` is false when the user was already part of the chat.
pub async fn invite_user(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(chat_id): Path<String>,
    Json(req): Json<InviteUserRequest>,
) -> AppResult<Json<Value>> {
    let added =
        invitations::invite_existing_user(state.store.as_ref(), &chat_id, &claims.sub, req.uid.trim())
            .await?;
    Ok(Json(json!({ "added": added })))
}
