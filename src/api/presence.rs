use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::api::room_access;
use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::AppState;

/// GET /api/v1/rooms/:kind/:room_id/presence
/// Users who posted within the activity window. Store failures read as an
/// empty room.
pub async fn active_users(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((kind, room_id)): Path<(String, String)>,
) -> AppResult<Json<Value>> {
    let room = room_access(&state, &kind, &room_id, &claims.sub).await?;
    let users = state.presence.active_users_or_empty(&room).await;
    Ok(Json(json!({
        "count": users.len(),
        "users": users,
    })))
}
