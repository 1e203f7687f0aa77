use axum::{
    extract::{Path, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::livestreams;
use crate::middleware::AdminUser;
use crate::AppState;

/// POST /api/v1/admin/livestreams/:video_id/archive
/// Move a finished stream's chat into the archive and deactivate it.
pub async fn archive_stream(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> AppResult<Json<Value>> {
    let archived = livestreams::archive_stream(state.store.as_ref(), &video_id).await?;
    tracing::info!(admin = %admin.sub, video_id, archived, "Livestream archived");
    Ok(Json(json!({ "archived": archived })))
}
