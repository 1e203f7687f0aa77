use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde_json::{json, Value};

use crate::errors::AppResult;
use crate::livestreams;
use crate::middleware::AuthUser;
use crate::models::{LiveStream, LoadVideoRequest, LoadedVideo, StreamsQuery};
use crate::AppState;

/// POST /api/v1/livestreams
/// Register a pasted video URL and return where the player should go.
pub async fn load_stream(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Json(req): Json<LoadVideoRequest>,
) -> AppResult<Json<LoadedVideo>> {
    let loaded =
        livestreams::load_video(state.store.as_ref(), state.metadata.as_ref(), &req.url).await?;
    Ok(Json(loaded))
}

/// GET /api/v1/livestreams?active=true
pub async fn list_streams(
    State(state): State<AppState>,
    Query(query): Query<StreamsQuery>,
) -> AppResult<Json<Vec<LiveStream>>> {
    let streams = if query.active.unwrap_or(false) {
        livestreams::active_streams(state.store.as_ref()).await?
    } else {
        livestreams::all_streams(state.store.as_ref()).await?
    };
    Ok(Json(streams))
}

/// GET /api/v1/livestreams/:video_id/title
pub async fn stream_title(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Json<Value> {
    let title = livestreams::stream_title(state.store.as_ref(), &video_id).await;
    Json(json!({ "title": title }))
}
