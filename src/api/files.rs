use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::errors::{AppError, AppResult};
use crate::AppState;

/// GET /files/*key
/// Serve an uploaded object. The `token` query parameter on public URLs only
/// busts caches and is not checked.
pub async fn download(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> AppResult<impl IntoResponse> {
    let (data, content_type) = state.storage.download(&key).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AppError::NotFound("File not found".into())
        } else {
            AppError::Storage(e)
        }
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "public, max-age=300".to_string()),
        ],
        data,
    ))
}
