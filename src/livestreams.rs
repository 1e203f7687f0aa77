use chrono::Utc;
use serde_json::{json, Map};

use crate::errors::{AppError, AppResult};
use crate::models::{LiveStream, LoadedVideo, Room};
use crate::store::{paths, DocumentStore, Query};
use crate::video::{extract_video_id, VideoMetadata};

/// Where the client navigates after a video is loaded.
pub const PLAYER_ROUTE: &str = "/load-live";

pub const UNTITLED_STREAM: &str = "Untitled stream";

fn fallback_title(video_id: &str) -> String {
    format!("Video {video_id}")
}

/// Title from the video platform, or a placeholder when the lookup fails
/// or the video is unknown.
pub async fn fetch_title(metadata: &dyn VideoMetadata, video_id: &str) -> String {
    match metadata.fetch_snippet(video_id).await {
        Ok(Some(snippet)) if !snippet.title.trim().is_empty() => snippet.title,
        Ok(_) => fallback_title(video_id),
        Err(e) => {
            tracing::warn!(video_id, "Video title lookup failed: {}", e);
            fallback_title(video_id)
        }
    }
}

/// Register a pasted video URL as an active livestream.
///
/// The caller records the id and history entry in its session.
pub async fn load_video(
    store: &dyn DocumentStore,
    metadata: &dyn VideoMetadata,
    url: &str,
) -> AppResult<LoadedVideo> {
    let url = url.trim();
    let video_id =
        extract_video_id(url).ok_or_else(|| AppError::Validation("Invalid YouTube URL".into()))?;
    let title = fetch_title(metadata, &video_id).await;

    let path = paths::livestream(&video_id);
    if store.get(&path).await?.is_some() {
        let mut fields = Map::new();
        fields.insert("title".into(), json!(title));
        fields.insert("url".into(), json!(url));
        fields.insert("isActive".into(), json!(true));
        store.update(&path, fields).await?;
    } else {
        let stream = LiveStream {
            id: String::new(),
            title: title.clone(),
            url: url.to_string(),
            is_active: true,
            created_at: Some(Utc::now().to_rfc3339()),
        };
        store.set(&path, serde_json::to_value(&stream)?, true).await?;
    }

    tracing::info!(video_id = %video_id, title = %title, "Livestream loaded");
    Ok(LoadedVideo {
        video_id,
        title,
        url: url.to_string(),
        route: PLAYER_ROUTE.to_string(),
    })
}

async fn query_streams(store: &dyn DocumentStore, query: Query) -> AppResult<Vec<LiveStream>> {
    let mut streams: Vec<LiveStream> = store
        .query(paths::LIVESTREAMS, &query)
        .await?
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(stream) => Some(stream),
            Err(e) => {
                tracing::warn!(id = %doc.id, "Skipping malformed livestream: {}", e);
                None
            }
        })
        .collect();
    // newest first
    streams.sort_by(|a: &LiveStream, b: &LiveStream| b.created_at.cmp(&a.created_at));
    Ok(streams)
}

pub async fn active_streams(store: &dyn DocumentStore) -> AppResult<Vec<LiveStream>> {
    query_streams(store, Query::new().where_eq("isActive", true)).await
}

pub async fn all_streams(store: &dyn DocumentStore) -> AppResult<Vec<LiveStream>> {
    query_streams(store, Query::new()).await
}

/// Never fails: unknown streams and lookup errors read as a placeholder.
pub async fn stream_title(store: &dyn DocumentStore, video_id: &str) -> String {
    if paths::check_id(video_id).is_err() {
        return UNTITLED_STREAM.to_string();
    }
    match store.get(&paths::livestream(video_id)).await {
        Ok(Some(doc)) => doc
            .decode::<LiveStream>()
            .ok()
            .map(|s| s.title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED_STREAM.to_string()),
        Ok(None) => UNTITLED_STREAM.to_string(),
        Err(e) => {
            tracing::warn!(video_id, "Stream title lookup failed: {}", e);
            UNTITLED_STREAM.to_string()
        }
    }
}

/// Move a stream's chat history to `archive/{id}/messages` and mark the
/// stream inactive. Returns the number of messages moved.
pub async fn archive_stream(store: &dyn DocumentStore, video_id: &str) -> AppResult<usize> {
    paths::check_id(video_id)?;
    let room = Room::Livestream(video_id.to_string());
    let messages = store.query(&paths::messages(&room), &Query::new()).await?;
    let archive = paths::archived_messages(video_id);

    for doc in &messages {
        store
            .set(&format!("{archive}/{}", doc.id), doc.data.clone(), false)
            .await?;
        store.delete(&paths::message(&room, &doc.id)).await?;
    }

    let stream_path = paths::livestream(video_id);
    if store.get(&stream_path).await?.is_some() {
        let mut fields = Map::new();
        fields.insert("isActive".into(), json!(false));
        store.update(&stream_path, fields).await?;
    }

    tracing::info!(video_id, archived = messages.len(), "Livestream chat archived");
    Ok(messages.len())
}
