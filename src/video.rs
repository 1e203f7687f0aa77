//! Video URL handling and the video platform metadata gateway.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Url;

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::models::VideoSnippet;

static VIDEO_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,64}$").expect("static regex"));

/// Extract a video id from a watch, shorts, live or short-link URL.
///
/// Forms are tried in order: `?v=`, `/shorts/`, `?live=`, `/live/`, then a
/// `youtu.be/` path. Anything that is not an absolute URL, or whose id is
/// not a plain token, yields `None`.
pub fn extract_video_id(raw: &str) -> Option<String> {
    parse_video_id(raw).filter(|id| VIDEO_ID_REGEX.is_match(id))
}

fn parse_video_id(raw: &str) -> Option<String> {
    let url = Url::parse(raw.trim()).ok()?;
    let query = |key: &str| {
        url.query_pairs()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.into_owned())
    };
    // Only `/{prefix}/{id}` at the start of the path counts.
    let after_prefix = |prefix: &str| {
        let mut segments = url.path_segments()?;
        if segments.next()? != prefix {
            return None;
        }
        segments.next().filter(|s| !s.is_empty()).map(String::from)
    };

    if let Some(id) = query("v") {
        return Some(id);
    }
    if let Some(id) = after_prefix("shorts") {
        return Some(id);
    }
    if let Some(id) = query("live") {
        return Some(id);
    }
    if let Some(id) = after_prefix("live") {
        return Some(id);
    }
    if url.host_str() == Some("youtu.be") {
        return url
            .path_segments()
            .and_then(|mut s| s.next())
            .filter(|s| !s.is_empty())
            .map(String::from);
    }
    None
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", urlencoding::encode(video_id))
}

pub fn player_embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", urlencoding::encode(video_id))
}

/// The platform's own live chat, embedded for `embed_domain`.
pub fn chat_embed_url(video_id: &str, embed_domain: &str) -> String {
    format!(
        "https://www.youtube.com/live_chat?v={}&embed_domain={}",
        urlencoding::encode(video_id),
        urlencoding::encode(embed_domain)
    )
}

/// Metadata lookups against the video platform.
#[async_trait]
pub trait VideoMetadata: Send + Sync {
    /// `Ok(None)` when the platform does not know the video.
    async fn fetch_snippet(&self, video_id: &str) -> AppResult<Option<VideoSnippet>>;
}

/// Client for the YouTube Data API, falling back to oEmbed when no API key
/// is configured.
pub struct YouTubeClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
    oembed_base: String,
}

impl YouTubeClient {
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.youtube_timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client error: {e}")))?;
        Ok(Self {
            http,
            api_key: config.youtube_api_key.clone(),
            api_base: "https://www.googleapis.com/youtube/v3".into(),
            oembed_base: "https://www.youtube.com/oembed".into(),
        })
    }

    async fn fetch_json(&self, url: &str) -> AppResult<Option<serde_json::Value>> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("video metadata request failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND
            || status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::BAD_REQUEST
        {
            // oEmbed answers 401/400 for private or malformed ids
            return Ok(None);
        }
        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "video metadata request returned {status}"
            )));
        }

        let json = response
            .json()
            .await
            .map_err(|e| AppError::Gateway(format!("invalid video metadata response: {e}")))?;
        Ok(Some(json))
    }
}

#[async_trait]
impl VideoMetadata for YouTubeClient {
    async fn fetch_snippet(&self, video_id: &str) -> AppResult<Option<VideoSnippet>> {
        if self.api_key.is_empty() {
            let url = format!(
                "{}?url={}&format=json",
                self.oembed_base,
                urlencoding::encode(&watch_url(video_id))
            );
            return Ok(self.fetch_json(&url).await?.as_ref().and_then(parse_oembed));
        }

        let url = format!(
            "{}/videos?part=snippet&id={}&key={}",
            self.api_base,
            urlencoding::encode(video_id),
            urlencoding::encode(&self.api_key)
        );
        Ok(self.fetch_json(&url).await?.as_ref().and_then(parse_videos_response))
    }
}

/// First item's snippet from a `videos.list` response.
fn parse_videos_response(json: &serde_json::Value) -> Option<VideoSnippet> {
    let snippet = json["items"].as_array()?.first()?.get("snippet")?;
    serde_json::from_value(snippet.clone()).ok()
}

fn parse_oembed(json: &serde_json::Value) -> Option<VideoSnippet> {
    Some(VideoSnippet {
        title: json["title"].as_str()?.to_string(),
        channel_title: json["author_name"].as_str().unwrap_or_default().to_string(),
        thumbnails: json
            .get("thumbnail_url")
            .map(|url| serde_json::json!({ "default": { "url": url } }))
            .unwrap_or_default(),
        ..Default::default()
    })
}

/// Metadata source that knows no videos. Used when lookups are disabled.
pub struct NoMetadata;

#[async_trait]
impl VideoMetadata for NoMetadata {
    async fn fetch_snippet(&self, _video_id: &str) -> AppResult<Option<VideoSnippet>> {
        Ok(None)
    }
}
