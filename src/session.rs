//! Per-device session state persisted as a small JSON file.
//!
//! Holds the cached signed-in user, the last loaded video, the video
//! history and panel layouts. A missing, unreadable or corrupt file is
//! treated as an empty session.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::AppResult;
use crate::models::{HistoryEntry, PanelLayout, User};

pub const LAST_USER: &str = "lastUser";
pub const LAST_VIDEO_ID: &str = "lastVideoId";
pub const VIDEO_HISTORY: &str = "videoHistory";
pub const VIDEO_PLAYER_SETTINGS: &str = "videoPlayerSettings";
pub const CHAT_SETTINGS: &str = "chatSettings";

const SCHEMA_VERSION: u32 = 1;

/// On-disk layout. Version 0 files are a flat map of key → string.
#[derive(Debug, Serialize, Deserialize)]
struct SessionFile {
    version: u32,
    #[serde(default)]
    values: BTreeMap<String, String>,
}

pub struct Session {
    path: Option<PathBuf>,
    values: RwLock<BTreeMap<String, String>>,
}

impl Session {
    /// Session that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            values: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => parse_session_file(&raw).unwrap_or_else(|| {
                tracing::warn!(path = %path.display(), "Ignoring corrupt session file");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Cannot read session file: {}", e);
                BTreeMap::new()
            }
        };
        Self {
            path: Some(path),
            values: RwLock::new(values),
        }
    }

    fn raw(&self, key: &str) -> Option<String> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values.get(key).cloned()
    }

    fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.raw(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, "Discarding unreadable session value: {}", e);
                None
            }
        }
    }

    async fn put<T: Serialize>(&self, key: &str, value: &T) -> AppResult<()> {
        let encoded = serde_json::to_string(value)?;
        {
            let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
            values.insert(key.to_string(), encoded);
        }
        self.persist().await
    }

    async fn remove(&self, key: &str) -> AppResult<()> {
        {
            let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
            values.remove(key);
        }
        self.persist().await
    }

    /// Writes go through a temp file and a rename.
    async fn persist(&self) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = SessionFile {
            version: SCHEMA_VERSION,
            values: self.values.read().unwrap_or_else(|e| e.into_inner()).clone(),
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(&file)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    // ─── Signed-in user ────────────────────────────────

    pub fn last_user(&self) -> Option<User> {
        self.get(LAST_USER)
    }

    pub fn is_signed_in(&self) -> bool {
        self.last_user().is_some()
    }

    pub async fn set_last_user(&self, user: &User) -> AppResult<()> {
        self.put(LAST_USER, user).await
    }

    pub async fn clear_last_user(&self) -> AppResult<()> {
        self.remove(LAST_USER).await
    }

    // ─── Video ─────────────────────────────────────────

    /// Older clients stored the bare id rather than a JSON string.
    pub fn last_video_id(&self) -> Option<String> {
        let raw = self.raw(LAST_VIDEO_ID)?;
        let id = serde_json::from_str::<String>(&raw).unwrap_or(raw);
        (!id.is_empty()).then_some(id)
    }

    pub async fn set_last_video_id(&self, video_id: &str) -> AppResult<()> {
        self.put(LAST_VIDEO_ID, &video_id).await
    }

    /// Most recent first, unique by URL.
    pub fn video_history(&self) -> Vec<HistoryEntry> {
        self.get(VIDEO_HISTORY).unwrap_or_default()
    }

    pub async fn record_history(&self, title: &str, url: &str) -> AppResult<Vec<HistoryEntry>> {
        let mut history = self.video_history();
        history.retain(|entry| entry.url != url);
        history.insert(
            0,
            HistoryEntry {
                title: title.to_string(),
                url: url.to_string(),
            },
        );
        self.put(VIDEO_HISTORY, &history).await?;
        Ok(history)
    }

    pub async fn clear_history(&self) -> AppResult<()> {
        self.remove(VIDEO_HISTORY).await
    }

    // ─── Panel layouts ─────────────────────────────────

    pub fn player_layout(&self) -> Option<PanelLayout> {
        self.get(VIDEO_PLAYER_SETTINGS)
    }

    pub async fn set_player_layout(&self, layout: &PanelLayout) -> AppResult<()> {
        self.put(VIDEO_PLAYER_SETTINGS, layout).await
    }

    pub fn chat_layout(&self) -> Option<PanelLayout> {
        self.get(CHAT_SETTINGS)
    }

    pub async fn set_chat_layout(&self, layout: &PanelLayout) -> AppResult<()> {
        self.put(CHAT_SETTINGS, layout).await
    }
}

/// Parse either the versioned layout or a legacy flat map.
fn parse_session_file(raw: &str) -> Option<BTreeMap<String, String>> {
    let value: Value = serde_json::from_str(raw).ok()?;
    let Value::Object(map) = value else {
        return None;
    };

    if map.get("version").is_some_and(Value::is_u64) {
        let file: SessionFile = serde_json::from_value(Value::Object(map)).ok()?;
        return Some(file.values);
    }

    tracing::info!("Migrating legacy session file to version {}", SCHEMA_VERSION);
    Some(
        map.into_iter()
            .map(|(key, value)| match value {
                Value::String(s) => (key, s),
                other => (key, other.to_string()),
            })
            .collect(),
    )
}
