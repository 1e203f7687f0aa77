use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::errors::{AppError, AppResult};

// ─── User ──────────────────────────────────────────────

/// Profile document stored at `users/{uid}`.
///
/// `username` and `profilePicture` come from the identity provider on first
/// sign-in and never change; `displayName` and `photoURL` are the
/// user-editable overrides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl User {
    pub fn effective_display_name(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    pub fn effective_photo(&self) -> Option<&str> {
        self.photo_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .or(self.profile_picture.as_deref().filter(|u| !u.is_empty()))
    }
}

/// What the identity provider tells us about a signed-in account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedIdentity {
    pub uid: String,
    pub display_name: String,
    pub email: Option<String>,
    pub photo_url: Option<String>,
}

// ─── LiveStream ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStream {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedVideo {
    pub video_id: String,
    pub title: String,
    pub url: String,
    pub route: String,
}

/// Snippet returned by the video platform's metadata API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoSnippet {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub channel_title: String,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub thumbnails: serde_json::Value,
}

// ─── Message ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_uid: Option<String>,
    /// RFC 3339, generated by the sender.
    #[serde(default)]
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub reactions: BTreeMap<String, i64>,
}

/// A message joined with its author's profile, as rendered by the feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    #[serde(rename = "authorPhotoURL", default, skip_serializing_if = "Option::is_none")]
    pub author_photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<User>,
}

impl From<Message> for MessageView {
    fn from(message: Message) -> Self {
        Self {
            message,
            author_photo_url: None,
            user_info: None,
        }
    }
}

// ─── Rooms ─────────────────────────────────────────────

/// A chat room whose messages live in a subcollection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "camelCase")]
pub enum Room {
    Livestream(String),
    PrivateChat(String),
}

impl Room {
    /// Parse the `:kind` path segment used by the API.
    pub fn from_kind(kind: &str, id: &str) -> AppResult<Self> {
        crate::store::paths::check_id(id)?;
        match kind {
            "livestreams" => Ok(Room::Livestream(id.to_string())),
            "private-chats" => Ok(Room::PrivateChat(id.to_string())),
            other => Err(AppError::Validation(format!("Unknown room kind '{other}'"))),
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Room::Livestream(id) | Room::PrivateChat(id) => id,
        }
    }
}

// ─── Private chats ─────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateChat {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub creator: String,
    #[serde(default)]
    pub invited_users: Vec<String>,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub created_at: String,
}

impl PrivateChat {
    /// The creator is a member even though it is not listed in `invitedUsers`.
    pub fn is_member(&self, uid: &str) -> bool {
        self.creator == uid || self.invited_users.iter().any(|u| u == uid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

impl InvitationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub chat_id: String,
    pub invited_by: String,
    #[serde(default)]
    pub invited_at: String,
    pub status: InvitationStatus,
}

// ─── Requests ──────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateChatRequest {
    #[validate(length(min = 1, max = 64, message = "Chat name must be 1-64 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 2048, message = "A live URL is required"))]
    pub url: String,

    #[serde(default)]
    pub invited_users: Vec<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DisplayNameRequest {
    #[validate(length(min = 1, max = 32, message = "Display name must be 1-32 characters"))]
    pub display_name: String,
}

/// Body of `PUT /users/@me/photo`. A missing or blank URL restores the
/// identity provider's picture.
#[derive(Debug, Deserialize)]
pub struct PhotoUrlRequest {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PhotoUploadQuery {
    pub file_name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoadVideoRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamsQuery {
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReactionRequest {
    #[validate(length(min = 1, max = 16, message = "Reaction must be 1-16 characters"))]
    pub emoji: String,
}

#[derive(Debug, Deserialize)]
pub struct InviteUserRequest {
    pub uid: String,
}

#[derive(Debug, Deserialize)]
pub struct InvitationQuery {
    pub status: Option<InvitationStatus>,
}

// ─── Session values ────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub title: String,
    pub url: String,
}

/// Geometry of a draggable/resizable panel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PanelLayout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// Map `validator` failures onto the app's validation error.
pub fn validation_error(errors: validator::ValidationErrors) -> AppError {
    let message = errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .next()
        .unwrap_or_else(|| "Invalid input".into());
    AppError::Validation(message)
}
