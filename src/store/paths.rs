//! Collection layout.

use crate::errors::{AppError, AppResult};
use crate::models::Room;

pub const USERS: &str = "users";
pub const LIVESTREAMS: &str = "livestreams";
pub const PRIVATE_CHATS: &str = "privateChats";
pub const ARCHIVE: &str = "archive";

/// Ids coming from requests name exactly one document: non-empty, no `/`.
pub fn check_id(id: &str) -> AppResult<()> {
    if id.is_empty() || id.contains('/') {
        return Err(AppError::Validation(format!("Invalid id '{id}'")));
    }
    Ok(())
}

pub fn user(uid: &str) -> String {
    format!("{USERS}/{uid}")
}

pub fn livestream(video_id: &str) -> String {
    format!("{LIVESTREAMS}/{video_id}")
}

pub fn private_chat(chat_id: &str) -> String {
    format!("{PRIVATE_CHATS}/{chat_id}")
}

pub fn invitations(uid: &str) -> String {
    format!("{USERS}/{uid}/invitations")
}

pub fn invitation(uid: &str, invitation_id: &str) -> String {
    format!("{}/{invitation_id}", invitations(uid))
}

pub fn messages(room: &Room) -> String {
    match room {
        Room::Livestream(id) => format!("{}/messages", livestream(id)),
        Room::PrivateChat(id) => format!("{}/messages", private_chat(id)),
    }
}

pub fn message(room: &Room, message_id: &str) -> String {
    format!("{}/{message_id}", messages(room))
}

pub fn archived_messages(video_id: &str) -> String {
    format!("{ARCHIVE}/{video_id}/messages")
}
