pub mod admin;
pub mod auth_routes;
pub mod files;
pub mod invitations;
pub mod livestreams;
pub mod messages;
pub mod presence;
pub mod private_chats;
pub mod users;

use crate::errors::{AppError, AppResult};
use crate::invitations as chats;
use crate::models::Room;
use crate::AppState;

/// Resolve a `/rooms/:kind/:room_id` pair and check the caller may use it.
/// Livestream rooms are open to every signed-in user; private chats only
/// to their creator and invitees.
pub(crate) async fn room_access(
    state: &AppState,
    kind: &str,
    room_id: &str,
    uid: &str,
) -> AppResult<Room> {
    let room = Room::from_kind(kind, room_id)?;
    if let Room::PrivateChat(chat_id) = &room {
        let chat = chats::get_chat(state.store.as_ref(), chat_id).await?;
        if !chat.is_member(uid) {
            return Err(AppError::Forbidden("Not a member of this chat".into()));
        }
    }
    Ok(room)
}
