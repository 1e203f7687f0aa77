use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};

use crate::errors::{AppError, AppResult};
use crate::models::{Message, Room, User};
use crate::store::{paths, DocumentStore};
use crate::text::prepare_outgoing;

pub const MAX_REACTION_LEN: usize = 16;

/// Post a message. Blank input writes nothing and returns `None`.
pub async fn send_message(
    store: &dyn DocumentStore,
    room: &Room,
    author: &User,
    input: &str,
) -> AppResult<Option<Message>> {
    let Some(text) = prepare_outgoing(input) else {
        return Ok(None);
    };

    let mut message = Message {
        id: String::new(),
        text,
        author_name: author.effective_display_name().to_string(),
        author_uid: Some(author.uid.clone()),
        timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        reactions: BTreeMap::new(),
    };
    message.id = store
        .add(&paths::messages(room), serde_json::to_value(&message)?)
        .await?;

    tracing::debug!(room = room.id(), message_id = %message.id, "Message sent");
    Ok(Some(message))
}

async fn load_message(store: &dyn DocumentStore, room: &Room, message_id: &str) -> AppResult<Message> {
    paths::check_id(message_id)?;
    store
        .get(&paths::message(room, message_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Message not found".into()))?
        .decode()
}

/// Authors may delete their own messages; moderators may delete any.
pub async fn delete_message(
    store: &dyn DocumentStore,
    room: &Room,
    message_id: &str,
    requester: &str,
    is_moderator: bool,
) -> AppResult<()> {
    let message = load_message(store, room, message_id).await?;
    let is_author = message.author_uid.as_deref() == Some(requester);
    if !is_author && !is_moderator {
        return Err(AppError::Forbidden(
            "You can only delete your own messages".into(),
        ));
    }

    store.delete(&paths::message(room, message_id)).await?;
    tracing::info!(room = room.id(), message_id, requester, "Message deleted");
    Ok(())
}

pub async fn add_reaction(
    store: &dyn DocumentStore,
    room: &Room,
    message_id: &str,
    emoji: &str,
) -> AppResult<()> {
    let emoji = emoji.trim();
    let len = emoji.chars().count();
    if len == 0 || len > MAX_REACTION_LEN || emoji.contains('.') {
        return Err(AppError::Validation("Invalid reaction".into()));
    }

    load_message(store, room, message_id).await?;
    store
        .increment(
            &paths::message(room, message_id),
            &format!("reactions.{emoji}"),
            1,
        )
        .await
}
