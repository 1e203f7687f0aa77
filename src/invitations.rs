//! Private chats and the invitation workflow.
//!
//! A chat is created with an initial invite list; each invitee gets a
//! `pending` invitation under their user document. Invitations move to
//! `accepted` or `rejected` and never leave those states.

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{json, Map};
use validator::Validate;

use crate::errors::{AppError, AppResult};
use crate::models::{
    validation_error, CreateChatRequest, Invitation, InvitationStatus, PrivateChat, User,
};
use crate::store::{paths, DocumentStore, Query};
use crate::users;
use crate::video::extract_video_id;

pub async fn create_chat(
    store: &dyn DocumentStore,
    creator: &User,
    req: &CreateChatRequest,
    max_chats: usize,
) -> AppResult<PrivateChat> {
    req.validate().map_err(validation_error)?;

    let owned = store
        .query(
            paths::PRIVATE_CHATS,
            &Query::new().where_eq("creator", creator.uid.as_str()),
        )
        .await?
        .len();
    if owned >= max_chats {
        return Err(AppError::QuotaExceeded(format!(
            "You can only create up to {max_chats} private chats"
        )));
    }

    let mut invited_users: Vec<String> = Vec::new();
    for uid in &req.invited_users {
        let uid = uid.trim();
        if !uid.is_empty() && uid != creator.uid && !invited_users.iter().any(|u| u == uid) {
            invited_users.push(uid.to_string());
        }
    }

    let now = Utc::now().to_rfc3339();
    let mut chat = PrivateChat {
        id: String::new(),
        name: req.name.trim().to_string(),
        creator: creator.uid.clone(),
        invited_users,
        url: req.url.trim().to_string(),
        created_at: now.clone(),
    };
    chat.id = store
        .add(paths::PRIVATE_CHATS, serde_json::to_value(&chat)?)
        .await?;

    for invitee in &chat.invited_users {
        send_invitation(store, &chat.id, &chat.creator, invitee, &now).await?;
    }

    tracing::info!(
        chat_id = %chat.id,
        creator = %chat.creator,
        invited = chat.invited_users.len(),
        "Private chat created"
    );
    Ok(chat)
}

async fn send_invitation(
    store: &dyn DocumentStore,
    chat_id: &str,
    invited_by: &str,
    invitee: &str,
    invited_at: &str,
) -> AppResult<String> {
    let invitation = Invitation {
        id: String::new(),
        chat_id: chat_id.to_string(),
        invited_by: invited_by.to_string(),
        invited_at: invited_at.to_string(),
        status: InvitationStatus::Pending,
    };
    store
        .add(&paths::invitations(invitee), serde_json::to_value(&invitation)?)
        .await
}

async fn load_invitation(
    store: &dyn DocumentStore,
    uid: &str,
    invitation_id: &str,
) -> AppResult<Invitation> {
    paths::check_id(invitation_id)?;
    store
        .get(&paths::invitation(uid, invitation_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Invitation not found".into()))?
        .decode()
}

async fn set_status(
    store: &dyn DocumentStore,
    uid: &str,
    invitation: &mut Invitation,
    status: InvitationStatus,
) -> AppResult<()> {
    let mut fields = Map::new();
    fields.insert("status".into(), json!(status));
    store
        .update(&paths::invitation(uid, &invitation.id), fields)
        .await?;
    invitation.status = status;
    Ok(())
}

/// Accepting twice is a no-op; accepting a rejected invitation fails.
pub async fn accept_invitation(
    store: &dyn DocumentStore,
    uid: &str,
    invitation_id: &str,
) -> AppResult<Invitation> {
    let mut invitation = load_invitation(store, uid, invitation_id).await?;
    match invitation.status {
        InvitationStatus::Accepted => {}
        InvitationStatus::Rejected => {
            return Err(AppError::InvalidTransition(
                "Invitation was already rejected".into(),
            ))
        }
        InvitationStatus::Pending => {
            set_status(store, uid, &mut invitation, InvitationStatus::Accepted).await?;
            tracing::info!(uid, chat_id = %invitation.chat_id, "Invitation accepted");
        }
    }
    Ok(invitation)
}

/// Rejecting twice is a no-op; rejecting an accepted invitation fails.
pub async fn reject_invitation(
    store: &dyn DocumentStore,
    uid: &str,
    invitation_id: &str,
) -> AppResult<Invitation> {
    let mut invitation = load_invitation(store, uid, invitation_id).await?;
    match invitation.status {
        InvitationStatus::Rejected => {}
        InvitationStatus::Accepted => {
            return Err(AppError::InvalidTransition(
                "Invitation was already accepted".into(),
            ))
        }
        InvitationStatus::Pending => {
            set_status(store, uid, &mut invitation, InvitationStatus::Rejected).await?;
            tracing::info!(uid, chat_id = %invitation.chat_id, "Invitation rejected");
        }
    }
    Ok(invitation)
}

pub async fn invitations_for(
    store: &dyn DocumentStore,
    uid: &str,
    status: Option<InvitationStatus>,
) -> AppResult<Vec<Invitation>> {
    let mut query = Query::new();
    if let Some(status) = status {
        query = query.where_eq("status", status.as_str());
    }
    let mut invitations: Vec<Invitation> = store
        .query(&paths::invitations(uid), &query)
        .await?
        .iter()
        .map(|doc| doc.decode())
        .collect::<AppResult<_>>()?;
    invitations.sort_by(|a, b| a.invited_at.cmp(&b.invited_at).then_with(|| a.id.cmp(&b.id)));
    Ok(invitations)
}

pub async fn pending_invitations(
    store: &dyn DocumentStore,
    uid: &str,
) -> AppResult<Vec<Invitation>> {
    invitations_for(store, uid, Some(InvitationStatus::Pending)).await
}

/// Add an existing user to a chat. Only members may invite, and a pending
/// invitation is written only when the user was not already listed.
pub async fn invite_existing_user(
    store: &dyn DocumentStore,
    chat_id: &str,
    inviter: &str,
    invitee: &str,
) -> AppResult<bool> {
    paths::check_id(invitee)?;
    let chat = get_chat(store, chat_id).await?;
    if !chat.is_member(inviter) {
        return Err(AppError::Forbidden("Only chat members can invite".into()));
    }
    if invitee == chat.creator {
        return Ok(false);
    }
    users::fetch_user(store, invitee).await?;

    let added = store
        .array_union(&paths::private_chat(chat_id), "invitedUsers", json!(invitee))
        .await?;
    if added {
        send_invitation(store, chat_id, inviter, invitee, &Utc::now().to_rfc3339()).await?;
        tracing::info!(chat_id, inviter, invitee, "User invited to private chat");
    }
    Ok(added)
}

pub async fn get_chat(store: &dyn DocumentStore, chat_id: &str) -> AppResult<PrivateChat> {
    paths::check_id(chat_id)?;
    store
        .get(&paths::private_chat(chat_id))
        .await?
        .ok_or_else(|| AppError::NotFound("Private chat not found".into()))?
        .decode()
}

/// Chats the user created or was invited to, oldest first.
pub async fn chats_for_user(store: &dyn DocumentStore, uid: &str) -> AppResult<Vec<PrivateChat>> {
    let created = store
        .query(paths::PRIVATE_CHATS, &Query::new().where_eq("creator", uid))
        .await?;
    let invited = store
        .query(
            paths::PRIVATE_CHATS,
            &Query::new().array_contains("invitedUsers", uid),
        )
        .await?;

    let mut by_id = BTreeMap::new();
    for doc in created.into_iter().chain(invited) {
        let chat: PrivateChat = doc.decode()?;
        by_id.insert(chat.id.clone(), chat);
    }
    let mut chats: Vec<PrivateChat> = by_id.into_values().collect();
    chats.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Ok(chats)
}

/// Creator first, then invitees in invite order. Missing profiles are skipped.
pub async fn chat_members(store: &dyn DocumentStore, chat_id: &str) -> AppResult<Vec<User>> {
    let chat = get_chat(store, chat_id).await?;
    let mut members = Vec::with_capacity(chat.invited_users.len() + 1);
    for uid in std::iter::once(&chat.creator).chain(chat.invited_users.iter()) {
        if let Some(user) = users::load_user(store, uid).await? {
            members.push(user);
        }
    }
    Ok(members)
}

pub async fn chat_video_url(store: &dyn DocumentStore, chat_id: &str) -> AppResult<Option<String>> {
    let chat = get_chat(store, chat_id).await?;
    Ok((!chat.url.is_empty()).then_some(chat.url))
}

/// Video id of the livestream a private chat was created for, if its URL
/// is recognisable.
pub async fn resolve_chat_video(
    store: &dyn DocumentStore,
    chat_id: &str,
) -> AppResult<Option<String>> {
    Ok(chat_video_url(store, chat_id)
        .await?
        .as_deref()
        .and_then(extract_video_id))
}

pub async fn chat_name(store: &dyn DocumentStore, chat_id: &str) -> AppResult<String> {
    Ok(get_chat(store, chat_id).await?.name)
}
