use chrono::Utc;
use serde_json::{json, Map, Value};

use crate::errors::{AppError, AppResult};
use crate::models::{FederatedIdentity, User};
use crate::storage::{content_type_for, profile_photo_key, Storage};
use crate::store::{paths, DocumentStore, Query};

pub const MAX_DISPLAY_NAME_LEN: usize = 32;

pub async fn load_user(store: &dyn DocumentStore, uid: &str) -> AppResult<Option<User>> {
    paths::check_id(uid)?;
    let Some(doc) = store.get(&paths::user(uid)).await? else {
        return Ok(None);
    };
    let mut user: User = doc.decode()?;
    if user.uid.is_empty() {
        user.uid = doc.id;
    }
    Ok(Some(user))
}

pub async fn fetch_user(store: &dyn DocumentStore, uid: &str) -> AppResult<User> {
    load_user(store, uid).await?.ok_or(AppError::UserNotFound)
}

pub async fn list_users(store: &dyn DocumentStore) -> AppResult<Vec<User>> {
    let docs = store.query(paths::USERS, &Query::new()).await?;
    let mut users = Vec::with_capacity(docs.len());
    for doc in docs {
        match doc.decode::<User>() {
            Ok(mut user) => {
                if user.uid.is_empty() {
                    user.uid = doc.id;
                }
                users.push(user);
            }
            Err(e) => tracing::warn!(uid = %doc.id, "Skipping malformed user document: {}", e),
        }
    }
    Ok(users)
}

/// Return the stored profile, creating it from the identity provider's
/// account details on first sign-in.
pub async fn sign_in(store: &dyn DocumentStore, identity: &FederatedIdentity) -> AppResult<User> {
    if let Some(mut existing) = load_user(store, &identity.uid).await? {
        if existing.email.is_none() {
            existing.email = identity.email.clone();
        }
        tracing::debug!(uid = %identity.uid, "Returning user signed in");
        return Ok(existing);
    }

    let user = User {
        uid: identity.uid.clone(),
        username: identity.display_name.clone(),
        display_name: Some(identity.display_name.clone()),
        photo_url: identity.photo_url.clone(),
        profile_picture: identity.photo_url.clone(),
        email: identity.email.clone(),
    };

    let mut data = serde_json::to_value(&user)?;
    if let Value::Object(map) = &mut data {
        map.insert("createdAt".into(), json!(Utc::now().to_rfc3339()));
    }
    store.set(&paths::user(&user.uid), data, true).await?;

    tracing::info!(uid = %user.uid, "New user profile created");
    Ok(user)
}

pub async fn reset_display_name(
    store: &dyn DocumentStore,
    uid: &str,
    display_name: &str,
) -> AppResult<User> {
    let name = display_name.trim();
    let len = name.chars().count();
    if len == 0 || len > MAX_DISPLAY_NAME_LEN {
        return Err(AppError::Validation(format!(
            "Display name must be 1-{MAX_DISPLAY_NAME_LEN} characters"
        )));
    }

    let mut fields = Map::new();
    fields.insert("displayName".into(), json!(name));
    update_profile(store, uid, fields).await
}

/// Point `photoURL` at `url`, or back at the identity provider's picture
/// when no URL is given.
pub async fn reset_photo(store: &dyn DocumentStore, uid: &str, url: Option<&str>) -> AppResult<User> {
    let photo = match url.map(str::trim) {
        Some(url) if !url.is_empty() => json!(url),
        _ => json!(fetch_user(store, uid).await?.profile_picture),
    };
    let mut fields = Map::new();
    fields.insert("photoURL".into(), photo);
    update_profile(store, uid, fields).await
}

/// Upload a new profile photo and point `photoURL` at it.
pub async fn upload_profile_photo(
    store: &dyn DocumentStore,
    storage: &Storage,
    uid: &str,
    file_name: &str,
    data: &[u8],
) -> AppResult<User> {
    if data.is_empty() {
        return Err(AppError::Validation("Photo is empty".into()));
    }
    // Make sure the profile exists before writing to storage.
    fetch_user(store, uid).await?;

    let url = storage
        .upload(&profile_photo_key(uid), data, content_type_for(file_name))
        .await?;

    let mut fields = Map::new();
    fields.insert("photoURL".into(), json!(url));
    update_profile(store, uid, fields).await
}

async fn update_profile(
    store: &dyn DocumentStore,
    uid: &str,
    fields: Map<String, Value>,
) -> AppResult<User> {
    match store.update(&paths::user(uid), fields).await {
        Err(AppError::NotFound(_)) => return Err(AppError::UserNotFound),
        other => other?,
    }
    fetch_user(store, uid).await
}
