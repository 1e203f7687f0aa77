use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    Json,
};
use validator::Validate;

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::{validation_error, DisplayNameRequest, PhotoUploadQuery, PhotoUrlRequest, User};
use crate::users;
use crate::AppState;

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
) -> AppResult<Json<Vec<User>>> {
    Ok(Json(users::list_users(state.store.as_ref()).await?))
}

/// GET /api/v1/users/:uid
pub async fn get_user(
    State(state): State<AppState>,
    AuthUser(_claims): AuthUser,
    Path(uid): Path<String>,
) -> AppResult<Json<User>> {
    Ok(Json(users::fetch_user(state.store.as_ref(), &uid).await?))
}

/// PUT /api/v1/users/@me/display-name
pub async fn update_display_name(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<DisplayNameRequest>,
) -> AppResult<Json<User>> {
    req.validate().map_err(validation_error)?;
    let user = users::reset_display_name(state.store.as_ref(), &claims.sub, &req.display_name).await?;
    state.authors.invalidate(&claims.sub);
    Ok(Json(user))
}

/// PUT /api/v1/users/@me/photo
/// Point the profile photo at a URL, or restore the provider's picture.
pub async fn set_photo(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Json(req): Json<PhotoUrlRequest>,
) -> AppResult<Json<User>> {
    let user = users::reset_photo(state.store.as_ref(), &claims.sub, req.url.as_deref()).await?;
    state.authors.invalidate(&claims.sub);
    Ok(Json(user))
}

/// POST /api/v1/users/@me/photo?file_name=me.png
/// Raw image bytes in the body.
pub async fn upload_photo(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<PhotoUploadQuery>,
    body: Bytes,
) -> AppResult<Json<User>> {
    let user = users::upload_profile_photo(
        state.store.as_ref(),
        &state.storage,
        &claims.sub,
        &query.file_name,
        &body,
    )
    .await?;
    state.authors.invalidate(&claims.sub);
    Ok(Json(user))
}
