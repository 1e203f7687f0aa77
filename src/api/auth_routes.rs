use axum::{extract::State, Json};

use crate::errors::AppResult;
use crate::middleware::AuthUser;
use crate::models::User;
use crate::users;
use crate::AppState;

/// POST /api/v1/auth/session
/// Exchange a provider identity token for the user's profile, creating the
/// profile on first sign-in.
pub async fn create_session(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> AppResult<Json<User>> {
    let user = users::sign_in(state.store.as_ref(), &claims.identity()).await?;
    Ok(Json(user))
}
