use axum::{
    extract::{Path, Query, State},
    Json,
};

use crate::errors::AppResult;
use crate::invitations;
use crate::middleware::AuthUser;
use crate::models::{Invitation, InvitationQuery};
use crate::AppState;

/// GET /api/v1/invitations?status=pending
pub async fn list_invitations(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Query(query): Query<InvitationQuery>,
) -> AppResult<Json<Vec<Invitation>>> {
    let list = invitations::invitations_for(state.store.as_ref(), &claims.sub, query.status).await?;
    Ok(Json(list))
}

/// POST /api/v1/invitations/:invitation_id/accept
pub async fn accept(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(invitation_id): Path<String>,
) -> AppResult<Json<Invitation>> {
    let invitation =
        invitations::accept_invitation(state.store.as_ref(), &claims.sub, &invitation_id).await?;
    Ok(Json(invitation))
}

/// POST /api/v1/invitations/:invitation_id/reject
pub async fn reject(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(invitation_id): Path<String>,
) -> AppResult<Json<Invitation>> {
    let invitation =
        invitations::reject_invitation(state.store.as_ref(), &claims.sub, &invitation_id).await?;
    Ok(Json(invitation))
}
