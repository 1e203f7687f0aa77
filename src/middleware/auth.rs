use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::{validate_identity_token, IdentityClaims};
use crate::errors::AppError;
use crate::AppState;

/// Extractor that validates the identity token and provides the caller.
/// Use in handler signatures: `AuthUser(claims): AuthUser`
#[derive(Debug, Clone)]
pub struct AuthUser(pub IdentityClaims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::AuthError("Missing authorization header".into()))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or(AppError::AuthError("Invalid authorization format".into()))?;

        let claims = validate_identity_token(token, &state.config)?;
        Ok(AuthUser(claims))
    }
}

/// Like [`AuthUser`] but only admits configured admins.
#[derive(Debug, Clone)]
pub struct AdminUser(pub IdentityClaims);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(claims) = AuthUser::from_request_parts(parts, state).await?;
        if !state.config.is_admin(&claims.sub) {
            return Err(AppError::Forbidden("Admin only".into()));
        }
        Ok(AdminUser(claims))
    }
}
