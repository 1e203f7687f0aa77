use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;
use crate::errors::{AppError, AppResult};
use crate::models::FederatedIdentity;

// ─── Identity token claims ─────────────────────────────

/// Claims of the ID token minted by the federated identity provider.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityClaims {
    pub sub: String, // provider uid
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
    pub exp: usize,
}

impl IdentityClaims {
    /// Fall back to the email's local part, then the uid, for accounts
    /// without a display name.
    pub fn identity(&self) -> FederatedIdentity {
        let display_name = self
            .name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .or_else(|| {
                self.email
                    .as_deref()
                    .and_then(|e| e.split('@').next())
                    .map(String::from)
            })
            .unwrap_or_else(|| self.sub.clone());
        FederatedIdentity {
            uid: self.sub.clone(),
            display_name,
            email: self.email.clone(),
            photo_url: self.picture.clone(),
        }
    }
}

// ─── Token handling ────────────────────────────────────

/// Validate an identity token and extract its claims.
pub fn validate_identity_token(token: &str, config: &AppConfig) -> AppResult<IdentityClaims> {
    let token_data = decode::<IdentityClaims>(
        token,
        &DecodingKey::from_secret(config.identity_jwt_secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::TokenExpired,
        _ => AppError::InvalidToken,
    })?;

    if token_data.claims.sub.is_empty() || token_data.claims.sub.contains('/') {
        return Err(AppError::InvalidToken);
    }
    Ok(token_data.claims)
}

/// Mint an identity token with the shared secret. Used by local tooling
/// and tests standing in for the provider.
pub fn issue_identity_token(
    identity: &FederatedIdentity,
    ttl: Duration,
    config: &AppConfig,
) -> AppResult<String> {
    let claims = IdentityClaims {
        sub: identity.uid.clone(),
        name: Some(identity.display_name.clone()),
        email: identity.email.clone(),
        picture: identity.photo_url.clone(),
        exp: (Utc::now() + ttl).timestamp().max(0) as usize,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.identity_jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT encoding failed: {}", e)))
}
