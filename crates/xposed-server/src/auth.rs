//! Request authentication.
//!
//! Verifies the identity provider's bearer token, records the principal in
//! the local user directory, and exposes the result as axum extractors:
//! [`AuthUser`] (any principal), [`AdminUser`] (role `admin`) and
//! [`MaybeUser`] (anonymous allowed).

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use chrono::Utc;
use tracing::debug;

use xposed_shared::identity::{verify_principal_token, Principal};
use xposed_store::User;

use crate::error::ServerError;
use crate::state::AppState;

pub struct AuthUser(pub Principal);

pub struct AdminUser(pub Principal);

pub struct MaybeUser(pub Option<Principal>);

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok())?;
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth).trim();
    (!token.is_empty()).then_some(token)
}

/// Verify the bearer token, if any. A present but invalid token is an error.
async fn authenticate(headers: &HeaderMap, state: &AppState) -> Result<Option<Principal>, ServerError> {
    let Some(token) = bearer_token(headers) else {
        return Ok(None);
    };

    let now = Utc::now();
    let principal = verify_principal_token(token, &state.config.identity_pubkey, now)
        .map_err(|e| {
            debug!(error = %e, "Rejected principal token");
            ServerError::InvalidToken(e)
        })?;

    let user = User {
        id: principal.user_id,
        role: principal.role,
        name: principal.name.clone(),
        email: principal.email.clone(),
        subscription_status: principal.subscription_status,
        subscription_expiry: principal.subscription_expiry,
        last_seen_at: now,
    };
    state.db.lock().await.upsert_user(&user)?;

    Ok(Some(principal))
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(&parts.headers, state)
            .await?
            .map(AuthUser)
            .ok_or(ServerError::Unauthenticated)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let principal = authenticate(&parts.headers, state)
            .await?
            .ok_or(ServerError::Unauthenticated)?;
        if !principal.is_admin() {
            return Err(ServerError::Forbidden("Admin role required".into()));
        }
        Ok(AdminUser(principal))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(authenticate(&parts.headers, state).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert("authorization", HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("abc.def"));
        assert_eq!(bearer_token(&headers), Some("abc.def"));

        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }
}
