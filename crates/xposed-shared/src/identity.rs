//! Principals issued by the identity provider.
//!
//! The provider signs a JSON claim set with its Ed25519 key and hands the
//! client a bearer token of the form `base64url(claims).base64url(signature)`.
//! The server verifies the signature over the raw claim bytes, checks the
//! expiry, and then trusts the principal as given.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdentityError;
use crate::types::{Role, SubscriptionStatus};

/// An authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: Uuid,
    pub role: Role,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    pub subscription_status: SubscriptionStatus,
    #[serde(default)]
    pub subscription_expiry: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Entitlement gate for subscriber-only features.
    pub fn has_active_subscription(&self, now: DateTime<Utc>) -> bool {
        self.subscription_status == SubscriptionStatus::Active
            && self.subscription_expiry.map(|exp| exp > now).unwrap_or(false)
    }
}

/// Signed claim set carried in the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrincipalClaims {
    #[serde(flatten)]
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Sign `claims` with the provider key and encode the bearer token.
pub fn issue_principal_token(
    claims: &PrincipalClaims,
    provider_key: &SigningKey,
) -> Result<String, IdentityError> {
    let claim_bytes = serde_json::to_vec(claims)?;
    let signature = provider_key.sign(&claim_bytes);
    Ok(format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(&claim_bytes),
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Verify a bearer token against the provider's public key.
pub fn verify_principal_token(
    token: &str,
    provider_pubkey: &[u8; 32],
    now: DateTime<Utc>,
) -> Result<Principal, IdentityError> {
    let (claims_b64, sig_b64) = token
        .trim()
        .split_once('.')
        .ok_or(IdentityError::InvalidFormat)?;

    let claim_bytes = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| IdentityError::InvalidFormat)?;
    let sig_bytes = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| IdentityError::InvalidFormat)?;

    let verifying_key =
        VerifyingKey::from_bytes(provider_pubkey).map_err(|_| IdentityError::InvalidKey)?;
    let signature =
        Signature::from_slice(&sig_bytes).map_err(|_| IdentityError::InvalidSignature)?;
    verifying_key
        .verify(&claim_bytes, &signature)
        .map_err(|_| IdentityError::InvalidSignature)?;

    let claims: PrincipalClaims = serde_json::from_slice(&claim_bytes)?;
    if now > claims.expires_at {
        return Err(IdentityError::Expired);
    }
    Ok(claims.principal)
}
