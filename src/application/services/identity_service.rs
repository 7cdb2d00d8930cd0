//! Bearer identity verification (HS256 JWT).
//!
//! The request context only carries a user id that was proven by a valid
//! signature. Verification is best-effort from the caller's perspective: any
//! failure simply means the request is anonymous.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use serde_json::Value;

use crate::infrastructure::metrics;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("identity verification is not configured")]
    Disabled,
    #[error("malformed token")]
    Malformed,
    #[error("unsupported algorithm")]
    UnsupportedAlgorithm,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token has no subject claim")]
    MissingSubject,
}

/// Identity proven by a verified token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: String,
    pub role: Option<String>,
}

/// Claims read from a verified token. `exp` is checked by the decoder.
#[derive(Deserialize)]
struct Claims {
    sub: Option<Value>,
    #[serde(rename = "userId")]
    user_id: Option<Value>,
    id: Option<Value>,
    role: Option<String>,
}

fn claim_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub struct IdentityService {
    key: Option<DecodingKey>,
    validation: Validation,
}

impl IdentityService {
    /// `secret` is the shared HS256 key; `None` disables verification.
    ///
    /// Only HS256 is accepted. `exp` is optional but enforced when present,
    /// with the decoder's default leeway.
    pub fn new(secret: Option<String>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&[] as &[&str]);

        Self {
            key: secret
                .filter(|s| !s.is_empty())
                .map(|s| DecodingKey::from_secret(s.as_bytes())),
            validation,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.key.is_some()
    }

    /// Verifies `token` and extracts the user id from `sub`, `userId` or `id`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentityError`] when verification is disabled, the token is
    /// malformed, signed with another algorithm or key, or expired.
    pub fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let result = self.verify_inner(token);
        metrics::record_token_validation(result.is_ok());
        result
    }

    fn verify_inner(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        let key = self.key.as_ref().ok_or(IdentityError::Disabled)?;

        let claims = decode::<Claims>(token, key, &self.validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => IdentityError::InvalidSignature,
                ErrorKind::ExpiredSignature => IdentityError::Expired,
                ErrorKind::InvalidAlgorithm => IdentityError::UnsupportedAlgorithm,
                _ => IdentityError::Malformed,
            })?
            .claims;

        let user_id = [claims.sub, claims.user_id, claims.id]
            .into_iter()
            .flatten()
            .find_map(claim_to_string)
            .ok_or(IdentityError::MissingSubject)?;

        Ok(VerifiedIdentity {
            user_id,
            role: claims.role,
        })
    }
}
