//! HS256 session-token encoding and validation.
//!
//! `ACCESS` and `REFRESH` token strings are JWTs carrying [`Claims`]. The
//! signature lets a caller reject forged tokens without a store round trip;
//! the stored row stays authoritative for revocation and expiry.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use lectern_core::tokens::TokenPurpose;
use lectern_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AuthConfig;

/// JWT claims embedded in every session token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject -- the user's internal database id.
    pub sub: DbId,
    /// The user's role name (e.g. `"teacher"`).
    pub role: String,
    pub purpose: TokenPurpose,
    /// Expiration time (UTC Unix timestamp).
    pub exp: i64,
    /// Issued-at time (UTC Unix timestamp).
    pub iat: i64,
    /// Unique token identifier (UUID v4). Makes every encoded string distinct.
    pub jti: String,
}

/// Encode a session token for `user_id`.
pub fn encode_session_token(
    user_id: DbId,
    role: &str,
    purpose: TokenPurpose,
    issued_at: Timestamp,
    expires_at: Timestamp,
    config: &AuthConfig,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id,
        role: role.to_string(),
        purpose,
        exp: expires_at.timestamp(),
        iat: issued_at.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
}

/// Validate and decode a session token, returning the embedded [`Claims`].
///
/// Validates the signature and `exp` automatically. Does not consult the
/// store, so a revoked token still decodes here.
pub fn validate_token(
    token: &str,
    config: &AuthConfig,
) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        // HS256; `exp` is checked against the wall clock with a 60s leeway,
        // not against the authority's injected `Clock`. The stored deadline
        // checked through that `Clock` stays the deciding expiry check.
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}
