//! Token purposes, the derived token lifecycle state, and opaque token generation.
//!
//! A persisted token carries two independent monotonic flags, `expired` and
//! `revoked`. [`TokenState`] names the four combinations and only exposes
//! transitions that move towards [`TokenState::ExpiredAndRevoked`].

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::{LookupId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Length of a generated action-token string (alphanumeric characters).
pub const ACTION_TOKEN_LENGTH: usize = 48;

/// Number of leading characters that may appear in logs and error messages.
pub const TOKEN_HINT_LENGTH: usize = 6;

// ---------------------------------------------------------------------------
// Purpose
// ---------------------------------------------------------------------------

/// What a token may be used for. Immutable once the token is created.
///
/// Discriminants match the `token_purposes` seed data.
#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenPurpose {
    Access = 1,
    Refresh = 2,
    AccountActivation = 3,
    #[serde(rename = "RESET_2FA")]
    Reset2fa = 4,
    ResetPassword = 5,
}

impl TokenPurpose {
    /// Every purpose, in id order.
    pub const ALL: [TokenPurpose; 5] = [
        Self::Access,
        Self::Refresh,
        Self::AccountActivation,
        Self::Reset2fa,
        Self::ResetPassword,
    ];

    /// Purposes that make up a login session.
    pub const SESSION: [TokenPurpose; 2] = [Self::Access, Self::Refresh];

    /// Return the database lookup id.
    pub fn id(self) -> LookupId {
        self as LookupId
    }

    /// Parse from the `token_purposes.id` column.
    pub fn from_id(id: LookupId) -> Result<Self, CoreError> {
        Self::ALL
            .into_iter()
            .find(|p| p.id() == id)
            .ok_or_else(|| CoreError::Validation(format!("Unknown token purpose id {id}")))
    }

    /// Database name value.
    pub fn name(self) -> &'static str {
        match self {
            Self::Access => "ACCESS",
            Self::Refresh => "REFRESH",
            Self::AccountActivation => "ACCOUNT_ACTIVATION",
            Self::Reset2fa => "RESET_2FA",
            Self::ResetPassword => "RESET_PASSWORD",
        }
    }

    /// `true` for `ACCESS` and `REFRESH`.
    pub fn is_session(self) -> bool {
        matches!(self, Self::Access | Self::Refresh)
    }

    /// `true` for the single-use account action purposes.
    pub fn is_action(self) -> bool {
        !self.is_session()
    }
}

impl std::fmt::Display for TokenPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Lifecycle state
// ---------------------------------------------------------------------------

/// Lifecycle state derived from the `(expired, revoked)` flag pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TokenState {
    Active,
    Expired,
    Revoked,
    ExpiredAndRevoked,
}

impl TokenState {
    pub fn from_flags(expired: bool, revoked: bool) -> Self {
        match (expired, revoked) {
            (false, false) => Self::Active,
            (true, false) => Self::Expired,
            (false, true) => Self::Revoked,
            (true, true) => Self::ExpiredAndRevoked,
        }
    }

    /// Derive the state at `now`, treating a passed deadline as expired even
    /// if the `expired` flag has not been flipped yet.
    pub fn at(
        expired: bool,
        revoked: bool,
        expires_at: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        let deadline_passed = expires_at.is_some_and(|deadline| deadline <= now);
        Self::from_flags(expired || deadline_passed, revoked)
    }

    /// The `(expired, revoked)` flags for this state.
    pub fn flags(self) -> (bool, bool) {
        match self {
            Self::Active => (false, false),
            Self::Expired => (true, false),
            Self::Revoked => (false, true),
            Self::ExpiredAndRevoked => (true, true),
        }
    }

    pub fn expire(self) -> Self {
        let (_, revoked) = self.flags();
        Self::from_flags(true, revoked)
    }

    pub fn revoke(self) -> Self {
        let (expired, _) = self.flags();
        Self::from_flags(expired, true)
    }

    pub fn is_usable(self) -> bool {
        self == Self::Active
    }
}

// ---------------------------------------------------------------------------
// Generation
// ---------------------------------------------------------------------------

/// Generate an opaque action-token string.
///
/// Uses the thread-local CSPRNG; 48 alphanumeric characters give roughly
/// 285 bits of entropy.
pub fn generate_action_token() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(ACTION_TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Short, log-safe prefix of a token string.
pub fn token_hint(token: &str) -> &str {
    let end = token
        .char_indices()
        .nth(TOKEN_HINT_LENGTH)
        .map_or(token.len(), |(i, _)| i);
    &token[..end]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
