use lectern_core::error::CoreError;

use crate::store::StoreError;

/// Error type for token authority operations.
///
/// Wraps [`CoreError`] for domain outcomes (not found, unauthorized,
/// validation) and adds infrastructure variants. Storage failures are never
/// retried here; they surface to the caller as-is.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// A domain-level error from `lectern_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The token store or user directory could not complete the call.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] StoreError),

    /// Signing a session token failed.
    #[error("Token signing error: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    /// Hashing or parsing a password hash failed.
    #[error("Password hashing error: {0}")]
    PasswordHash(String),
}

/// Convenience alias for authority results.
pub type AuthResult<T> = Result<T, AuthError>;

impl AuthError {
    /// `true` for lookup misses. These are expected outcomes, not faults.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuthError::Core(CoreError::NotFound { .. }))
    }

    /// `true` when the caller should be answered with an authentication
    /// failure rather than a server error.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            AuthError::Core(CoreError::NotFound { .. } | CoreError::Unauthorized(_))
        )
    }

    pub(crate) fn unauthorized(msg: &str) -> Self {
        AuthError::Core(CoreError::Unauthorized(msg.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_an_authentication_failure() {
        let err = AuthError::from(CoreError::not_found("token", "abc123"));
        assert!(err.is_not_found());
        assert!(err.is_authentication_failure());
    }

    #[test]
    fn storage_failure_is_not_an_authentication_failure() {
        let err = AuthError::from(StoreError::Unavailable("connection refused".into()));
        assert!(!err.is_not_found());
        assert!(!err.is_authentication_failure());
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn forbidden_is_not_an_authentication_failure() {
        let err = AuthError::from(CoreError::Forbidden("inactive".into()));
        assert!(!err.is_authentication_failure());
    }
}
