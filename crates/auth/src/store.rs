//! Storage seams of the token authority.
//!
//! [`UserDirectory`] resolves and updates user accounts; [`TokenStore`]
//! persists token rows. Both are implemented by [`crate::pg::PgStore`] and
//! [`crate::memory::MemoryStore`]. Every multi-row update is a single atomic
//! operation in the backend.

use async_trait::async_trait;
use lectern_core::tokens::TokenPurpose;
use lectern_core::types::{DbId, Timestamp};
use lectern_db::models::token::{CreateToken, Token};
use lectern_db::models::user::User;

/// Failure reported by a store backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A unique constraint rejected the write. Carries the constraint name.
    #[error("Duplicate value violates unique constraint: {0}")]
    Duplicate(String),

    /// A foreign key pointed at a row that does not exist.
    #[error("Referenced row does not exist: {0}")]
    MissingReference(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn find_user_by_id(&self, id: DbId) -> StoreResult<Option<User>>;

    /// Mark the account active. Returns `true` if it was inactive before.
    async fn activate_user(&self, id: DbId) -> StoreResult<bool>;

    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool>;

    /// Remove the user's 2FA secret.
    async fn clear_two_factor(&self, id: DbId) -> StoreResult<bool>;
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Insert a new active token. A clashing token string yields
    /// [`StoreError::Duplicate`].
    async fn insert_token(&self, input: &CreateToken) -> StoreResult<Token>;

    /// Exact-string lookup, whatever the token's flags.
    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>>;

    async fn token_exists(&self, token: &str) -> StoreResult<bool>;

    /// Owner of the token, resolved without materialising the token row.
    async fn find_token_owner(&self, token: &str) -> StoreResult<Option<User>>;

    /// The owner's tokens with `revoked = false AND expired = false`.
    async fn list_active_tokens(&self, email: &str) -> StoreResult<Vec<Token>>;

    /// Every token the user has held, newest first.
    async fn list_user_tokens(&self, user_id: DbId) -> StoreResult<Vec<Token>>;

    /// Atomically set `revoked = expired = true` on the owner's tokens whose
    /// purpose is in `purposes`. Returns the number of matched rows,
    /// including rows that were already revoked.
    async fn revoke_tokens(&self, email: &str, purposes: &[TokenPurpose]) -> StoreResult<u64>;

    /// Atomically revoke and expire `token` if it is a usable token of
    /// `purpose` at `now`, returning the row as it is after the update.
    /// Returns `None` when nothing matched, so of several concurrent callers
    /// at most one gets the token.
    async fn consume_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now: Timestamp,
    ) -> StoreResult<Option<Token>>;

    /// Set `expired = true` on every unexpired token whose deadline is at or
    /// before `now`. Returns the number of rows that changed.
    async fn expire_tokens_before(&self, now: Timestamp) -> StoreResult<u64>;
}
