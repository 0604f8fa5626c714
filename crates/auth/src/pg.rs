//! PostgreSQL store backend.
//!
//! Thin delegation to [`TokenRepo`] and [`UserRepo`]. Each call checks a
//! connection out of the pool for one statement and returns it afterwards.

use async_trait::async_trait;
use lectern_core::tokens::TokenPurpose;
use lectern_core::types::{DbId, Timestamp};
use lectern_db::models::token::{CreateToken, Token};
use lectern_db::models::user::User;
use lectern_db::repositories::{TokenRepo, UserRepo};
use lectern_db::DbPool;

use crate::store::{StoreError, StoreResult, TokenStore, UserDirectory};

/// PostgreSQL error code for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";
/// PostgreSQL error code for foreign key violations.
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Store backed by a PostgreSQL pool. Cheap to clone.
#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// Map constraint violations on insert to their [`StoreError`] variants,
/// anything else to [`StoreError::Database`].
fn classify(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        let constraint = db_err.constraint().unwrap_or("unknown").to_string();
        match db_err.code().as_deref() {
            Some(UNIQUE_VIOLATION) => return StoreError::Duplicate(constraint),
            Some(FOREIGN_KEY_VIOLATION) => return StoreError::MissingReference(constraint),
            _ => {}
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_email(&self.pool, email).await?)
    }

    async fn find_user_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        Ok(UserRepo::find_by_id(&self.pool, id).await?)
    }

    async fn activate_user(&self, id: DbId) -> StoreResult<bool> {
        Ok(UserRepo::activate(&self.pool, id).await?)
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool> {
        Ok(UserRepo::update_password(&self.pool, id, password_hash).await?)
    }

    async fn clear_two_factor(&self, id: DbId) -> StoreResult<bool> {
        Ok(UserRepo::clear_two_factor(&self.pool, id).await?)
    }
}

#[async_trait]
impl TokenStore for PgStore {
    async fn insert_token(&self, input: &CreateToken) -> StoreResult<Token> {
        TokenRepo::create(&self.pool, input).await.map_err(classify)
    }

    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>> {
        Ok(TokenRepo::find_by_token(&self.pool, token).await?)
    }

    async fn token_exists(&self, token: &str) -> StoreResult<bool> {
        Ok(TokenRepo::exists_by_token(&self.pool, token).await?)
    }

    async fn find_token_owner(&self, token: &str) -> StoreResult<Option<User>> {
        Ok(TokenRepo::find_user_by_token(&self.pool, token).await?)
    }

    async fn list_active_tokens(&self, email: &str) -> StoreResult<Vec<Token>> {
        Ok(TokenRepo::list_active_by_email(&self.pool, email).await?)
    }

    async fn list_user_tokens(&self, user_id: DbId) -> StoreResult<Vec<Token>> {
        Ok(TokenRepo::list_by_user(&self.pool, user_id).await?)
    }

    async fn revoke_tokens(&self, email: &str, purposes: &[TokenPurpose]) -> StoreResult<u64> {
        Ok(TokenRepo::revoke_by_email_and_purposes(&self.pool, email, purposes).await?)
    }

    async fn consume_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now: Timestamp,
    ) -> StoreResult<Option<Token>> {
        Ok(TokenRepo::consume(&self.pool, token, purpose, now).await?)
    }

    async fn expire_tokens_before(&self, now: Timestamp) -> StoreResult<u64> {
        Ok(TokenRepo::expire_due(&self.pool, now).await?)
    }
}
