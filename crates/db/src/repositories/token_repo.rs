//! Repository for the `tokens` table.
//!
//! Rows are never deleted here. Revocation and expiry are flag flips, and a
//! trigger rejects any update that would clear a flag.

use lectern_core::tokens::TokenPurpose;
use lectern_core::types::{DbId, LookupId, Timestamp};
use sqlx::PgPool;

use crate::models::token::{CreateToken, Token};
use crate::models::user::User;
use crate::repositories::user_repo;

/// Column list shared across queries to avoid repetition.
const COLUMNS: &str = "id, token, purpose_id, expired, revoked, user_id, expires_at, \
                        created_at, updated_at";

/// Provides insert, lookup and bulk flag updates for tokens.
pub struct TokenRepo;

impl TokenRepo {
    /// Insert a new active token, returning the created row.
    pub async fn create(pool: &PgPool, input: &CreateToken) -> Result<Token, sqlx::Error> {
        let query = format!(
            "INSERT INTO tokens (token, purpose_id, user_id, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Token>(&query)
            .bind(&input.token)
            .bind(input.purpose.id())
            .bind(input.user_id)
            .bind(input.expires_at)
            .fetch_one(pool)
            .await
    }

    /// Find a token by its exact string, whatever its flags.
    pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Token>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM tokens WHERE token = $1");
        sqlx::query_as::<_, Token>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists_by_token(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM tokens WHERE token = $1)")
                .bind(token)
                .fetch_one(pool)
                .await?;
        Ok(exists)
    }

    /// Resolve the owner of a token without loading the token row.
    pub async fn find_user_by_token(
        pool: &PgPool,
        token: &str,
    ) -> Result<Option<User>, sqlx::Error> {
        let query = format!(
            "SELECT {} FROM users
             WHERE id = (SELECT user_id FROM tokens WHERE token = $1)",
            user_repo::COLUMNS
        );
        sqlx::query_as::<_, User>(&query)
            .bind(token)
            .fetch_optional(pool)
            .await
    }

    /// List a user's tokens with both flags still `false`.
    ///
    /// Deadlines are not checked here; callers compare `expires_at` against
    /// their clock.
    pub async fn list_active_by_email(
        pool: &PgPool,
        email: &str,
    ) -> Result<Vec<Token>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tokens
             WHERE user_id = (SELECT id FROM users WHERE email = $1)
               AND revoked = false
               AND expired = false"
        );
        sqlx::query_as::<_, Token>(&query)
            .bind(email)
            .fetch_all(pool)
            .await
    }

    /// List every token a user has ever held, newest first.
    pub async fn list_by_user(pool: &PgPool, user_id: DbId) -> Result<Vec<Token>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM tokens WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        );
        sqlx::query_as::<_, Token>(&query)
            .bind(user_id)
            .fetch_all(pool)
            .await
    }

    /// Set `revoked = true, expired = true` on every token of the user whose
    /// purpose is in `purposes`, in a single statement.
    ///
    /// Returns the number of rows matched, which includes rows that were
    /// already revoked.
    pub async fn revoke_by_email_and_purposes(
        pool: &PgPool,
        email: &str,
        purposes: &[TokenPurpose],
    ) -> Result<u64, sqlx::Error> {
        let purpose_ids: Vec<LookupId> = purposes.iter().map(|p| p.id()).collect();
        let result = sqlx::query(
            "UPDATE tokens SET revoked = true, expired = true
             WHERE user_id = (SELECT id FROM users WHERE email = $1)
               AND purpose_id = ANY($2)",
        )
        .bind(email)
        .bind(&purpose_ids)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Revoke and expire one usable token of `purpose` in a single statement,
    /// returning the updated row.
    ///
    /// Concurrent callers race on the row lock; the losers see the flags
    /// already set and get `None`.
    pub async fn consume(
        pool: &PgPool,
        token: &str,
        purpose: TokenPurpose,
        now: Timestamp,
    ) -> Result<Option<Token>, sqlx::Error> {
        let query = format!(
            "UPDATE tokens SET revoked = true, expired = true
             WHERE token = $1
               AND purpose_id = $2
               AND revoked = false
               AND expired = false
               AND (expires_at IS NULL OR expires_at > $3)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Token>(&query)
            .bind(token)
            .bind(purpose.id())
            .bind(now)
            .fetch_optional(pool)
            .await
    }

    /// Flip `expired = true` on every token whose deadline is at or before
    /// `now`. Returns the number of rows that changed.
    pub async fn expire_due(pool: &PgPool, now: Timestamp) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tokens SET expired = true
             WHERE expired = false
               AND expires_at IS NOT NULL
               AND expires_at <= $1",
        )
        .bind(now)
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }
}
