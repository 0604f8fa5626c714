//! The token authority: issue, look up and revoke tokens by purpose.
//!
//! Revocation is a bulk flag flip scoped by owner email and purpose set. Rows
//! are never deleted, so revoked and expired tokens stay queryable through
//! [`TokenAuthority::history`].
//!
//! A token issued after a revoke call's scan is not caught by that call.
//! Callers that need issue and revoke to be linearisable for one user must
//! serialise them themselves.

use std::sync::Arc;

use lectern_core::clock::Clock;
use lectern_core::error::CoreError;
use lectern_core::tokens::{generate_action_token, token_hint, TokenPurpose, TokenState};
use lectern_core::types::Timestamp;
use lectern_db::models::token::{CreateToken, Token};
use lectern_db::models::user::User;

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::jwt;
use crate::store::{StoreError, TokenStore, UserDirectory};

/// How many fresh token strings `issue` tries before giving up on collisions.
const MAX_ISSUE_ATTEMPTS: usize = 3;

/// Issues, resolves and revokes tokens against an explicit store handle.
pub struct TokenAuthority<S> {
    store: S,
    clock: Arc<dyn Clock>,
    config: AuthConfig,
}

impl<S> TokenAuthority<S>
where
    S: TokenStore + UserDirectory,
{
    pub fn new(store: S, clock: Arc<dyn Clock>, config: AuthConfig) -> Self {
        Self {
            store,
            clock,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -----------------------------------------------------------------------
    // Issue
    // -----------------------------------------------------------------------

    /// Create and persist a new token of `purpose` owned by `user`.
    ///
    /// A user may hold any number of concurrent tokens of one purpose. Only
    /// the token string is unique.
    pub async fn issue(&self, user: &User, purpose: TokenPurpose) -> AuthResult<Token> {
        let issued_at = self.clock.now();
        let expires_at = issued_at + self.config.ttl(purpose);

        for attempt in 1..=MAX_ISSUE_ATTEMPTS {
            let value = self.generate(user, purpose, issued_at, expires_at)?;
            if self.store.token_exists(&value).await? {
                tracing::warn!(attempt, %purpose, "Generated token string already exists");
                continue;
            }

            let input = CreateToken {
                user_id: user.id,
                token: value,
                purpose,
                expires_at: Some(expires_at),
            };
            match self.store.insert_token(&input).await {
                Ok(token) => {
                    tracing::info!(
                        token_id = token.id,
                        user_id = user.id,
                        %purpose,
                        expires_at = %expires_at,
                        "Token issued"
                    );
                    return Ok(token);
                }
                Err(StoreError::Duplicate(constraint)) => {
                    tracing::warn!(attempt, %purpose, %constraint, "Token insert collided");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(CoreError::Conflict(format!(
            "Could not generate a unique {purpose} token after {MAX_ISSUE_ATTEMPTS} attempts"
        ))
        .into())
    }

    /// Resolve the owner by email, then [`issue`](Self::issue).
    pub async fn issue_for_email(&self, email: &str, purpose: TokenPurpose) -> AuthResult<Token> {
        let user = self.require_user(email).await?;
        self.issue(&user, purpose).await
    }

    fn generate(
        &self,
        user: &User,
        purpose: TokenPurpose,
        issued_at: Timestamp,
        expires_at: Timestamp,
    ) -> AuthResult<String> {
        if purpose.is_session() {
            Ok(jwt::encode_session_token(
                user.id,
                user.role.name(),
                purpose,
                issued_at,
                expires_at,
                &self.config,
            )?)
        } else {
            Ok(generate_action_token())
        }
    }

    // -----------------------------------------------------------------------
    // Lookup
    // -----------------------------------------------------------------------

    /// Raw lookup by exact token string.
    ///
    /// Does not filter on flags or deadline: check [`is_usable`](Self::is_usable)
    /// or use [`require_usable`](Self::require_usable).
    pub async fn find_by_token(&self, token: &str) -> AuthResult<Token> {
        match self.store.find_token(token).await? {
            Some(found) => Ok(found),
            None => {
                tracing::debug!(hint = token_hint(token), "Token not found");
                Err(CoreError::not_found("token", token_hint(token)).into())
            }
        }
    }

    /// Owner of `token`, resolved without loading the token itself.
    pub async fn find_user_for(&self, token: &str) -> AuthResult<User> {
        match self.store.find_token_owner(token).await? {
            Some(user) => Ok(user),
            None => {
                tracing::debug!(hint = token_hint(token), "No owner for token");
                Err(CoreError::not_found("token owner", token_hint(token)).into())
            }
        }
    }

    /// Every usable token the user holds. Order is unspecified.
    ///
    /// An unknown email yields an empty list.
    pub async fn list_usable(&self, email: &str) -> AuthResult<Vec<Token>> {
        let now = self.clock.now();
        let tokens = self.store.list_active_tokens(email).await?;
        Ok(tokens.into_iter().filter(|t| t.is_usable_at(now)).collect())
    }

    /// Every token the user has ever held, revoked and expired included.
    pub async fn history(&self, email: &str) -> AuthResult<Vec<Token>> {
        let user = self.require_user(email).await?;
        Ok(self.store.list_user_tokens(user.id).await?)
    }

    /// Look up `token` and require it to be a usable token of `purpose`.
    ///
    /// Missing, wrong-purpose and unusable tokens all yield the same
    /// `Unauthorized` error so callers cannot tell which case applies.
    pub async fn require_usable(&self, token: &str, purpose: TokenPurpose) -> AuthResult<Token> {
        let found = match self.find_by_token(token).await {
            Ok(found) => found,
            Err(e) if e.is_not_found() => {
                return Err(AuthError::unauthorized("Invalid or expired token"))
            }
            Err(e) => return Err(e),
        };

        let state = self.state_of(&found);
        if found.purpose != purpose || !state.is_usable() {
            tracing::debug!(
                token_id = found.id,
                expected = %purpose,
                actual = %found.purpose,
                ?state,
                "Token rejected"
            );
            return Err(AuthError::unauthorized("Invalid or expired token"));
        }
        Ok(found)
    }

    /// Atomically take a usable token of `purpose` out of circulation.
    ///
    /// The token is revoked and expired in the same store operation that
    /// checks it, so concurrent callers presenting the same string cannot
    /// both succeed. Failures are reported like [`require_usable`](Self::require_usable).
    pub async fn consume(&self, token: &str, purpose: TokenPurpose) -> AuthResult<Token> {
        match self.store.consume_token(token, purpose, self.clock.now()).await? {
            Some(consumed) => {
                tracing::info!(token_id = consumed.id, %purpose, "Token consumed");
                Ok(consumed)
            }
            None => {
                tracing::debug!(hint = token_hint(token), %purpose, "Token not consumable");
                Err(AuthError::unauthorized("Invalid or expired token"))
            }
        }
    }

    /// Lifecycle state of `token` at the clock's current time.
    pub fn state_of(&self, token: &Token) -> TokenState {
        token.state_at(self.clock.now())
    }

    pub fn is_usable(&self, token: &Token) -> bool {
        self.state_of(token).is_usable()
    }

    // -----------------------------------------------------------------------
    // Revoke
    // -----------------------------------------------------------------------

    /// Revoke and expire every `ACCESS` and `REFRESH` token of the user.
    pub async fn revoke_session_tokens(&self, email: &str) -> AuthResult<u64> {
        self.revoke_by_purposes(email, &TokenPurpose::SESSION).await
    }

    /// Revoke and expire every token of the user with `purpose`.
    pub async fn revoke_by_purpose(&self, email: &str, purpose: TokenPurpose) -> AuthResult<u64> {
        self.revoke_by_purposes(email, &[purpose]).await
    }

    /// Revoke and expire every token of the user whose purpose is in
    /// `purposes`, atomically.
    ///
    /// The count is the number of matched tokens, including ones that were
    /// already revoked; it does not say how many changed state.
    pub async fn revoke_by_purposes(
        &self,
        email: &str,
        purposes: &[TokenPurpose],
    ) -> AuthResult<u64> {
        if purposes.is_empty() {
            return Ok(0);
        }

        let count = self.store.revoke_tokens(email, purposes).await?;
        tracing::info!(?purposes, count, "Tokens revoked");
        Ok(count)
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    pub(crate) async fn require_user(&self, email: &str) -> AuthResult<User> {
        match self.store.find_user_by_email(email).await? {
            Some(user) => Ok(user),
            None => {
                tracing::debug!("User not found by email");
                Err(CoreError::not_found("user", email).into())
            }
        }
    }
}
