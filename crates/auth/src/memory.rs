//! In-memory store backend.
//!
//! Mirrors the PostgreSQL semantics closely enough to run the authority
//! without a database: unique token strings and emails, flag-only updates,
//! and bulk revokes applied under a single lock acquisition so they are
//! all-or-nothing. Revoke counts include rows that were already revoked,
//! matching the row count PostgreSQL reports for an `UPDATE`.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use lectern_core::tokens::{TokenPurpose, TokenState};
use lectern_core::types::{DbId, Timestamp};
use lectern_db::models::token::{CreateToken, Token};
use lectern_db::models::user::{CreateUser, User};
use tokio::sync::Mutex;

use crate::store::{StoreError, StoreResult, TokenStore, UserDirectory};

#[derive(Default)]
struct MemoryData {
    users: Vec<User>,
    /// Insertion order doubles as creation order.
    tokens: Vec<Token>,
    next_user_id: DbId,
    next_token_id: DbId,
    /// When set, every call fails with [`StoreError::Unavailable`].
    unavailable: bool,
}

impl MemoryData {
    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email == email)
    }

    fn user_by_id_mut(&mut self, id: DbId) -> Option<&mut User> {
        self.users.iter_mut().find(|u| u.id == id)
    }
}

/// Write `state` back into the token's flags.
fn set_state(token: &mut Token, state: TokenState, at: Timestamp) {
    (token.expired, token.revoked) = state.flags();
    token.updated_at = at;
}

/// Process-local store. Clones share the same data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    data: Arc<Mutex<MemoryData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a user, rejecting a duplicate email like `uq_users_email` does.
    pub async fn insert_user(&self, input: &CreateUser) -> StoreResult<User> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        if data.user_by_email(&input.email).is_some() {
            return Err(StoreError::Duplicate("uq_users_email".into()));
        }

        data.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: data.next_user_id,
            email: input.email.clone(),
            first_name: input.first_name.clone(),
            last_name: input.last_name.clone(),
            password_hash: input.password_hash.clone(),
            role: input.role,
            is_active: input.is_active,
            two_factor_secret: None,
            created_at: now,
            updated_at: now,
        };
        data.users.push(user.clone());
        Ok(user)
    }

    pub async fn set_two_factor_secret(&self, id: DbId, secret: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        Ok(match data.user_by_id_mut(id) {
            Some(user) => {
                user.two_factor_secret = Some(secret.to_string());
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    /// Simulate an outage (or recovery) of the backing store.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.data.lock().await.unavailable = unavailable;
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.user_by_email(email).cloned())
    }

    async fn find_user_by_id(&self, id: DbId) -> StoreResult<Option<User>> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.users.iter().find(|u| u.id == id).cloned())
    }

    async fn activate_user(&self, id: DbId) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        Ok(match data.user_by_id_mut(id) {
            Some(user) if !user.is_active => {
                user.is_active = true;
                user.updated_at = Utc::now();
                true
            }
            _ => false,
        })
    }

    async fn update_password(&self, id: DbId, password_hash: &str) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        Ok(match data.user_by_id_mut(id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn clear_two_factor(&self, id: DbId) -> StoreResult<bool> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        Ok(match data.user_by_id_mut(id) {
            Some(user) => {
                user.two_factor_secret = None;
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl TokenStore for MemoryStore {
    async fn insert_token(&self, input: &CreateToken) -> StoreResult<Token> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        if !data.users.iter().any(|u| u.id == input.user_id) {
            return Err(StoreError::MissingReference(format!(
                "users.id = {}",
                input.user_id
            )));
        }
        if data.tokens.iter().any(|t| t.token == input.token) {
            return Err(StoreError::Duplicate("uq_tokens_token".into()));
        }

        data.next_token_id += 1;
        let now = Utc::now();
        let token = Token {
            id: data.next_token_id,
            token: input.token.clone(),
            purpose: input.purpose,
            expired: false,
            revoked: false,
            user_id: input.user_id,
            expires_at: input.expires_at,
            created_at: now,
            updated_at: now,
        };
        data.tokens.push(token.clone());
        Ok(token)
    }

    async fn find_token(&self, token: &str) -> StoreResult<Option<Token>> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.tokens.iter().find(|t| t.token == token).cloned())
    }

    async fn token_exists(&self, token: &str) -> StoreResult<bool> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data.tokens.iter().any(|t| t.token == token))
    }

    async fn find_token_owner(&self, token: &str) -> StoreResult<Option<User>> {
        let data = self.data.lock().await;
        data.check_available()?;
        let Some(owner_id) = data
            .tokens
            .iter()
            .find(|t| t.token == token)
            .map(|t| t.user_id)
        else {
            return Ok(None);
        };
        Ok(data.users.iter().find(|u| u.id == owner_id).cloned())
    }

    async fn list_active_tokens(&self, email: &str) -> StoreResult<Vec<Token>> {
        let data = self.data.lock().await;
        data.check_available()?;
        let Some(owner_id) = data.user_by_email(email).map(|u| u.id) else {
            return Ok(Vec::new());
        };
        Ok(data
            .tokens
            .iter()
            .filter(|t| t.user_id == owner_id && !t.revoked && !t.expired)
            .cloned()
            .collect())
    }

    async fn list_user_tokens(&self, user_id: DbId) -> StoreResult<Vec<Token>> {
        let data = self.data.lock().await;
        data.check_available()?;
        Ok(data
            .tokens
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn revoke_tokens(&self, email: &str, purposes: &[TokenPurpose]) -> StoreResult<u64> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let Some(owner_id) = data.user_by_email(email).map(|u| u.id) else {
            return Ok(0);
        };

        let now = Utc::now();
        let mut matched = 0;
        for token in data
            .tokens
            .iter_mut()
            .filter(|t| t.user_id == owner_id && purposes.contains(&t.purpose))
        {
            let next = token.state().revoke().expire();
            set_state(token, next, now);
            matched += 1;
        }
        Ok(matched)
    }

    async fn consume_token(
        &self,
        token: &str,
        purpose: TokenPurpose,
        now: Timestamp,
    ) -> StoreResult<Option<Token>> {
        let mut data = self.data.lock().await;
        data.check_available()?;
        let Some(found) = data
            .tokens
            .iter_mut()
            .find(|t| t.token == token && t.purpose == purpose && t.is_usable_at(now))
        else {
            return Ok(None);
        };

        let next = found.state().revoke().expire();
        set_state(found, next, Utc::now());
        Ok(Some(found.clone()))
    }

    async fn expire_tokens_before(&self, now: Timestamp) -> StoreResult<u64> {
        let mut data = self.data.lock().await;
        data.check_available()?;

        let updated_at = Utc::now();
        let mut changed = 0;
        for token in data
            .tokens
            .iter_mut()
            .filter(|t| !t.expired && t.expires_at.is_some_and(|deadline| deadline <= now))
        {
            let next = token.state().expire();
            set_state(token, next, updated_at);
            changed += 1;
        }
        Ok(changed)
    }
}
