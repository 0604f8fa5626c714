//! Account flows built on the token authority.
//!
//! Login, refresh, logout and request authentication deal in session tokens.
//! Activation and the two reset flows consume an action token atomically,
//! then revoke every other pending token of that purpose.

use lectern_core::error::CoreError;
use lectern_core::roles::UserRole;
use lectern_core::tokens::TokenPurpose;
use lectern_core::types::DbId;
use lectern_db::models::token::Token;
use lectern_db::models::user::User;
use serde::Serialize;

use crate::authority::TokenAuthority;
use crate::error::{AuthError, AuthResult};
use crate::jwt;
use crate::password::{hash_password, validate_password_strength, verify_password};
use crate::store::{TokenStore, UserDirectory};

/// Purposes revoked once a password has been reset.
const PASSWORD_RESET_REVOKES: [TokenPurpose; 3] = [
    TokenPurpose::ResetPassword,
    TokenPurpose::Access,
    TokenPurpose::Refresh,
];

/// Purposes revoked once two-factor authentication has been reset.
const TWO_FACTOR_RESET_REVOKES: [TokenPurpose; 2] =
    [TokenPurpose::Reset2fa, TokenPurpose::ResetPassword];

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

/// Session tokens returned by login and refresh.
#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// The caller behind a verified access token.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: DbId,
    pub email: String,
    pub role: UserRole,
    /// Id of the access token row that authenticated the request.
    pub token_id: DbId,
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

impl<S> TokenAuthority<S>
where
    S: TokenStore + UserDirectory,
{
    /// Authenticate with email and password and issue a fresh session pair.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<TokenPair> {
        let user = match self.store().find_user_by_email(email).await? {
            Some(user) => user,
            None => return Err(AuthError::unauthorized("Invalid email or password")),
        };

        let valid = verify_password(password, &user.password_hash)
            .map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        if !valid {
            tracing::debug!(user_id = user.id, "Login rejected: wrong password");
            return Err(AuthError::unauthorized("Invalid email or password"));
        }

        if !user.is_active {
            return Err(CoreError::Forbidden("Account is not activated".into()).into());
        }

        let pair = self.issue_pair(&user).await?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(pair)
    }

    /// Exchange a usable refresh token for a new session pair.
    ///
    /// The presented refresh token is consumed atomically, so concurrent
    /// refreshes with one token yield at most one new pair. The owner's
    /// other session tokens are revoked before the pair is issued.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        self.verify_session_jwt(refresh_token, TokenPurpose::Refresh)?;
        let token = self.consume(refresh_token, TokenPurpose::Refresh).await?;
        let user = self.require_active_owner(&token).await?;

        self.revoke_session_tokens(&user.email).await?;
        let pair = self.issue_pair(&user).await?;
        tracing::info!(user_id = user.id, "Session refreshed");
        Ok(pair)
    }

    /// Revoke every session token of the caller. Returns how many matched.
    pub async fn logout(&self, access_token: &str) -> AuthResult<u64> {
        let context = self.authenticate(access_token).await?;
        let count = self.revoke_session_tokens(&context.email).await?;
        tracing::info!(user_id = context.user_id, count, "User logged out");
        Ok(count)
    }

    /// Resolve the caller behind an access token.
    ///
    /// Checks the signature and `exp` first, then the stored row, so forged
    /// strings are rejected without a store round trip.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AuthContext> {
        self.verify_session_jwt(access_token, TokenPurpose::Access)?;
        let token = self.require_usable(access_token, TokenPurpose::Access).await?;
        let user = self.require_active_owner(&token).await?;

        Ok(AuthContext {
            user_id: user.id,
            email: user.email,
            role: user.role,
            token_id: token.id,
        })
    }

    /// Issue a fresh action token, revoking any still pending for `purpose`.
    pub async fn request_action_token(
        &self,
        email: &str,
        purpose: TokenPurpose,
    ) -> AuthResult<Token> {
        if !purpose.is_action() {
            return Err(CoreError::Validation(format!(
                "{purpose} is not an account-action purpose"
            ))
            .into());
        }

        let user = self.require_user(email).await?;
        if purpose == TokenPurpose::AccountActivation && user.is_active {
            return Err(CoreError::Conflict("Account is already active".into()).into());
        }

        self.revoke_by_purpose(&user.email, purpose).await?;
        self.issue(&user, purpose).await
    }

    /// Consume an activation token and mark its owner active.
    pub async fn activate_account(&self, token: &str) -> AuthResult<User> {
        let found = self.consume(token, TokenPurpose::AccountActivation).await?;
        let user = self.require_owner(&found).await?;

        self.store().activate_user(user.id).await?;
        self.revoke_by_purpose(&user.email, TokenPurpose::AccountActivation)
            .await?;
        tracing::info!(user_id = user.id, "Account activated");

        self.refetch(user.id).await
    }

    /// Consume a password-reset token and store a new password.
    ///
    /// Signs the user out everywhere: reset tokens and all session tokens are
    /// revoked in one call.
    pub async fn reset_password(&self, token: &str, new_password: &str) -> AuthResult<User> {
        validate_password_strength(new_password, self.config().min_password_length)?;

        let found = self.consume(token, TokenPurpose::ResetPassword).await?;
        let user = self.require_owner(&found).await?;

        let hash =
            hash_password(new_password).map_err(|e| AuthError::PasswordHash(e.to_string()))?;
        self.store().update_password(user.id, &hash).await?;
        self.revoke_by_purposes(&user.email, &PASSWORD_RESET_REVOKES)
            .await?;
        tracing::info!(user_id = user.id, "Password reset");

        self.refetch(user.id).await
    }

    /// Consume a 2FA-reset token and clear the user's 2FA secret.
    ///
    /// Session tokens stay valid. Pending password resets are revoked along
    /// with the 2FA reset tokens.
    pub async fn reset_two_factor(&self, token: &str) -> AuthResult<User> {
        let found = self.consume(token, TokenPurpose::Reset2fa).await?;
        let user = self.require_owner(&found).await?;

        self.store().clear_two_factor(user.id).await?;
        self.revoke_by_purposes(&user.email, &TWO_FACTOR_RESET_REVOKES)
            .await?;
        tracing::info!(user_id = user.id, "Two-factor authentication reset");

        self.refetch(user.id).await
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn issue_pair(&self, user: &User) -> AuthResult<TokenPair> {
        let access = self.issue(user, TokenPurpose::Access).await?;
        let refresh = self.issue(user, TokenPurpose::Refresh).await?;

        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            expires_in: self.config().ttl(TokenPurpose::Access).num_seconds(),
        })
    }

    /// Signature, purpose and wall-clock `exp` check only. Callers follow up
    /// with a store check against the authority's clock.
    fn verify_session_jwt(&self, token: &str, purpose: TokenPurpose) -> AuthResult<()> {
        match jwt::validate_token(token, self.config()) {
            Ok(claims) if claims.purpose == purpose => Ok(()),
            Ok(_) | Err(_) => Err(AuthError::unauthorized("Invalid or expired token")),
        }
    }

    async fn require_owner(&self, token: &Token) -> AuthResult<User> {
        match self.store().find_user_by_id(token.user_id).await? {
            Some(user) => Ok(user),
            None => Err(AuthError::unauthorized("Token owner no longer exists")),
        }
    }

    async fn require_active_owner(&self, token: &Token) -> AuthResult<User> {
        let user = self.require_owner(token).await?;
        if !user.is_active {
            return Err(CoreError::Forbidden("Account is not activated".into()).into());
        }
        Ok(user)
    }

    async fn refetch(&self, id: DbId) -> AuthResult<User> {
        self.store()
            .find_user_by_id(id)
            .await?
            .ok_or_else(|| CoreError::not_found("user", id.to_string()).into())
    }
}
