use std::str::FromStr;

use lectern_core::error::CoreError;
use lectern_core::tokens::TokenPurpose;

/// Default access token lifetime in minutes.
const DEFAULT_ACCESS_TTL_MINS: i64 = 15;
/// Default refresh token lifetime in days.
const DEFAULT_REFRESH_TTL_DAYS: i64 = 7;
/// Default lifetime of activation / reset tokens in hours.
const DEFAULT_ACTION_TTL_HOURS: i64 = 24;
/// Default minimum password length accepted by the reset flow.
const DEFAULT_MIN_PASSWORD_LENGTH: usize = 8;

/// Token authority configuration: signing secret and per-purpose lifetimes.
#[derive(Clone)]
pub struct AuthConfig {
    /// HMAC-SHA256 secret used to sign and verify session tokens.
    pub jwt_secret: String,
    pub access_token_ttl_mins: i64,
    pub refresh_token_ttl_days: i64,
    /// Lifetime shared by `ACCOUNT_ACTIVATION`, `RESET_2FA` and `RESET_PASSWORD`.
    pub action_token_ttl_hours: i64,
    pub min_password_length: usize,
}

impl AuthConfig {
    /// Build a config with default lifetimes around the given secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: jwt_secret.into(),
            access_token_ttl_mins: DEFAULT_ACCESS_TTL_MINS,
            refresh_token_ttl_days: DEFAULT_REFRESH_TTL_DAYS,
            action_token_ttl_hours: DEFAULT_ACTION_TTL_HOURS,
            min_password_length: DEFAULT_MIN_PASSWORD_LENGTH,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `ACCESS_TOKEN_TTL_MINS`  | no       | `15`    |
    /// | `REFRESH_TOKEN_TTL_DAYS` | no       | `7`     |
    /// | `ACTION_TOKEN_TTL_HOURS` | no       | `24`    |
    /// | `MIN_PASSWORD_LENGTH`    | no       | `8`     |
    pub fn from_env() -> Result<Self, CoreError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, CoreError> {
        let jwt_secret = lookup("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CoreError::Validation("JWT_SECRET must be set and non-empty".into()))?;

        let config = Self {
            jwt_secret,
            access_token_ttl_mins: parse_or(&lookup, "ACCESS_TOKEN_TTL_MINS", DEFAULT_ACCESS_TTL_MINS)?,
            refresh_token_ttl_days: parse_or(
                &lookup,
                "REFRESH_TOKEN_TTL_DAYS",
                DEFAULT_REFRESH_TTL_DAYS,
            )?,
            action_token_ttl_hours: parse_or(
                &lookup,
                "ACTION_TOKEN_TTL_HOURS",
                DEFAULT_ACTION_TTL_HOURS,
            )?,
            min_password_length: parse_or(
                &lookup,
                "MIN_PASSWORD_LENGTH",
                DEFAULT_MIN_PASSWORD_LENGTH,
            )?,
        };

        for (name, value) in [
            ("ACCESS_TOKEN_TTL_MINS", config.access_token_ttl_mins),
            ("REFRESH_TOKEN_TTL_DAYS", config.refresh_token_ttl_days),
            ("ACTION_TOKEN_TTL_HOURS", config.action_token_ttl_hours),
        ] {
            if value <= 0 {
                return Err(CoreError::Validation(format!(
                    "{name} must be positive, got {value}"
                )));
            }
        }

        Ok(config)
    }

    /// Lifetime of a freshly issued token of `purpose`.
    pub fn ttl(&self, purpose: TokenPurpose) -> chrono::Duration {
        match purpose {
            TokenPurpose::Access => chrono::Duration::minutes(self.access_token_ttl_mins),
            TokenPurpose::Refresh => chrono::Duration::days(self.refresh_token_ttl_days),
            TokenPurpose::AccountActivation
            | TokenPurpose::Reset2fa
            | TokenPurpose::ResetPassword => chrono::Duration::hours(self.action_token_ttl_hours),
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("access_token_ttl_mins", &self.access_token_ttl_mins)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("action_token_ttl_hours", &self.action_token_ttl_hours)
            .field("min_password_length", &self.min_password_length)
            .finish()
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, CoreError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| CoreError::Validation(format!("{key} has an invalid value '{raw}'"))),
    }
}
