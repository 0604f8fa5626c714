//! Token entity model and DTOs.

use lectern_core::tokens::{token_hint, TokenPurpose, TokenState};
use lectern_core::types::{DbId, LookupId, Timestamp};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// A token row from the `tokens` table.
///
/// Identity is the row id: two `Token` values are equal iff their ids are
/// equal, whatever the other fields say. `Debug` prints only a prefix of the
/// token string.
#[derive(Clone)]
pub struct Token {
    pub id: DbId,
    pub token: String,
    pub purpose: TokenPurpose,
    pub expired: bool,
    pub revoked: bool,
    pub user_id: DbId,
    /// `None` means the token only expires through its flag.
    pub expires_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Token {
    /// State from the stored flags alone.
    pub fn state(&self) -> TokenState {
        TokenState::from_flags(self.expired, self.revoked)
    }

    /// State at `now`, counting a passed deadline as expired.
    pub fn state_at(&self, now: Timestamp) -> TokenState {
        TokenState::at(self.expired, self.revoked, self.expires_at, now)
    }

    pub fn is_usable_at(&self, now: Timestamp) -> bool {
        self.state_at(now).is_usable()
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl std::hash::Hash for Token {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("id", &self.id)
            .field("token", &format_args!("{}…", token_hint(&self.token)))
            .field("purpose", &self.purpose)
            .field("expired", &self.expired)
            .field("revoked", &self.revoked)
            .field("user_id", &self.user_id)
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

impl<'r> FromRow<'r, PgRow> for Token {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let purpose_id: LookupId = row.try_get("purpose_id")?;
        let purpose = TokenPurpose::from_id(purpose_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "purpose_id".into(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            token: row.try_get("token")?,
            purpose,
            expired: row.try_get("expired")?,
            revoked: row.try_get("revoked")?,
            user_id: row.try_get("user_id")?,
            expires_at: row.try_get("expires_at")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for inserting a new token. New tokens always start active.
#[derive(Clone)]
pub struct CreateToken {
    pub user_id: DbId,
    pub token: String,
    pub purpose: TokenPurpose,
    pub expires_at: Option<Timestamp>,
}
