//! User entity model and DTOs.

use lectern_core::roles::UserRole;
use lectern_core::types::{DbId, LookupId, Timestamp};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};

/// Full user row from the `users` table.
///
/// Contains the password hash and 2FA secret, so it is deliberately not
/// `Serialize`.
#[derive(Debug, Clone)]
pub struct User {
    pub id: DbId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
    /// `false` until the account-activation token is consumed.
    pub is_active: bool,
    pub two_factor_secret: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl<'r> FromRow<'r, PgRow> for User {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let role_id: LookupId = row.try_get("role_id")?;
        let role = UserRole::from_id(role_id).map_err(|e| sqlx::Error::ColumnDecode {
            index: "role_id".into(),
            source: Box::new(e),
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            first_name: row.try_get("first_name")?,
            last_name: row.try_get("last_name")?,
            password_hash: row.try_get("password_hash")?,
            role,
            is_active: row.try_get("is_active")?,
            two_factor_secret: row.try_get("two_factor_secret")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// DTO for creating a new user.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
}
