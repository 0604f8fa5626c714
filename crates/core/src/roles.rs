//! User roles.
//!
//! Discriminants and names must match the `user_roles` seed data in
//! `20260301000001_create_users.sql`.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::LookupId;

pub const ROLE_STUDENT: &str = "student";
pub const ROLE_TEACHER: &str = "teacher";
pub const ROLE_ADMIN: &str = "admin";

#[repr(i16)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Student = 1,
    Teacher = 2,
    Admin = 3,
}

impl UserRole {
    pub fn id(self) -> LookupId {
        self as LookupId
    }

    /// Parse from the `user_roles.id` column.
    pub fn from_id(id: LookupId) -> Result<Self, CoreError> {
        match id {
            1 => Ok(Self::Student),
            2 => Ok(Self::Teacher),
            3 => Ok(Self::Admin),
            other => Err(CoreError::Validation(format!("Unknown role id {other}"))),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Student => ROLE_STUDENT,
            Self::Teacher => ROLE_TEACHER,
            Self::Admin => ROLE_ADMIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_ids_match_seed_order() {
        assert_eq!(UserRole::from_id(1).unwrap(), UserRole::Student);
        assert_eq!(UserRole::from_id(3).unwrap().name(), "admin");
        assert!(UserRole::from_id(9).is_err());
    }
}
