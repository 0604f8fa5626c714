//! Token authority for the Lectern backend.
//!
//! Issues, looks up and revokes every session and account-action token a
//! user holds, on top of a pluggable store.
//!
//! - [`authority`] -- [`TokenAuthority`], the purpose-scoped issue/lookup/revoke core.
//! - [`flows`] -- login, refresh, logout, authentication and account-action flows.
//! - [`store`] -- the [`TokenStore`] and [`UserDirectory`] traits.
//! - [`pg`] / [`memory`] -- PostgreSQL and in-memory store backends.
//! - [`jwt`] -- HS256 session-token encoding and validation.
//! - [`password`] -- Argon2id password hashing and strength checks.
//! - [`sweep`] -- periodic deadline expiry.

pub mod authority;
pub mod config;
pub mod error;
pub mod flows;
pub mod jwt;
pub mod memory;
pub mod password;
pub mod pg;
pub mod store;
pub mod sweep;

pub use authority::TokenAuthority;
pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use store::{StoreError, StoreResult, TokenStore, UserDirectory};
