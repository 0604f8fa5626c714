//! Shared domain types for the Lectern backend.
//!
//! This crate has no I/O: it holds the id/timestamp aliases, the common
//! error type, and the pure token lifecycle rules that both the persistence
//! layer and the token authority build on.

pub mod clock;
pub mod error;
pub mod roles;
pub mod tokens;
pub mod types;
