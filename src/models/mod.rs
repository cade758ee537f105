//! Data models representing database entities.
//!
//! This module contains all data structures that map to database tables.

/// API key model
pub mod api_key;
/// Key owner model
pub mod user;
