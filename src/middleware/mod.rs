//! HTTP middleware components.
//!
//! Middleware run before route handlers. They can:
//! - Authenticate requests
//! - Restrict callers by origin
//! - Short-circuit requests (reject unauthorized)

/// API key authentication middleware
pub mod auth;
/// Origin restriction for browser callers
pub mod origin;
