//! Business logic separated from HTTP handlers.

/// API key issuance, lookup and lifecycle
pub mod api_key_service;
/// Scheduled container restart task
pub mod restart;
