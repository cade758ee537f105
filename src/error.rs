//! Error types and HTTP error response handling.
//!
//! This module defines all application errors and how they are converted
//! into HTTP responses with appropriate status codes and JSON bodies.

use axum::{
    Json,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Application-wide error type.
///
/// Each variant maps to a specific HTTP status code and error code.
///
/// # Error Categories
///
/// - **Database Errors**: Any sqlx::Error from database operations
/// - **Authentication Errors**: Missing, unknown, revoked or expired API keys
/// - **Authorization Errors**: Keys owned by someone else, requests from unknown origins
/// - **Resource Errors**: Requested key does not exist
/// - **Validation Errors**: Invalid request data
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Database operation failed (e.g., connection error, constraint violation).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// No bearer API key was supplied.
    ///
    /// Returns HTTP 401 with a `WWW-Authenticate: Bearer` challenge.
    #[error("API key required")]
    MissingApiKey,

    /// The supplied key does not match any stored digest.
    #[error("Invalid API key")]
    InvalidApiKey,

    #[error("API key has been revoked")]
    RevokedApiKey,

    #[error("API key has expired")]
    ExpiredApiKey,

    /// The key is valid but its owner no longer exists.
    #[error("User not found")]
    UserNotFound,

    /// Requested API key does not exist.
    ///
    /// Returns HTTP 404 Not Found.
    #[error("API key not found")]
    ApiKeyNotFound,

    /// Authenticated caller does not own the requested key.
    #[error("Unauthorized")]
    Forbidden,

    /// Request did not come from an allowed origin or the trusted bot.
    #[error("Access denied. API is only accessible from authorized origins.")]
    OriginDenied,

    /// Request body or parameters are invalid.
    ///
    /// The String contains details about what was invalid.
    #[error("Invalid request")]
    InvalidRequest(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
            AppError::MissingApiKey => (StatusCode::UNAUTHORIZED, "api_key_required"),
            AppError::InvalidApiKey => (StatusCode::UNAUTHORIZED, "invalid_api_key"),
            AppError::RevokedApiKey => (StatusCode::UNAUTHORIZED, "api_key_revoked"),
            AppError::ExpiredApiKey => (StatusCode::UNAUTHORIZED, "api_key_expired"),
            AppError::UserNotFound => (StatusCode::UNAUTHORIZED, "user_not_found"),
            AppError::ApiKeyNotFound => (StatusCode::NOT_FOUND, "api_key_not_found"),
            AppError::Forbidden => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::OriginDenied => (StatusCode::FORBIDDEN, "origin_denied"),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
        }
    }
}

/// Convert AppError into an HTTP response.
///
/// # Response Format
///
/// All errors return JSON in this format:
/// ```json
/// {
///   "error": {
///     "code": "error_type",
///     "message": "Human-readable error message"
///   }
/// }
/// ```
///
/// Database errors are logged and reported to the client as a generic
/// `internal_error` so constraint names and SQL never leak.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match self {
            AppError::Database(ref e) => {
                tracing::error!(error = %e, "database error while handling request");
                "An internal error occurred".to_string()
            }
            AppError::InvalidRequest(ref msg) => msg.clone(),
            _ => self.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        if matches!(self, AppError::MissingApiKey) {
            return (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response();
        }

        (status, body).into_response()
    }
}
