//! API key model and request/response types.
//!
//! API keys authenticate users of the v2 API. Only the SHA-256 digest of a key
//! is stored; the plain key is shown to its owner exactly once, at issuance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents an API key record from the database.
///
/// # Database Table
///
/// Maps to the `api_keys` table with columns:
/// - `id`: System assigned identifier (BIGSERIAL)
/// - `user_id`: Owner, cascades on user deletion
/// - `api_key_hash`: SHA-256 hex digest of the plain key, unique
/// - `description`, `scopes`: optional free text
/// - `created_at`, `last_used_at`, `expires_at`: lifecycle timestamps
/// - `revoked`: once true the key is rejected regardless of expiry
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApiKey {
    pub id: i64,

    pub user_id: i64,

    /// SHA-256 hash of the actual API key (64 hex characters)
    pub api_key_hash: String,

    pub description: Option<String>,

    /// Serialized scope list.
    ///
    /// Keys issued by this service store a JSON array of strings, but rows
    /// written by other issuers may hold anything; the value is passed through untouched.
    pub scopes: Option<String>,

    pub created_at: DateTime<Utc>,

    /// Updated on every authenticated request made with this key
    pub last_used_at: Option<DateTime<Utc>>,

    /// `None` means the key never expires
    pub expires_at: Option<DateTime<Utc>>,

    pub revoked: bool,
}

/// Fields supplied when inserting a new key row.
#[derive(Debug, Clone)]
pub struct NewApiKey {
    pub api_key_hash: String,
    pub description: Option<String>,
    pub scopes: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Request body for creating a new API key.
///
/// # JSON Example
///
/// ```json
/// {
///   "description": "leaderboard bot",
///   "scopes": ["read:scores", "read:players"],
///   "expires_in_days": 30
/// }
/// ```
///
/// All fields are optional. Omitting `expires_in_days` issues a key that never expires.
#[derive(Debug, Default, Deserialize)]
pub struct CreateApiKeyRequest {
    pub description: Option<String>,

    pub scopes: Option<Vec<String>>,

    pub expires_in_days: Option<i64>,
}

/// Request body for `PATCH /api/v2/api_keys/{id}`.
///
/// Fields left out are not changed.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateApiKeyRequest {
    pub description: Option<String>,

    pub scopes: Option<Vec<String>>,
}

/// Query string for listing keys.
#[derive(Debug, Default, Deserialize)]
pub struct ListApiKeysQuery {
    #[serde(default)]
    pub include_revoked: bool,
}

/// Response returned once, when a key is issued.
///
/// # JSON Example
///
/// ```json
/// {
///   "id": 42,
///   "api_key": "bancho_v2_3q2-7wE...",
///   "description": "leaderboard bot",
///   "created_at": "2025-12-20T10:00:00Z",
///   "expires_at": "2026-01-19T10:00:00Z"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct IssuedApiKeyResponse {
    pub id: i64,

    /// Plain key. Never stored and never returned again.
    pub api_key: String,

    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Response body for list and update endpoints.
///
/// Mirrors `ApiKey` without the digest.
#[derive(Debug, Serialize)]
pub struct ApiKeyResponse {
    pub id: i64,
    pub user_id: i64,
    pub description: Option<String>,
    pub scopes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked: bool,
}

impl From<ApiKey> for ApiKeyResponse {
    fn from(key: ApiKey) -> Self {
        Self {
            id: key.id,
            user_id: key.user_id,
            description: key.description,
            scopes: key.scopes,
            created_at: key.created_at,
            last_used_at: key.last_used_at,
            expires_at: key.expires_at,
            revoked: key.revoked,
        }
    }
}
