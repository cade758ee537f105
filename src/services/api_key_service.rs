//! API key service - issuance, lookup and lifecycle of API keys.
//!
//! This service handles:
//! - Key generation and SHA-256 digesting
//! - CRUD over the `api_keys` table
//! - Usability checks (revoked, expired) applied during authentication
//!
//! The plain key only exists in memory while it is being issued or checked.

use crate::{
    db::DbPool,
    error::AppError,
    models::api_key::{ApiKey, CreateApiKeyRequest, IssuedApiKeyResponse, NewApiKey},
    models::user::User,
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Prefix carried by every key this service issues.
pub const API_KEY_PREFIX: &str = "bancho_v2_";

/// Random bytes behind each key; 36 bytes encode to 48 URL-safe characters.
const API_KEY_RANDOM_BYTES: usize = 36;

/// Generate a new plain API key.
///
/// # Format
///
/// `bancho_v2_` followed by 48 characters of unpadded base64url
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    format!("{}{}", API_KEY_PREFIX, URL_SAFE_NO_PAD.encode(bytes))
}

/// Hash an API key for storage and lookup (64 lowercase hex characters).
pub fn hash_api_key(api_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(api_key.as_bytes());

    hex::encode(hasher.finalize())
}

/// Check a plain key against a stored digest.
pub fn verify_api_key(plain_key: &str, hashed_key: &str) -> bool {
    hash_api_key(plain_key) == hashed_key
}

/// Reject keys that can no longer authenticate.
///
/// Revocation wins over expiry: a revoked key reports `RevokedApiKey` even if
/// it has also expired.
pub fn ensure_usable(key: &ApiKey, now: DateTime<Utc>) -> Result<(), AppError> {
    if key.revoked {
        return Err(AppError::RevokedApiKey);
    }

    match key.expires_at {
        Some(expires_at) if expires_at < now => Err(AppError::ExpiredApiKey),
        _ => Ok(()),
    }
}

/// Compute the expiry timestamp for a key issued at `now`.
///
/// `None` and `Some(0)` both mean the key never expires. Negative day counts are rejected.
pub fn expiry_from_days(
    now: DateTime<Utc>,
    expires_in_days: Option<i64>,
) -> Result<Option<DateTime<Utc>>, AppError> {
    let days = match expires_in_days {
        None | Some(0) => return Ok(None),
        Some(days) => days,
    };

    if days < 0 {
        return Err(AppError::InvalidRequest(
            "expires_in_days must not be negative".to_string(),
        ));
    }

    Duration::try_days(days)
        .and_then(|d| now.checked_add_signed(d))
        .map(Some)
        .ok_or_else(|| AppError::InvalidRequest("expires_in_days is too large".to_string()))
}

/// Serialize a scope list into the stored text form (a JSON array).
pub fn encode_scopes(scopes: &[String]) -> Result<String, AppError> {
    serde_json::to_string(scopes)
        .map_err(|e| AppError::InvalidRequest(format!("Failed to encode scopes: {}", e)))
}

/// Issue a new key for `user_id`.
///
/// # Process
///
/// 1. Generate a plain key and hash it
/// 2. Encode scopes as JSON, compute expiry
/// 3. Insert the row
/// 4. Return the row together with the plain key (only time it's shown)
pub async fn issue(
    pool: &DbPool,
    user_id: i64,
    request: CreateApiKeyRequest,
) -> Result<IssuedApiKeyResponse, AppError> {
    let expires_at = expiry_from_days(Utc::now(), request.expires_in_days)?;

    // An empty scope list is stored as NULL
    let scopes = match request.scopes {
        Some(ref scopes) if !scopes.is_empty() => Some(encode_scopes(scopes)?),
        _ => None,
    };

    let api_key = generate_api_key();

    let record = create(
        pool,
        user_id,
        NewApiKey {
            api_key_hash: hash_api_key(&api_key),
            description: request.description,
            scopes,
            expires_at,
        },
    )
    .await?;

    tracing::info!(key_id = record.id, user_id, "issued API key");

    Ok(IssuedApiKeyResponse {
        id: record.id,
        api_key,
        description: record.description,
        created_at: record.created_at,
        expires_at: record.expires_at,
    })
}

/// Insert a key row and return it.
///
/// # Errors
///
/// - `Database`: duplicate digest or unknown `user_id` (constraint violations)
pub async fn create(pool: &DbPool, user_id: i64, new_key: NewApiKey) -> Result<ApiKey, AppError> {
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        INSERT INTO api_keys (user_id, api_key_hash, description, scopes, expires_at)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
        "#,
    )
    .bind(user_id)
    .bind(new_key.api_key_hash)
    .bind(new_key.description)
    .bind(new_key.scopes)
    .bind(new_key.expires_at)
    .fetch_one(pool)
    .await?;

    Ok(key)
}

/// Get a key by its identifier.
pub async fn fetch_by_id(pool: &DbPool, id: i64) -> Result<Option<ApiKey>, AppError> {
    let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(key)
}

/// Get a key by its digest.
pub async fn fetch_by_hash(pool: &DbPool, api_key_hash: &str) -> Result<Option<ApiKey>, AppError> {
    let key = sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE api_key_hash = $1")
        .bind(api_key_hash)
        .fetch_optional(pool)
        .await?;

    Ok(key)
}

/// List a user's keys, newest first.
///
/// Revoked keys are left out unless `include_revoked` is set.
pub async fn list_for_user(
    pool: &DbPool,
    user_id: i64,
    include_revoked: bool,
) -> Result<Vec<ApiKey>, AppError> {
    let keys = sqlx::query_as::<_, ApiKey>(
        r#"
        SELECT * FROM api_keys
        WHERE user_id = $1 AND ($2 OR revoked = FALSE)
        ORDER BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .bind(include_revoked)
    .fetch_all(pool)
    .await?;

    Ok(keys)
}

/// Change a key's description and/or scopes.
///
/// Fields passed as `None` keep their stored value, so a call with neither is a no-op.
pub async fn update(
    pool: &DbPool,
    id: i64,
    description: Option<String>,
    scopes: Option<String>,
) -> Result<ApiKey, AppError> {
    let key = sqlx::query_as::<_, ApiKey>(
        r#"
        UPDATE api_keys
        SET description = COALESCE($2, description),
            scopes = COALESCE($3, scopes)
        WHERE id = $1
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(description)
    .bind(scopes)
    .fetch_optional(pool)
    .await?
    .ok_or(AppError::ApiKeyNotFound)?;

    Ok(key)
}

/// Mark a key revoked. Revocation is permanent.
pub async fn revoke(pool: &DbPool, id: i64) -> Result<(), AppError> {
    let result = sqlx::query("UPDATE api_keys SET revoked = TRUE WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::ApiKeyNotFound);
    }

    tracing::info!(key_id = id, "revoked API key");

    Ok(())
}

/// Record that the key with this digest was just used.
pub async fn touch_last_used(pool: &DbPool, api_key_hash: &str) -> Result<(), AppError> {
    sqlx::query("UPDATE api_keys SET last_used_at = NOW() WHERE api_key_hash = $1")
        .bind(api_key_hash)
        .execute(pool)
        .await?;

    Ok(())
}

/// Look up the owner of a key.
pub async fn fetch_owner(pool: &DbPool, user_id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>("SELECT id::BIGINT AS id, name FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(user)
}

/// Load a key the caller wants to modify, enforcing ownership.
///
/// # Errors
///
/// - `ApiKeyNotFound`: no key with this id
/// - `Forbidden`: key belongs to a different user
pub async fn fetch_owned(pool: &DbPool, user_id: i64, id: i64) -> Result<ApiKey, AppError> {
    let key = fetch_by_id(pool, id).await?.ok_or(AppError::ApiKeyNotFound)?;

    if key.user_id != user_id {
        return Err(AppError::Forbidden);
    }

    Ok(key)
}
