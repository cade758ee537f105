//! API key authentication middleware.
//!
//! This middleware intercepts every protected request to:
//! 1. Extract the API key from the Authorization header
//! 2. Hash it and look up the stored digest
//! 3. Reject revoked or expired keys
//! 4. Record the use and inject authentication context into the request

use crate::{db::DbPool, error::AppError, services::api_key_service};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

/// Authentication context attached to authenticated requests.
///
/// Inserted into the request's extension map; handlers extract it with
/// `Extension<AuthContext>`.
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// ID of the key used for this request
    pub api_key_id: i64,

    /// Owner of the key. All key management is scoped to this user.
    pub user_id: i64,

    pub user_name: String,
}

/// Pull a service key out of `Authorization: Bearer <key>`.
///
/// Returns `None` when the header is missing, is not a bearer token, or the
/// token does not carry the service key prefix.
pub fn bearer_api_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|key| key.starts_with(api_key_service::API_KEY_PREFIX))
}

/// API key authentication middleware function.
///
/// # Flow
///
/// 1. Extract `Authorization: Bearer bancho_v2_...` header from request
/// 2. Hash the key using SHA-256 and look it up
/// 3. Reject revoked, then expired keys
/// 4. Spawn a `last_used_at` update without waiting for it
/// 5. Load the owning user and inject `AuthContext`
///
/// # Returns
///
/// - `Err(MissingApiKey)` if no usable bearer key was supplied
/// - `Err(InvalidApiKey | RevokedApiKey | ExpiredApiKey | UserNotFound)` otherwise on failure
pub async fn auth_middleware(
    State(pool): State<DbPool>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let api_key = bearer_api_key(request.headers()).ok_or(AppError::MissingApiKey)?;
    let key_hash = api_key_service::hash_api_key(api_key);

    let key = api_key_service::fetch_by_hash(&pool, &key_hash)
        .await?
        .ok_or(AppError::InvalidApiKey)?;

    api_key_service::ensure_usable(&key, Utc::now())?;

    // Usage tracking must not hold up the request
    let touch_pool = pool.clone();
    tokio::spawn(async move {
        if let Err(e) = api_key_service::touch_last_used(&touch_pool, &key_hash).await {
            tracing::warn!("Failed to record API key use: {:?}", e);
        }
    });

    let user = api_key_service::fetch_owner(&pool, key.user_id)
        .await?
        .ok_or(AppError::UserNotFound)?;

    request.extensions_mut().insert(AuthContext {
        api_key_id: key.id,
        user_id: user.id,
        user_name: user.name,
    });

    Ok(next.run(request).await)
}
