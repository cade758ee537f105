//! API key management HTTP handlers.
//!
//! This module implements the key-related API endpoints:
//! - POST /api/v2/api_keys - Issue a new key
//! - GET /api/v2/api_keys - List the caller's keys
//! - PATCH /api/v2/api_keys/:id - Change description or scopes
//! - DELETE /api/v2/api_keys/:id - Revoke a key
//!
//! All endpoints act on behalf of the user owning the authenticating key.

use crate::{
    db::DbPool,
    error::AppError,
    middleware::auth::AuthContext,
    models::api_key::{
        ApiKeyResponse, CreateApiKeyRequest, IssuedApiKeyResponse, ListApiKeysQuery,
        UpdateApiKeyRequest,
    },
    services::api_key_service,
};
use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};

/// Issue a new API key for the authenticated user.
///
/// # Endpoint
///
/// `POST /api/v2/api_keys`
///
/// # Request Body
///
/// ```json
/// {
///   "description": "leaderboard bot",
///   "scopes": ["read:scores"],
///   "expires_in_days": 30
/// }
/// ```
///
/// # Response
///
/// - **Success (201 Created)**: the new key, including the plain `api_key`.
///   This is the only time the plain key is returned.
/// - **Error (400)**: `expires_in_days` is negative
/// - **Error (401)**: Invalid API key
pub async fn create_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateApiKeyRequest>,
) -> Result<(StatusCode, Json<IssuedApiKeyResponse>), AppError> {
    let issued = api_key_service::issue(&pool, auth.user_id, request).await?;

    Ok((StatusCode::CREATED, Json(issued)))
}

/// List the authenticated user's keys, newest first.
///
/// # Endpoint
///
/// `GET /api/v2/api_keys?include_revoked=true`
///
/// Revoked keys are hidden unless `include_revoked` is set. Digests are never returned.
pub async fn list_api_keys(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListApiKeysQuery>,
) -> Result<Json<Vec<ApiKeyResponse>>, AppError> {
    let keys = api_key_service::list_for_user(&pool, auth.user_id, query.include_revoked).await?;

    Ok(Json(keys.into_iter().map(Into::into).collect()))
}

/// Update a key's description or scopes.
///
/// # Endpoint
///
/// `PATCH /api/v2/api_keys/:id`
///
/// # Response
///
/// - **Success (200 OK)**: the updated key
/// - **Error (404)**: key does not exist
/// - **Error (403)**: key belongs to another user
pub async fn update_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<i64>,
    Json(request): Json<UpdateApiKeyRequest>,
) -> Result<Json<ApiKeyResponse>, AppError> {
    api_key_service::fetch_owned(&pool, auth.user_id, key_id).await?;

    let scopes = request
        .scopes
        .as_deref()
        .map(api_key_service::encode_scopes)
        .transpose()?;

    let key = api_key_service::update(&pool, key_id, request.description, scopes).await?;

    Ok(Json(key.into()))
}

/// Revoke a key.
///
/// # Endpoint
///
/// `DELETE /api/v2/api_keys/:id`
///
/// The row is kept with `revoked = true`; it can no longer authenticate.
/// A key may revoke itself.
///
/// # Response
///
/// - **Success (204 No Content)**
/// - **Error (404)**: key does not exist
/// - **Error (403)**: key belongs to another user
pub async fn revoke_api_key(
    State(pool): State<DbPool>,
    Extension(auth): Extension<AuthContext>,
    Path(key_id): Path<i64>,
) -> Result<StatusCode, AppError> {
    api_key_service::fetch_owned(&pool, auth.user_id, key_id).await?;
    api_key_service::revoke(&pool, key_id).await?;

    Ok(StatusCode::NO_CONTENT)
}
