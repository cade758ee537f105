//! HTTP router assembly.

use crate::{db::DbPool, handlers, middleware};
use axum::{
    Router, middleware as axum_middleware,
    routing::{get, patch},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// - `/health` is public
/// - `/api/v2/*` requires a bearer API key, and passes the origin guard first
///   when `origin_policy` is set
pub fn router(pool: DbPool, origin_policy: Option<middleware::origin::OriginPolicy>) -> Router {
    let mut api_v2 = Router::new()
        .route(
            "/api_keys",
            get(handlers::api_keys::list_api_keys).post(handlers::api_keys::create_api_key),
        )
        .route(
            "/api_keys/{id}",
            patch(handlers::api_keys::update_api_key).delete(handlers::api_keys::revoke_api_key),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            pool.clone(),
            middleware::auth::auth_middleware,
        ));

    // `layer` rather than `route_layer` so preflights for any method reach the guard
    if let Some(policy) = origin_policy {
        api_v2 = api_v2.layer(axum_middleware::from_fn_with_state(
            Arc::new(policy),
            middleware::origin::origin_guard,
        ));
    }

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .nest("/api/v2", api_v2)
        .layer(TraceLayer::new_for_http())
        .with_state(pool)
}
