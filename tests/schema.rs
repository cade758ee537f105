//! Database-backed tests. They need a disposable PostgreSQL named by
//! `DATABASE_URL` and are skipped when it is unset.

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
    response::Response,
};
use bancho_keys::db::{self, DbPool};
use bancho_keys::error::AppError;
use bancho_keys::models::api_key::{CreateApiKeyRequest, NewApiKey};
use bancho_keys::routes;
use bancho_keys::services::api_key_service;
use serde_json::{Value, json};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tower::ServiceExt;

async fn test_pool() -> Option<DbPool> {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return None;
    };

    let pool = db::create_pool(&url).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    Some(pool)
}

async fn create_user(pool: &DbPool) -> i64 {
    // Key generator doubles as a source of unique names across parallel tests
    let name = format!("user-{}", api_key_service::generate_api_key());
    sqlx::query_scalar("INSERT INTO users (name) VALUES ($1) RETURNING id")
        .bind(name)
        .fetch_one(pool)
        .await
        .unwrap()
}

fn new_key(hash: &str) -> NewApiKey {
    NewApiKey {
        api_key_hash: hash.to_string(),
        description: None,
        scopes: None,
        expires_at: None,
    }
}

fn unique_hash() -> String {
    api_key_service::hash_api_key(&api_key_service::generate_api_key())
}

#[tokio::test]
async fn applying_schema_twice_keeps_one_table() {
    let Some(pool) = test_pool().await else {
        return;
    };

    db::apply_api_keys_schema(&pool).await.unwrap();
    db::apply_api_keys_schema(&pool).await.unwrap();

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM information_schema.tables
         WHERE table_schema = current_schema() AND table_name = 'api_keys'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(tables, 1);

    let columns: Vec<String> = sqlx::query_scalar(
        "SELECT column_name::text FROM information_schema.columns
         WHERE table_schema = current_schema() AND table_name = 'api_keys'
         ORDER BY ordinal_position",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(
        columns,
        vec![
            "id",
            "user_id",
            "api_key_hash",
            "description",
            "scopes",
            "created_at",
            "last_used_at",
            "expires_at",
            "revoked",
        ]
    );

    let indexes: Vec<String> = sqlx::query_scalar(
        "SELECT indexname::text FROM pg_indexes
         WHERE schemaname = current_schema() AND tablename = 'api_keys'
         AND indexname IN ('idx_api_keys_hash', 'idx_api_keys_user_id')
         ORDER BY indexname",
    )
    .fetch_all(&pool)
    .await
    .unwrap();
    assert_eq!(indexes, vec!["idx_api_keys_hash", "idx_api_keys_user_id"]);

    let cascading_fks: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pg_constraint
         WHERE conrelid = 'api_keys'::regclass AND contype = 'f' AND confdeltype = 'c'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(cascading_fks, 1);
}

#[tokio::test]
async fn duplicate_digest_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user_id = create_user(&pool).await;
    let hash = unique_hash();

    api_key_service::create(&pool, user_id, new_key(&hash))
        .await
        .unwrap();
    let err = api_key_service::create(&pool, user_id, new_key(&hash))
        .await
        .unwrap_err();

    match err {
        AppError::Database(e) => {
            assert!(e.as_database_error().unwrap().is_unique_violation());
        }
        other => panic!("expected unique violation, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_owner_is_rejected() {
    let Some(pool) = test_pool().await else {
        return;
    };

    let err = api_key_service::create(&pool, -1, new_key(&unique_hash()))
        .await
        .unwrap_err();

    match err {
        AppError::Database(e) => {
            assert!(e.as_database_error().unwrap().is_foreign_key_violation());
        }
        other => panic!("expected foreign key violation, got {other:?}"),
    }
}

#[tokio::test]
async fn deleting_owner_deletes_keys() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user_id = create_user(&pool).await;

    for _ in 0..2 {
        api_key_service::create(&pool, user_id, new_key(&unique_hash()))
            .await
            .unwrap();
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM api_keys WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}

#[tokio::test]
async fn new_rows_get_defaults() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user_id = create_user(&pool).await;

    let key = api_key_service::create(&pool, user_id, new_key(&unique_hash()))
        .await
        .unwrap();

    assert!(!key.revoked);
    assert!(key.last_used_at.is_none());
    assert!(key.expires_at.is_none());
    assert!(key.created_at <= chrono::Utc::now());
}

#[tokio::test]
async fn key_lifecycle() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let user_id = create_user(&pool).await;

    let issued = api_key_service::issue(
        &pool,
        user_id,
        CreateApiKeyRequest {
            description: Some("bot".to_string()),
            scopes: Some(vec!["read:scores".to_string()]),
            expires_in_days: Some(7),
        },
    )
    .await
    .unwrap();
    assert!(issued.expires_at.is_some());

    let hash = api_key_service::hash_api_key(&issued.api_key);
    let stored = api_key_service::fetch_by_hash(&pool, &hash)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.id, issued.id);
    assert_eq!(stored.scopes.as_deref(), Some(r#"["read:scores"]"#));

    // No fields: nothing changes
    let unchanged = api_key_service::update(&pool, issued.id, None, None)
        .await
        .unwrap();
    assert_eq!(unchanged.description.as_deref(), Some("bot"));

    let renamed = api_key_service::update(&pool, issued.id, Some("renamed".to_string()), None)
        .await
        .unwrap();
    assert_eq!(renamed.description.as_deref(), Some("renamed"));
    assert_eq!(renamed.scopes, stored.scopes);

    api_key_service::touch_last_used(&pool, &hash).await.unwrap();
    let used = api_key_service::fetch_by_id(&pool, issued.id)
        .await
        .unwrap()
        .unwrap();
    assert!(used.last_used_at.is_some());

    api_key_service::revoke(&pool, issued.id).await.unwrap();
    let revoked = api_key_service::fetch_by_id(&pool, issued.id)
        .await
        .unwrap()
        .unwrap();
    assert!(matches!(
        api_key_service::ensure_usable(&revoked, chrono::Utc::now()),
        Err(AppError::RevokedApiKey)
    ));

    let active = api_key_service::list_for_user(&pool, user_id, false)
        .await
        .unwrap();
    assert!(active.is_empty());
    let all = api_key_service::list_for_user(&pool, user_id, true)
        .await
        .unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn ownership_is_enforced() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let owner = create_user(&pool).await;
    let stranger = create_user(&pool).await;

    let key = api_key_service::create(&pool, owner, new_key(&unique_hash()))
        .await
        .unwrap();

    assert!(api_key_service::fetch_owned(&pool, owner, key.id).await.is_ok());
    assert!(matches!(
        api_key_service::fetch_owned(&pool, stranger, key.id).await,
        Err(AppError::Forbidden)
    ));
    assert!(matches!(
        api_key_service::fetch_owned(&pool, owner, -1).await,
        Err(AppError::ApiKeyNotFound)
    ));
}

fn api_request(method: Method, uri: &str, api_key: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {api_key}"));

    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn error_code(response: Response) -> String {
    body_json(response).await["error"]["code"]
        .as_str()
        .unwrap()
        .to_string()
}

async fn issue_default(pool: &DbPool, user_id: i64) -> (i64, String) {
    let issued = api_key_service::issue(pool, user_id, CreateApiKeyRequest::default())
        .await
        .unwrap();
    (issued.id, issued.api_key)
}

#[tokio::test]
async fn unusable_keys_are_rejected_over_http() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let app = routes::router(pool.clone(), None);
    let user_id = create_user(&pool).await;

    let (_, valid) = issue_default(&pool, user_id).await;
    let response = send(&app, api_request(Method::GET, "/api/v2/api_keys", &valid, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (revoked_id, revoked) = issue_default(&pool, user_id).await;
    api_key_service::revoke(&pool, revoked_id).await.unwrap();
    let response = send(&app, api_request(Method::GET, "/api/v2/api_keys", &revoked, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "api_key_revoked");

    let expired = api_key_service::generate_api_key();
    api_key_service::create(
        &pool,
        user_id,
        NewApiKey {
            api_key_hash: api_key_service::hash_api_key(&expired),
            description: None,
            scopes: None,
            expires_at: Some(chrono::Utc::now() - chrono::Duration::days(1)),
        },
    )
    .await
    .unwrap();
    let response = send(&app, api_request(Method::GET, "/api/v2/api_keys", &expired, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "api_key_expired");

    let unknown = api_key_service::generate_api_key();
    let response = send(&app, api_request(Method::GET, "/api/v2/api_keys", &unknown, None)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(error_code(response).await, "invalid_api_key");
}

#[tokio::test]
async fn key_management_over_http() {
    let Some(pool) = test_pool().await else {
        return;
    };
    let app = routes::router(pool.clone(), None);
    let owner = create_user(&pool).await;
    let stranger = create_user(&pool).await;

    let (own_id, own_key) = issue_default(&pool, owner).await;
    let (stranger_id, _) = issue_default(&pool, stranger).await;

    let patch_stranger = api_request(
        Method::PATCH,
        &format!("/api/v2/api_keys/{stranger_id}"),
        &own_key,
        Some(json!({ "description": "mine now" })),
    );
    let response = send(&app, patch_stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(error_code(response).await, "forbidden");

    let delete_stranger = api_request(
        Method::DELETE,
        &format!("/api/v2/api_keys/{stranger_id}"),
        &own_key,
        None,
    );
    let response = send(&app, delete_stranger).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let patch_missing = api_request(
        Method::PATCH,
        &format!("/api/v2/api_keys/{}", i64::MAX),
        &own_key,
        Some(json!({})),
    );
    let response = send(&app, patch_missing).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(error_code(response).await, "api_key_not_found");

    let patch_own = api_request(
        Method::PATCH,
        &format!("/api/v2/api_keys/{own_id}"),
        &own_key,
        Some(json!({ "description": "bot", "scopes": ["read:scores", "read:players"] })),
    );
    let response = send(&app, patch_own).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["description"], "bot");
    assert_eq!(body["scopes"], r#"["read:scores","read:players"]"#);
    assert!(body.get("api_key_hash").is_none());

    // Zero days issues a key that never expires
    let create = api_request(
        Method::POST,
        "/api/v2/api_keys",
        &own_key,
        Some(json!({ "description": "second", "expires_in_days": 0 })),
    );
    let response = send(&app, create).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert!(created["expires_at"].is_null());
    let second_id = created["id"].as_i64().unwrap();
    assert!(
        created["api_key"]
            .as_str()
            .unwrap()
            .starts_with(api_key_service::API_KEY_PREFIX)
    );

    let revoke = api_request(
        Method::DELETE,
        &format!("/api/v2/api_keys/{second_id}"),
        &own_key,
        None,
    );
    let response = send(&app, revoke).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let list = api_request(Method::GET, "/api/v2/api_keys", &own_key, None);
    let active = body_json(send(&app, list).await).await;
    assert_eq!(active.as_array().unwrap().len(), 1);

    let list_all = api_request(
        Method::GET,
        "/api/v2/api_keys?include_revoked=true",
        &own_key,
        None,
    );
    let all = body_json(send(&app, list_all).await).await;
    assert_eq!(all.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn existing_users_table_with_int_ids_is_supported() {
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set; skipping database test");
        return;
    };

    // Isolated schema holding a users table shaped like an existing deployment's
    let schema = format!("byo_{}", &unique_hash()[..16]);
    let admin = db::create_pool(&url).await.unwrap();
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&admin)
        .await
        .unwrap();

    let options = url
        .parse::<PgConnectOptions>()
        .unwrap()
        .options([("search_path", schema.as_str())]);
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .unwrap();

    sqlx::query(
        "CREATE TABLE users (
            id INT PRIMARY KEY,
            name TEXT NOT NULL,
            creation_time INT NOT NULL DEFAULT 0
        )",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO users (id, name) VALUES (7, 'cookiezi')")
        .execute(&pool)
        .await
        .unwrap();

    db::apply_api_keys_schema(&pool).await.unwrap();
    db::apply_api_keys_schema(&pool).await.unwrap();

    let owner = api_key_service::fetch_owner(&pool, 7)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(owner.id, 7);
    assert_eq!(owner.name, "cookiezi");
    assert!(api_key_service::fetch_owner(&pool, 8).await.unwrap().is_none());

    let (_, api_key) = issue_default(&pool, 7).await;
    let app = routes::router(pool.clone(), None);
    let response = send(&app, api_request(Method::GET, "/api/v2/api_keys", &api_key, None)).await;
    assert_eq!(response.status(), StatusCode::OK);

    pool.close().await;
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(&admin)
        .await
        .unwrap();
}
