//! Account and contact flow tests against a live database
//!
//! Run with a disposable Postgres:
//! `DATABASE_URL=postgres://... cargo test -p contactbook-api -- --ignored`

#![allow(clippy::unwrap_used, clippy::expect_used)]

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use contactbook_api::auth::{hash_password, VerificationError, VerificationManager};
use contactbook_api::{routes::create_router, AppState, Config};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let pool = contactbook_shared::db::create_pool(&url, 3, 30)
        .await
        .expect("pool");
    contactbook_shared::db::run_migrations(&pool)
        .await
        .expect("migrations");
    pool
}

/// Insert an unverified user the way signup does, returning (id, token)
async fn create_unverified_user(pool: &PgPool, email: &str) -> (Uuid, String) {
    let id = Uuid::new_v4();
    let token = VerificationManager::generate_token();
    let hash = hash_password("secret1").expect("hash");

    sqlx::query(
        r#"
        INSERT INTO users (id, email, password_hash, subscription, verified, verification_token)
        VALUES ($1, $2, $3, 'starter', FALSE, $4)
        "#,
    )
    .bind(id)
    .bind(email)
    .bind(&hash)
    .bind(&token)
    .execute(pool)
    .await
    .expect("insert user");

    (id, token)
}

fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

/// Build the full router over the test pool; mail stays disabled
fn app(pool: PgPool) -> Router {
    let config = Config {
        bind_address: "127.0.0.1:0".to_string(),
        public_url: "http://localhost:3000".to_string(),
        database_url: String::new(),
        database_max_connections: 3,
        database_acquire_timeout_secs: 30,
        jwt_secret: "test-jwt-secret-must-be-at-least-32-characters-long".to_string(),
        jwt_expiry_hours: 1,
        resend_api_key: String::new(),
        email_from: "Contactbook <noreply@localhost>".to_string(),
        avatar_dir: "public/avatars".to_string(),
    };
    create_router(AppState::new(pool, config))
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<&str>,
) -> Response {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    app.clone().oneshot(request).await.unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Register and verify an account through the API, returning its email
async fn signed_up_and_verified(app: &Router, prefix: &str) -> String {
    let email = unique_email(prefix);
    let signup_body = format!(r#"{{"email": "{email}", "password": "secret1"}}"#);

    let response = send(app, "POST", "/api/users/signup", None, Some(&signup_body)).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    let token = body["user"]["verification_token"].as_str().unwrap().to_string();

    let response = send(app, "GET", &format!("/api/users/verify/{token}"), None, None).await;
    assert_eq!(response.status(), StatusCode::OK);

    email
}

/// Login through the API and return the session token
async fn login(app: &Router, email: &str) -> String {
    let body = format!(r#"{{"email": "{email}", "password": "secret1"}}"#);
    let response = send(app, "POST", "/api/users/login", None, Some(&body)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
#[ignore] // Requires database
async fn verification_token_consumes_exactly_once() {
    let pool = test_pool().await;
    let (user_id, token) = create_unverified_user(&pool, &unique_email("verify")).await;

    let manager = VerificationManager::new(pool.clone());

    // First consume succeeds and flips the user to verified
    let verified = manager.consume(&token).await.expect("first consume");
    assert_eq!(verified.id, user_id);

    let (verified_flag, stored_token): (bool, Option<String>) =
        sqlx::query_as("SELECT verified, verification_token FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&pool)
            .await
            .expect("fetch");
    assert!(verified_flag);
    assert!(stored_token.is_none());

    // Second consume of the same token finds nothing
    let second = manager.consume(&token).await;
    assert!(matches!(second, Err(VerificationError::NotFound)));
}

#[tokio::test]
#[ignore] // Requires database
async fn concurrent_consume_yields_one_winner() {
    let pool = test_pool().await;
    let (_, token) = create_unverified_user(&pool, &unique_email("race")).await;

    let m1 = VerificationManager::new(pool.clone());
    let m2 = VerificationManager::new(pool.clone());
    let t1 = token.clone();
    let t2 = token.clone();

    let (r1, r2) = tokio::join!(m1.consume(&t1), m2.consume(&t2));

    let successes = [r1.is_ok(), r2.is_ok()].iter().filter(|&&ok| ok).count();
    assert_eq!(successes, 1, "exactly one concurrent consume may win");
}

#[tokio::test]
#[ignore] // Requires database
async fn resend_reuses_the_stored_token() {
    let pool = test_pool().await;
    let email = unique_email("resend");
    let (user_id, token) = create_unverified_user(&pool, &email).await;

    let manager = VerificationManager::new(pool.clone());

    let (found_id, found_token) = manager.token_for_resend(&email).await.expect("resend");
    assert_eq!(found_id, user_id);
    assert_eq!(found_token, token);

    // Once verified, resend reports AlreadyVerified
    manager.consume(&token).await.expect("consume");
    let after = manager.token_for_resend(&email).await;
    assert!(matches!(after, Err(VerificationError::AlreadyVerified)));

    // Unknown email reports NotFound
    let unknown = manager.token_for_resend(&unique_email("missing")).await;
    assert!(matches!(unknown, Err(VerificationError::NotFound)));
}

#[tokio::test]
#[ignore] // Requires database
async fn stored_session_token_tracks_latest_login() {
    let pool = test_pool().await;
    let (user_id, token) = create_unverified_user(&pool, &unique_email("session")).await;
    VerificationManager::new(pool.clone())
        .consume(&token)
        .await
        .expect("verify");

    // Two logins: each overwrites the stored token, so only the second stays
    for session in ["session-token-1", "session-token-2"] {
        sqlx::query("UPDATE users SET token = $1 WHERE id = $2")
            .bind(session)
            .bind(user_id)
            .execute(&pool)
            .await
            .expect("login update");
    }

    let stored: Option<String> = sqlx::query_scalar("SELECT token FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .expect("fetch token");
    assert_eq!(stored.as_deref(), Some("session-token-2"));

    // Logout clears it
    sqlx::query("UPDATE users SET token = NULL WHERE id = $1")
        .bind(user_id)
        .execute(&pool)
        .await
        .expect("logout");

    let stored: Option<String> = sqlx::query_scalar("SELECT token FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .expect("fetch token");
    assert!(stored.is_none());
}

#[tokio::test]
#[ignore] // Requires database
async fn logout_revokes_the_session_at_the_auth_gate() {
    let pool = test_pool().await;
    let app = app(pool);

    let email = signed_up_and_verified(&app, "gate-logout").await;
    let token = login(&app, &email).await;

    // The issued token passes the gate
    let response = send(&app, "GET", "/api/users/current", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["email"], email);

    // Logout clears the stored token
    let response = send(&app, "GET", "/api/users/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The same bearer token is now refused even though its signature is
    // still valid
    let response = send(&app, "GET", "/api/users/current", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore] // Requires database
async fn newer_login_supersedes_the_previous_session() {
    let pool = test_pool().await;
    let app = app(pool);

    let email = signed_up_and_verified(&app, "gate-supersede").await;
    let first = login(&app, &email).await;
    // JWTs carry second-granularity timestamps; make sure the second token
    // differs from the first
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    let second = login(&app, &email).await;
    assert_ne!(first, second);

    let response = send(&app, "GET", "/api/users/current", Some(&first), None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(&app, "GET", "/api/users/current", Some(&second), None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
#[ignore] // Requires database
async fn favorite_update_requires_the_flag_in_the_body() {
    let pool = test_pool().await;
    let app = app(pool);

    let email = signed_up_and_verified(&app, "gate-favorite").await;
    let token = login(&app, &email).await;

    let response = send(
        &app,
        "POST",
        "/api/contacts",
        Some(&token),
        Some(r#"{"name": "Ada", "email": "ada@example.com", "phone": "555-0100"}"#),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let contact = body_json(response).await;
    let contact_id = contact["id"].as_str().unwrap().to_string();

    // Valid token, but a body missing `favorite` is a 400
    let response = send(
        &app,
        "PATCH",
        &format!("/api/contacts/{contact_id}/favorite"),
        Some(&token),
        Some("{}"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore] // Requires database
async fn list_contacts_is_owner_scoped() {
    let pool = test_pool().await;
    let (owner_a, token_a) = create_unverified_user(&pool, &unique_email("owner-a")).await;
    let (owner_b, token_b) = create_unverified_user(&pool, &unique_email("owner-b")).await;
    let manager = VerificationManager::new(pool.clone());
    manager.consume(&token_a).await.expect("verify a");
    manager.consume(&token_b).await.expect("verify b");

    let contact_id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO contacts (id, name, email, phone, favorite, owner)
        VALUES ($1, 'Ada', 'ada@example.com', '555-0100', FALSE, $2)
        "#,
    )
    .bind(contact_id)
    .bind(owner_a)
    .execute(&pool)
    .await
    .expect("insert contact");

    let b_sees: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM contacts WHERE owner = $1")
        .bind(owner_b)
        .fetch_all(&pool)
        .await
        .expect("list b");
    assert!(b_sees.iter().all(|(id,)| *id != contact_id));

    // Owner-scoped delete by the wrong owner touches nothing
    let result = sqlx::query("DELETE FROM contacts WHERE id = $1 AND owner = $2")
        .bind(contact_id)
        .bind(owner_b)
        .execute(&pool)
        .await
        .expect("delete attempt");
    assert_eq!(result.rows_affected(), 0);
}
