//! Owner registration and authentication API tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable before running.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;

use common::fixtures;
use common::TestContext;

/// Test owner registration without a name.
#[tokio::test]
#[ignore = "requires database"]
async fn test_register_owner_without_name() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server
        .post("/api/owner/register")
        .json(&fixtures::owner_register_request(None))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();

    assert!(body.get("owner_id").is_some());
    assert!(body["token"].as_str().unwrap().len() > 10);

    // Cleanup
    let owner_id = uuid::Uuid::parse_str(body["owner_id"].as_str().unwrap()).unwrap();
    ctx.cleanup_owner(owner_id).await;
}

/// Test health check is public.
#[tokio::test]
#[ignore = "requires database"]
async fn test_health_check() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.get("/health").await;

    response.assert_status_ok();
    response.assert_text("OK");
}

/// Test protected routes reject missing tokens.
#[tokio::test]
#[ignore = "requires database"]
async fn test_protected_route_requires_auth() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();

    let response = server.get("/api/cards/due").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

/// Test protected routes reject unknown tokens.
#[tokio::test]
#[ignore = "requires database"]
async fn test_protected_route_rejects_unknown_token() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (name, value) = TestContext::auth_header("not-a-real-token");

    let response = server.get("/api/user/daily-progress").add_header(name, value).await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}
