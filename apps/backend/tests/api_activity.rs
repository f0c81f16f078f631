//! Activity ingestion, aggregation and daily progress API tests.
//!
//! These tests require a running PostgreSQL database.
//! Set DATABASE_URL environment variable before running.

mod common;

use axum::http::StatusCode;
use axum_test::TestServer;
use chrono::{Duration, NaiveDate, Utc};

use common::fixtures;
use common::TestContext;
use lingo_progress_backend::models::ActivityType;

fn test_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
}

/// Test ingestion stores an event and returns its id.
#[tokio::test]
#[ignore = "requires database"]
async fn test_track_activity_returns_event_id() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;
    let (name, value) = TestContext::auth_header(&token);

    let response = server
        .post("/api/activity-track")
        .add_header(name, value)
        .json(&fixtures::track_request("video", 12, "/videos/v1"))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert!(body["event_id"].as_str().is_some());

    let events = ctx
        .db
        .get_unconsumed_events(owner_id, Utc::now().date_naive())
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].activity_type, "video");

    ctx.cleanup_owner(owner_id).await;
}

/// Test ingestion rejects zero and negative durations.
#[tokio::test]
#[ignore = "requires database"]
async fn test_track_activity_rejects_non_positive_duration() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;

    for duration in [0, -5] {
        let (name, value) = TestContext::auth_header(&token);
        let response = server
            .post("/api/activity-track")
            .add_header(name, value)
            .json(&fixtures::track_request("words", duration, "/words/review"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    ctx.cleanup_owner(owner_id).await;
}

/// Test ingestion rejects a body naming a different owner.
#[tokio::test]
#[ignore = "requires database"]
async fn test_track_activity_rejects_foreign_owner() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;
    let (name, value) = TestContext::auth_header(&token);

    let response = server
        .post("/api/activity-track")
        .add_header(name, value)
        .json(&fixtures::track_request_for(uuid::Uuid::new_v4(), "video", 12))
        .await;

    response.assert_status(StatusCode::FORBIDDEN);

    ctx.cleanup_owner(owner_id).await;
}

/// Test split events sum past the threshold and a rerun changes nothing.
#[tokio::test]
#[ignore = "requires database"]
async fn test_process_activities_sums_and_is_idempotent() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;
    let morning = test_day().and_hms_opt(9, 0, 0).unwrap().and_utc();

    ctx.insert_event_at(owner_id, ActivityType::Video, 4, morning).await;
    ctx.insert_event_at(owner_id, ActivityType::Video, 7, morning + Duration::minutes(1))
        .await;

    let (name, value) = TestContext::auth_header(&token);
    let first = server
        .post("/api/planner/process-activities")
        .add_header(name, value)
        .json(&fixtures::process_request(Some(test_day())))
        .await;
    first.assert_status_ok();
    let first: serde_json::Value = first.json();

    assert_eq!(first["success"], true);
    assert_eq!(first["data"]["updated"], true);
    assert_eq!(first["data"]["progress"]["video_watched"], true);
    assert_eq!(first["data"]["progress"]["progress_percent"], 25);
    assert_eq!(first["data"]["newly_achieved"], serde_json::json!(["video"]));

    let (name, value) = TestContext::auth_header(&token);
    let second = server
        .post("/api/planner/process-activities")
        .add_header(name, value)
        .json(&fixtures::process_request(Some(test_day())))
        .await;
    let second: serde_json::Value = second.json();

    assert_eq!(second["data"]["updated"], false);
    assert_eq!(second["data"]["progress"], first["data"]["progress"]);

    ctx.cleanup_owner(owner_id).await;
}

/// Test all four types complete the day.
#[tokio::test]
#[ignore = "requires database"]
async fn test_process_activities_completes_day() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;
    let morning = test_day().and_hms_opt(9, 0, 0).unwrap().and_utc();

    for activity_type in ActivityType::ALL {
        ctx.insert_event_at(owner_id, activity_type, 15, morning).await;
    }

    let (name, value) = TestContext::auth_header(&token);
    let response = server
        .post("/api/planner/process-activities")
        .add_header(name, value)
        .json(&fixtures::process_request(Some(test_day())))
        .await;
    let body: serde_json::Value = response.json();

    assert_eq!(body["data"]["progress"]["progress_percent"], 100);
    assert!(body["data"]["progress"]["completed_at"].is_string());

    let (name, value) = TestContext::auth_header(&token);
    let snapshot = server
        .get("/api/user/daily-progress")
        .add_query_param("day", test_day())
        .add_header(name, value)
        .await;
    snapshot.assert_status_ok();
    let snapshot: serde_json::Value = snapshot.json();
    assert_eq!(snapshot["completed_at"], body["data"]["progress"]["completed_at"]);

    ctx.cleanup_owner(owner_id).await;
}

/// Test reading progress for a day without a row returns an empty record.
#[tokio::test]
#[ignore = "requires database"]
async fn test_daily_progress_defaults_to_empty() {
    let ctx = TestContext::new().await;
    let server = TestServer::new(ctx.router()).unwrap();
    let (owner_id, token) = ctx.create_test_owner(None).await;
    let (name, value) = TestContext::auth_header(&token);

    let response = server
        .get("/api/user/daily-progress")
        .add_header(name, value)
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["progress_percent"], 0);
    assert_eq!(body["video_watched"], false);
    assert!(body["completed_at"].is_null());

    ctx.cleanup_owner(owner_id).await;
}
