//! Common test utilities and fixtures for integration tests.
//!
//! This module provides shared test infrastructure including:
//! - TestContext for setting up test environment with database
//! - Helper functions for creating test data
//! - Authentication helpers
//!
//! # Requirements
//! Integration tests require a PostgreSQL database (set DATABASE_URL env var).

#![allow(dead_code)]

pub mod fixtures;

use std::sync::Arc;

use axum::http::{header::AUTHORIZATION, HeaderName, HeaderValue};
use axum::Router;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use lingo_progress_backend::config::ServerConfig;
use lingo_progress_backend::db::Database;
use lingo_progress_backend::models::{ActivityType, DbActivityEvent, DbFlashCard};
use lingo_progress_backend::{app, AppState};

/// Test context containing database connection and test router.
///
/// Requires DATABASE_URL environment variable to be set.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// # Panics
    /// Panics if DATABASE_URL is not set or database connection fails.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let config = ServerConfig::from_env().expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&config.database_url, 5)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        let db = Arc::new(db);
        let app = app(AppState::new(db.clone(), &config));

        Self { db, app }
    }

    /// Get the router for use with axum-test.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Create a test owner and return its ID and token.
    pub async fn create_test_owner(&self, name: Option<&str>) -> (Uuid, String) {
        let owner = self
            .db
            .create_owner(name)
            .await
            .expect("Failed to create test owner");
        (owner.id, owner.token)
    }

    /// Authorization header for a token.
    pub fn auth_header(token: &str) -> (HeaderName, HeaderValue) {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .expect("token is a valid header value");
        (AUTHORIZATION, value)
    }

    /// Insert an activity event with an explicit timestamp.
    pub async fn insert_event_at(
        &self,
        owner_id: Uuid,
        activity_type: ActivityType,
        duration_seconds: i32,
        created_at: DateTime<Utc>,
    ) -> Uuid {
        self.db
            .insert_event(&DbActivityEvent {
                id: Uuid::new_v4(),
                owner_id,
                activity_type: activity_type.as_str().to_string(),
                content_id: None,
                duration_seconds,
                pathname: "/test".to_string(),
                created_at,
                consumed: false,
                consumed_at: None,
            })
            .await
            .expect("Failed to insert event")
    }

    /// Insert a card directly, bypassing the API.
    pub async fn insert_card(&self, owner_id: Uuid, box_number: i32) -> Uuid {
        let now = Utc::now();
        self.db
            .insert_card(&DbFlashCard {
                id: Uuid::new_v4(),
                owner_id,
                front: "el perro".to_string(),
                back: "the dog".to_string(),
                box_number,
                next_review_at: now,
                created_at: now,
            })
            .await
            .expect("Failed to insert card")
            .id
    }

    /// Clean up test data for an owner.
    ///
    /// Cards, events and progress rows cascade from the owner row.
    pub async fn cleanup_owner(&self, owner_id: Uuid) {
        let _ = sqlx::query("DELETE FROM owners WHERE id = $1")
            .bind(owner_id)
            .execute(self.db.pool())
            .await;
    }
}
