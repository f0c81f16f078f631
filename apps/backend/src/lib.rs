pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use progress_core::Leitner;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::ServerConfig;
use crate::db::Database;
use crate::services::aggregator::Aggregator;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub aggregator: Arc<Aggregator>,
    pub scheduler: Leitner,
}

impl AppState {
    pub fn new(db: Arc<Database>, config: &ServerConfig) -> Self {
        Self {
            aggregator: Arc::new(Aggregator::new(Arc::clone(&db), config.thresholds)),
            db,
            scheduler: Leitner::default(),
        }
    }
}

/// Build the router with all routes.
pub fn app(state: AppState) -> Router {
    let protected_routes = Router::new()
        // Activity routes
        .route("/api/activity-track", post(routes::activity::track))
        .route(
            "/api/planner/process-activities",
            post(routes::planner::process_activities),
        )
        .route("/api/user/daily-progress", get(routes::progress::daily))
        // Card routes
        .route("/api/cards", post(routes::cards::create))
        .route("/api/cards/due", get(routes::cards::due))
        .route("/api/cards/review", post(routes::cards::review))
        .route("/api/cards/bulk-delete", delete(routes::cards::bulk_delete))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::auth::auth_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/owner/register", post(routes::owner::register))
        .merge(protected_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    tracing::info!("Connecting to database...");
    let db = Database::connect(&config.database_url, config.max_connections).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    tracing::info!(thresholds = ?config.thresholds, "Aggregation thresholds loaded");

    let state = AppState::new(Arc::new(db), &config);
    let app = app(state);

    let addr = config.bind_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
