//! driftfeed-server library - personalized feed microservice
//!
//! Assembles cursor-paginated feed pages from scored content candidates,
//! records view history, accepts interest events from the client-side
//! detector, and migrates session-scoped history to authenticated users.

use axum::Router;
use driftfeed_common::params::FeedParams;
use sqlx::SqlitePool;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;

pub use error::{Error, Result};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Feed assembly parameters loaded at startup
    pub params: FeedParams,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, params: FeedParams) -> Self {
        Self { db, params }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{delete, get, post};

    Router::new()
        .route("/api/feed", get(api::get_feed))
        .route("/api/interest-event", post(api::post_interest_event))
        .route("/api/view-record", post(api::post_view_record))
        .route("/api/seen-ids", get(api::get_seen_ids))
        .route("/api/history", get(api::get_history))
        .route("/api/history", delete(api::delete_history))
        .route("/api/identity/migrate", post(api::post_migrate_identity))
        .merge(api::health_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
