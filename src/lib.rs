//! Pricing service for koalixcrm sales documents.

pub mod cache;
pub mod config;
pub mod error;
pub mod pricing;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;

use crate::cache::AppCache;

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub cache: AppCache,
}

/// Build the application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(pricing::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
