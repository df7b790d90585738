//! HTTP API of the volume agent.

pub mod health;

use crate::recovery::RecoveryReport;
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub node_name: String,
    pub namespace: String,
    /// Outcome of the startup recovery sweep
    pub recovery: Arc<RecoveryReport>,
}

impl AppState {
    pub fn new(node_name: impl Into<String>, namespace: impl Into<String>, recovery: RecoveryReport) -> Self {
        Self {
            node_name: node_name.into(),
            namespace: namespace.into(),
            recovery: Arc::new(recovery),
        }
    }
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
