//! Health check endpoints.

use super::AppState;
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

static START_TIME: OnceLock<u64> = OnceLock::new();

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

pub fn init_start_time() {
    START_TIME.get_or_init(now_secs);
}

/// GET /health - Health check endpoint
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let uptime = now_secs().saturating_sub(START_TIME.get().copied().unwrap_or_else(now_secs));

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime,
        "node": state.node_name,
        "namespace": state.namespace,
        "recovery": state.recovery.as_ref(),
    }))
}

/// GET /version - Version information endpoint
pub async fn version() -> Json<Value> {
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recovery::RecoveryReport;

    #[tokio::test]
    async fn test_health_reports_recovery() {
        init_start_time();
        let report = RecoveryReport {
            failed_backups: vec!["pvb-1".to_string()],
            errors: 2,
            ..Default::default()
        };
        let state = AppState::new("node-1", "backup-system", report);

        let Json(body) = health(State(state)).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["node"], "node-1");
        assert_eq!(body["recovery"]["failed_backups"][0], "pvb-1");
        assert_eq!(body["recovery"]["errors"], 2);
        assert!(body["uptime_secs"].is_u64());
    }

    #[tokio::test]
    async fn test_version() {
        let Json(body) = version().await;
        assert_eq!(body["name"], "volume-agent");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
