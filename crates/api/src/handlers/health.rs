use axum::{extract::State, Json};
use gently_core::models::MicroscopeStatus;
use serde_json::{json, Value};

use crate::routes::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let queue_size = state.queue.read().await.len();
    let microscopes_online = state
        .registry
        .read()
        .await
        .count_by_status(MicroscopeStatus::Online);

    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "queue_size": queue_size,
        "microscopes_online": microscopes_online,
    }))
}

pub async fn api_info() -> Json<Value> {
    Json(json!({
        "name": "gently-meta",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Multi-microscope coordination infrastructure",
        "endpoints": {
            "experiments": "/api/v1/experiments",
            "review": "/api/v1/review",
            "queue": "/api/v1/queue",
            "samples": "/api/v1/samples",
            "microscopes": "/api/v1/microscopes",
            "stats": "/api/v1/stats",
        }
    }))
}
