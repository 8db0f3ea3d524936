use axum::{extract::State, response::IntoResponse};
use gently_domain::{QueueStats, RegistryStats};
use serde::Serialize;

use crate::{error::ApiResult, response::success, routes::AppState};

/// 系统统计
#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub queue: QueueStats,
    pub microscopes: RegistryStats,
}

pub async fn get_stats(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let queue = state.queue.read().await.get_stats();
    let microscopes = state.registry.read().await.stats();

    Ok(success(SystemStats {
        timestamp: chrono::Utc::now(),
        queue,
        microscopes,
    }))
}
