use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use gently_core::models::ExperimentRequest;
use gently_domain::{Approval, Rejection, RevisionRequest};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    extract::{ApiJson, ApiQuery},
    response::{success, success_with_message, ListResponse},
    routes::AppState,
};

#[derive(Debug, Default, Deserialize)]
pub struct MicroscopeParam {
    pub microscope: Option<String>,
}

/// 审核操作结果
#[derive(Debug, Serialize)]
pub struct ReviewOutcome {
    pub request_id: String,
    pub status: String,
}

impl From<&ExperimentRequest> for ReviewOutcome {
    fn from(request: &ExperimentRequest) -> Self {
        Self {
            request_id: request.request_id.clone(),
            status: request.status.as_str().to_string(),
        }
    }
}

/// 待审核的实验请求
pub async fn get_pending_reviews(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MicroscopeParam>,
) -> ApiResult<impl IntoResponse> {
    let queue = state.queue.read().await;
    let pending: Vec<ExperimentRequest> = queue
        .get_pending_review(params.microscope)
        .into_iter()
        .cloned()
        .collect();
    Ok(success(ListResponse::new(pending)))
}

/// 已批准、等待执行的实验队列
pub async fn get_approved_queue(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MicroscopeParam>,
) -> ApiResult<impl IntoResponse> {
    let queue = state.queue.read().await;
    let approved: Vec<ExperimentRequest> = queue
        .get_approved_queue(params.microscope)
        .into_iter()
        .cloned()
        .collect();
    Ok(success(ListResponse::new(approved)))
}

pub async fn approve_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(approval): ApiJson<Approval>,
) -> ApiResult<impl IntoResponse> {
    let request = state.queue.write().await.approve(&id, approval)?;
    state.notifications.notify_approval(&request).await;

    Ok(success_with_message(
        ReviewOutcome::from(&request),
        "Experiment approved",
    ))
}

pub async fn reject_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(rejection): ApiJson<Rejection>,
) -> ApiResult<impl IntoResponse> {
    let request = state.queue.write().await.reject(&id, rejection)?;
    state.notifications.notify_rejection(&request).await;

    Ok(success_with_message(
        ReviewOutcome::from(&request),
        "Experiment rejected",
    ))
}

pub async fn request_revision(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(revision): ApiJson<RevisionRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.queue.write().await.request_revision(&id, revision)?;
    state.notifications.notify_revision(&request).await;

    Ok(success_with_message(
        ReviewOutcome::from(&request),
        "Revision requested",
    ))
}
