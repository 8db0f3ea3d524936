use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use gently_core::models::{Priority, RequestStatus, Requester, SampleSpec};
use gently_core::GentlyError;
use gently_domain::{RequestFilter, StatusUpdate, Submission};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    error::ApiResult,
    extract::{parse_optional, ApiJson, ApiQuery},
    response::{created, success, success_with_message, ListResponse},
    routes::AppState,
};

/// 实验提交请求体
#[derive(Debug, Deserialize)]
pub struct SubmitExperimentRequest {
    pub sample_spec: SampleSpec,
    pub requester: Requester,
    pub experiment: ExperimentPayload,
}

#[derive(Debug, Deserialize)]
pub struct ExperimentPayload {
    pub microscope_system: String,
    pub scientific_rationale: String,
    #[serde(default)]
    pub priority: Priority,
}

impl From<SubmitExperimentRequest> for Submission {
    fn from(body: SubmitExperimentRequest) -> Self {
        Submission {
            sample_spec: body.sample_spec,
            requester: body.requester,
            microscope_system: body.experiment.microscope_system,
            scientific_rationale: body.experiment.scientific_rationale,
            priority: body.experiment.priority,
        }
    }
}

/// 实验列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct ExperimentQueryParams {
    pub status: Option<String>,
    pub microscope: Option<String>,
    pub priority: Option<String>,
    pub requester: Option<String>,
}

impl ExperimentQueryParams {
    fn into_filter(self) -> Result<RequestFilter, GentlyError> {
        Ok(RequestFilter {
            status: parse_optional(self.status.as_deref())?,
            microscope_system: self.microscope,
            priority: parse_optional(self.priority.as_deref())?,
            requester_email: self.requester,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct RequestStatusView {
    pub request_id: String,
    pub status: RequestStatus,
}

/// 提交实验请求
pub async fn submit_experiment(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SubmitExperimentRequest>,
) -> ApiResult<impl IntoResponse> {
    let request = state.queue.write().await.submit(body.into())?;

    state.notifications.notify_new_submission(&request).await;

    Ok(created(
        RequestStatusView {
            request_id: request.request_id,
            status: request.status,
        },
        "Experiment request submitted successfully",
    ))
}

/// 获取实验请求详情
pub async fn get_experiment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let queue = state.queue.read().await;
    let request = queue
        .get(&id)
        .ok_or_else(|| GentlyError::request_not_found(&id))?;
    Ok(success(request.clone()))
}

/// 获取实验请求列表
pub async fn list_experiments(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<ExperimentQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = params.into_filter()?;
    let queue = state.queue.read().await;
    let requests = queue.list(&filter).into_iter().cloned().collect();
    Ok(success(ListResponse::new(requests)))
}

/// 更新实验执行状态
///
/// 完成时向申请人发送结果通知，其余状态发送通用的状态变更通知。
pub async fn update_experiment_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(update): ApiJson<StatusUpdate>,
) -> ApiResult<impl IntoResponse> {
    let (request, old_status) = {
        let mut queue = state.queue.write().await;
        let old_status = queue
            .get(&id)
            .map(|request| request.status)
            .ok_or_else(|| GentlyError::request_not_found(&id))?;
        (queue.update_status(&id, update)?, old_status)
    };

    if request.status == RequestStatus::Completed {
        state.notifications.notify_completion(&request).await;
    } else {
        state
            .notifications
            .notify_status_change(&request, old_status)
            .await;
    }

    Ok(success_with_message(
        json!({
            "request_id": request.request_id,
            "status": request.status,
        }),
        format!("Status updated to {}", request.status),
    ))
}
