use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use gently_core::models::{MicroscopeCapability, MicroscopeStatus};
use gently_core::GentlyError;
use gently_domain::{CapabilityRequirements, MicroscopeFilter};
use serde::Deserialize;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    extract::{parse_optional, split_list, ApiJson, ApiQuery},
    response::{created, success, success_with_message, ListResponse},
    routes::AppState,
};

/// 显微镜列表查询参数
#[derive(Debug, Default, Deserialize)]
pub struct MicroscopeQueryParams {
    #[serde(rename = "type")]
    pub microscope_type: Option<String>,
    pub status: Option<String>,
    pub capability: Option<String>,
}

/// 能力匹配查询参数
#[derive(Debug, Default, Deserialize)]
pub struct FindMicroscopeParams {
    #[serde(rename = "type")]
    pub microscope_type: Option<String>,
    pub capability: Option<String>,
    pub wavelength: Option<String>,
    pub magnification: Option<u32>,
    pub available: Option<bool>,
}

impl FindMicroscopeParams {
    fn into_requirements(self) -> ApiResult<CapabilityRequirements> {
        let required_wavelengths = split_list(self.wavelength.as_deref())
            .unwrap_or_default()
            .iter()
            .map(|wl| {
                wl.parse::<u32>()
                    .map_err(|_| ApiError::bad_request(format!("无效的波长: {}", wl)))
            })
            .collect::<ApiResult<Vec<u32>>>()?;

        Ok(CapabilityRequirements {
            microscope_type: parse_optional(self.microscope_type.as_deref())?,
            required_capabilities: split_list(self.capability.as_deref()).unwrap_or_default(),
            required_wavelengths,
            required_magnification: self.magnification,
            only_available: self.available.unwrap_or(true),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MicroscopeStatusBody {
    pub status: MicroscopeStatus,
}

pub async fn list_microscopes(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<MicroscopeQueryParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = MicroscopeFilter {
        microscope_type: parse_optional(params.microscope_type.as_deref())?,
        status: parse_optional(params.status.as_deref())?,
        capability: params.capability,
    };

    let registry = state.registry.read().await;
    let microscopes: Vec<MicroscopeCapability> =
        registry.list(&filter).into_iter().cloned().collect();
    Ok(success(ListResponse::new(microscopes)))
}

pub async fn get_microscope(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let registry = state.registry.read().await;
    let microscope = registry
        .get(&id)
        .cloned()
        .ok_or_else(|| GentlyError::microscope_not_found(&id))?;
    Ok(success(microscope))
}

/// 注册显微镜，同ID的已有记录被整体替换
pub async fn register_microscope(
    State(state): State<AppState>,
    ApiJson(microscope): ApiJson<MicroscopeCapability>,
) -> ApiResult<impl IntoResponse> {
    let microscope = state.registry.write().await.register(microscope)?;

    Ok(created(
        json!({ "microscope_id": microscope.microscope_id }),
        "Microscope registered",
    ))
}

pub async fn unregister_microscope(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state.registry.write().await.unregister(&id)? {
        return Err(GentlyError::microscope_not_found(&id).into());
    }

    Ok(success_with_message(
        json!({ "microscope_id": id }),
        "Microscope unregistered",
    ))
}

pub async fn update_microscope_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ApiJson(body): ApiJson<MicroscopeStatusBody>,
) -> ApiResult<impl IntoResponse> {
    if !state.registry.write().await.update_status(&id, body.status)? {
        return Err(GentlyError::microscope_not_found(&id).into());
    }

    Ok(success_with_message(
        json!({ "microscope_id": id, "status": body.status }),
        format!("Status updated to {}", body.status),
    ))
}

pub async fn microscope_heartbeat(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    if !state.registry.write().await.heartbeat(&id)? {
        return Err(GentlyError::microscope_not_found(&id).into());
    }

    Ok(success_with_message(
        json!({
            "microscope_id": id,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }),
        "Heartbeat recorded",
    ))
}

/// 按能力要求匹配显微镜，结果按在线率和完成实验数排序
pub async fn find_microscopes(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<FindMicroscopeParams>,
) -> ApiResult<impl IntoResponse> {
    let requirements = params.into_requirements()?;

    let registry = state.registry.read().await;
    let matches: Vec<MicroscopeCapability> = registry
        .find_suitable(&requirements)
        .into_iter()
        .cloned()
        .collect();
    Ok(success(ListResponse::new(matches)))
}
