use axum::{
    extract::{Path, State},
    response::IntoResponse,
};
use gently_core::GentlyError;
use gently_domain::{BiologicalQuery, SampleSummary};
use serde::{Deserialize, Serialize};

use crate::{
    error::ApiResult,
    extract::{parse_optional, split_list, ApiJson, ApiQuery},
    response::success,
    routes::AppState,
};

/// GET检索参数，列表字段以逗号分隔
#[derive(Debug, Default, Deserialize)]
pub struct SampleSearchParams {
    pub cell_line: Option<String>,
    pub organism: Option<String>,
    pub tissue_type: Option<String>,
    pub genetic_modifications: Option<String>,
    pub fluorescent_proteins: Option<String>,
    pub antibody_targets: Option<String>,
    pub fluorophores: Option<String>,
    pub nuclear_stain: Option<String>,
    pub compound_names: Option<String>,
    pub microscope_type: Option<String>,
    pub has_z_stack: Option<bool>,
    pub has_time_lapse: Option<bool>,
    pub live_cell: Option<bool>,
    pub status: Option<String>,
}

impl TryFrom<SampleSearchParams> for BiologicalQuery {
    type Error = GentlyError;

    fn try_from(params: SampleSearchParams) -> Result<Self, Self::Error> {
        Ok(BiologicalQuery {
            cell_line: params.cell_line,
            organism: params.organism,
            tissue_type: params.tissue_type,
            genetic_modifications: split_list(params.genetic_modifications.as_deref()),
            fluorescent_proteins: split_list(params.fluorescent_proteins.as_deref()),
            antibody_targets: split_list(params.antibody_targets.as_deref()),
            fluorophores: split_list(params.fluorophores.as_deref()),
            nuclear_stain: params.nuclear_stain,
            compound_names: split_list(params.compound_names.as_deref()),
            microscope_type: params.microscope_type,
            has_z_stack: params.has_z_stack,
            has_time_lapse: params.has_time_lapse,
            live_cell: params.live_cell,
            status: parse_optional(params.status.as_deref())?,
        })
    }
}

/// 检索结果：回显生效的查询条件和命中的样本摘要
#[derive(Debug, Serialize)]
pub struct SampleSearchResult {
    pub count: usize,
    pub query: BiologicalQuery,
    pub samples: Vec<SampleSummary>,
}

pub async fn search_samples_get(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<SampleSearchParams>,
) -> ApiResult<impl IntoResponse> {
    let query = BiologicalQuery::try_from(params)?;
    Ok(success(search(&state, query).await))
}

pub async fn search_samples_post(
    State(state): State<AppState>,
    ApiJson(query): ApiJson<BiologicalQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(success(search(&state, query).await))
}

async fn search(state: &AppState, query: BiologicalQuery) -> SampleSearchResult {
    let queue = state.queue.read().await;
    let samples: Vec<SampleSummary> = queue
        .find_by_biology(&query)
        .into_iter()
        .map(SampleSummary::from_request)
        .collect();

    SampleSearchResult {
        count: samples.len(),
        query,
        samples,
    }
}

pub async fn get_sample_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let summary = state
        .queue
        .read()
        .await
        .sample_summary(&id)
        .ok_or_else(|| GentlyError::request_not_found(&id))?;
    Ok(success(summary))
}
