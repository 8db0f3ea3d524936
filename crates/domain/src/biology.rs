//! 生物学检索
//!
//! 在样本规格上做只读谓词匹配。查询的各字段彼此独立且都是可选的，只有给出
//! 的字段参与判断，全部通过才算命中：
//!
//! - 文本字段：忽略大小写的子串匹配，目标字段缺失即不命中
//! - 列表字段：忽略大小写的交集非空，目标列表为空即不命中
//! - 布尔字段：与派生布尔值精确相等，来源数据缺失时派生值为 false
//! - `status`：与请求当前状态精确相等

use std::collections::HashSet;

use gently_core::models::{
    sample_spec::{BIOLOGICAL_CONTEXT, IMAGING_PARAMETERS, STAINING_PROTOCOL},
    ExperimentRequest, RequestStatus, SpecView,
};
use serde::{Deserialize, Serialize};

/// 生物学检索条件
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BiologicalQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cell_line: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organism: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tissue_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub genetic_modifications: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluorescent_proteins: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub antibody_targets: Option<Vec<String>>,
    /// 同时匹配二抗荧光基团和荧光蛋白名称
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluorophores: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nuclear_stain: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub compound_names: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub microscope_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_z_stack: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_time_lapse: Option<bool>,
    /// `fixation_method == "live"`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_cell: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<RequestStatus>,
}

impl BiologicalQuery {
    /// 未设置任何条件时匹配全部请求
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn matches(&self, request: &ExperimentRequest) -> bool {
        let view = SpecView::new(request.sample_spec());

        text_matches(
            self.cell_line.as_deref(),
            view.text(BIOLOGICAL_CONTEXT, "cell_line"),
        ) && text_matches(
            self.organism.as_deref(),
            view.text(BIOLOGICAL_CONTEXT, "organism"),
        ) && text_matches(
            self.tissue_type.as_deref(),
            view.text(BIOLOGICAL_CONTEXT, "tissue_type"),
        ) && text_matches(
            self.nuclear_stain.as_deref(),
            view.text(STAINING_PROTOCOL, "nuclear_stain"),
        ) && text_matches(
            self.microscope_type.as_deref(),
            view.text(IMAGING_PARAMETERS, "microscope_type"),
        ) && any_overlap(
            self.genetic_modifications.as_deref(),
            || view.genetic_modifications(),
        ) && any_overlap(self.fluorescent_proteins.as_deref(), || {
            view.fluorescent_protein_names()
        }) && any_overlap(self.antibody_targets.as_deref(), || view.antibody_targets())
            && any_overlap(self.fluorophores.as_deref(), || view.fluorophores())
            && any_overlap(self.compound_names.as_deref(), || view.compound_names())
            && flag_matches(self.has_z_stack, view.has_z_stack())
            && flag_matches(self.has_time_lapse, view.has_time_lapse())
            && flag_matches(self.live_cell, view.is_live_cell())
            && self.status.map_or(true, |status| status == request.status)
    }
}

fn text_matches(query: Option<&str>, target: Option<String>) -> bool {
    match (query, target) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(query), Some(target)) => target.to_lowercase().contains(&query.to_lowercase()),
    }
}

fn any_overlap<F>(query: Option<&[String]>, target: F) -> bool
where
    F: FnOnce() -> Vec<String>,
{
    let Some(query) = query else {
        return true;
    };
    let target = target();
    if target.is_empty() {
        return false;
    }

    let wanted: HashSet<String> = query.iter().map(|q| q.to_lowercase()).collect();
    target.iter().any(|t| wanted.contains(&t.to_lowercase()))
}

fn flag_matches(query: Option<bool>, actual: bool) -> bool {
    query.map_or(true, |expected| expected == actual)
}

/// 样本摘要：把样本规格拍平成固定字段，便于列表展示
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SampleSummary {
    pub request_id: String,
    pub status: RequestStatus,
    pub cell_line: Option<String>,
    pub organism: Option<String>,
    pub tissue_type: Option<String>,
    pub genetic_modifications: Vec<String>,
    pub fluorescent_proteins: Vec<String>,
    pub antibody_targets: Vec<String>,
    pub fluorophores: Vec<String>,
    pub nuclear_stain: Option<String>,
    pub microscope_type: Option<String>,
    pub live_cell: bool,
    pub has_z_stack: bool,
    pub has_time_lapse: bool,
    pub requester: String,
    pub institution: String,
}

impl SampleSummary {
    pub fn from_request(request: &ExperimentRequest) -> Self {
        let view = SpecView::new(request.sample_spec());

        Self {
            request_id: request.request_id.clone(),
            status: request.status,
            cell_line: view.text(BIOLOGICAL_CONTEXT, "cell_line"),
            organism: view.text(BIOLOGICAL_CONTEXT, "organism"),
            tissue_type: view.text(BIOLOGICAL_CONTEXT, "tissue_type"),
            genetic_modifications: view.genetic_modifications(),
            fluorescent_proteins: view.fluorescent_protein_names(),
            antibody_targets: view.antibody_targets(),
            fluorophores: view.fluorophores(),
            nuclear_stain: view.text(STAINING_PROTOCOL, "nuclear_stain"),
            microscope_type: view.text(IMAGING_PARAMETERS, "microscope_type"),
            live_cell: view.is_live_cell(),
            has_z_stack: view.has_z_stack(),
            has_time_lapse: view.has_time_lapse(),
            requester: request.requester.name.clone(),
            institution: request.requester.institution.clone(),
        }
    }
}
