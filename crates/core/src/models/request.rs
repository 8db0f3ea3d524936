use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::sample_spec::SampleSpec;
use super::timestamp;
use crate::errors::{GentlyError, GentlyResult};

/// 实验请求状态
///
/// 状态流转并非线性：审批时是否给出 `scheduled_date` 决定进入 `approved`
/// 还是 `scheduled`；`completed`/`failed`/`cancelled` 为终止状态。本层不校验
/// 源状态，任何流转都被接受。
///
/// ```text
/// submitted → under_review → approved ──→ scheduled → in_progress → completed
///     │                          ↑                          ├──→ failed
///     ├──→ rejected              │                          └──→ cancelled
///     └──→ revision_requested ───┘ (人工重新提交)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    UnderReview,
    Approved,
    Rejected,
    RevisionRequested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
    Failed,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 10] = [
        RequestStatus::Submitted,
        RequestStatus::UnderReview,
        RequestStatus::Approved,
        RequestStatus::Rejected,
        RequestStatus::RevisionRequested,
        RequestStatus::Scheduled,
        RequestStatus::InProgress,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
        RequestStatus::Failed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Submitted => "submitted",
            RequestStatus::UnderReview => "under_review",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
            RequestStatus::RevisionRequested => "revision_requested",
            RequestStatus::Scheduled => "scheduled",
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
            RequestStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestStatus::Completed | RequestStatus::Failed | RequestStatus::Cancelled
        )
    }
}

impl FromStr for RequestStatus {
    type Err = GentlyError;

    fn from_str(s: &str) -> GentlyResult<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                GentlyError::unknown_variant("请求状态", s, &Self::ALL.map(|status| status.as_str()))
            })
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 请求优先级，按 `urgent < high < medium < low` 排序（紧急的排在前面）
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Urgent,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub const ALL: [Priority; 4] = [Priority::Urgent, Priority::High, Priority::Medium, Priority::Low];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn sort_order(&self) -> u8 {
        match self {
            Priority::Urgent => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl FromStr for Priority {
    type Err = GentlyError;

    fn from_str(s: &str) -> GentlyResult<Self> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| {
                GentlyError::unknown_variant("优先级", s, &Self::ALL.map(|priority| priority.as_str()))
            })
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 实验申请人，随请求创建后不再修改
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Requester {
    pub name: String,
    pub email: String,
    pub institution: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub orcid: Option<String>,
}

impl Requester {
    pub fn new<S: Into<String>>(name: S, email: S, institution: S) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            institution: institution.into(),
            department: None,
            country: None,
            orcid: None,
        }
    }
}

/// 审核信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReviewInfo {
    pub reviewer_name: Option<String>,
    pub reviewer_email: Option<String>,
    #[serde(deserialize_with = "timestamp::deserialize_option")]
    pub review_date: Option<DateTime<Utc>>,
    pub comments: Option<String>,
    pub requested_modifications: Vec<String>,
}

/// 排期信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulingInfo {
    pub scheduled_date: Option<String>,
    pub assigned_microscope_id: Option<String>,
    pub estimated_start: Option<String>,
    pub estimated_end: Option<String>,
}

/// 执行跟踪信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ExecutionInfo {
    #[serde(deserialize_with = "timestamp::deserialize_option")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(deserialize_with = "timestamp::deserialize_option")]
    pub end_time: Option<DateTime<Utc>>,
    pub actual_microscope_id: Option<String>,
    pub operator: Option<String>,
    pub completion_status: Option<String>,
    pub execution_notes: Option<String>,
}

/// 实验结果信息
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ResultsInfo {
    pub data_location: Option<String>,
    pub data_size_gb: Option<f64>,
    pub file_count: Option<u64>,
    pub quality_metrics: BTreeMap<String, serde_json::Value>,
    pub preliminary_analysis: Option<String>,
}

/// 审计记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub event: String,
    pub actor: String,
    #[serde(default)]
    pub details: Option<String>,
}

/// 实验内容：样本规格、目标显微镜系统和科学依据
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentDetails {
    #[serde(default)]
    pub sample_spec: SampleSpec,
    /// 逻辑目标系统名称，是对能力记录的软引用
    pub microscope_system: String,
    pub scientific_rationale: String,
}

/// 实验请求
///
/// 提交后由队列独占持有。审计历史只能通过 [`ExperimentRequest::record_event`]
/// 追加，构造时即写入 `submitted` 记录，因此永不为空。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExperimentRequest {
    pub request_id: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub submission_date: DateTime<Utc>,
    pub status: RequestStatus,
    #[serde(default)]
    pub priority: Priority,
    pub requester: Requester,
    pub experiment: ExperimentDetails,
    #[serde(default)]
    pub review: ReviewInfo,
    #[serde(default)]
    pub scheduling: SchedulingInfo,
    #[serde(default)]
    pub execution: ExecutionInfo,
    #[serde(default)]
    pub results: ResultsInfo,
    #[serde(default)]
    history: Vec<HistoryEntry>,
}

impl ExperimentRequest {
    pub fn new(
        sample_spec: SampleSpec,
        requester: Requester,
        microscope_system: String,
        scientific_rationale: String,
        priority: Priority,
    ) -> Self {
        let mut request = Self {
            request_id: Uuid::new_v4().to_string(),
            submission_date: Utc::now(),
            status: RequestStatus::Submitted,
            priority,
            requester,
            experiment: ExperimentDetails {
                sample_spec,
                microscope_system,
                scientific_rationale,
            },
            review: ReviewInfo::default(),
            scheduling: SchedulingInfo::default(),
            execution: ExecutionInfo::default(),
            results: ResultsInfo::default(),
            history: Vec::new(),
        };
        request.record_submission();
        request
    }

    /// 追加一条审计记录
    pub fn record_event<E, A>(&mut self, event: E, actor: A, details: Option<String>)
    where
        E: Into<String>,
        A: Into<String>,
    {
        self.history.push(HistoryEntry {
            timestamp: Utc::now(),
            event: event.into(),
            actor: actor.into(),
            details,
        });
    }

    /// 历史为空的旧记录补写提交事件，保证审计历史非空
    pub fn ensure_history(&mut self) {
        if self.history.is_empty() {
            self.record_submission();
        }
    }

    fn record_submission(&mut self) {
        let actor = self.requester.name.clone();
        self.record_event("submitted", actor, Some("Request submitted".to_string()));
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn microscope_system(&self) -> &str {
        &self.experiment.microscope_system
    }

    pub fn sample_spec(&self) -> &SampleSpec {
        &self.experiment.sample_spec
    }

    pub fn is_pending_review(&self) -> bool {
        matches!(self.status, RequestStatus::Submitted)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 队列统一排序键：先优先级，再提交时间
    pub fn queue_order_key(&self) -> (u8, DateTime<Utc>) {
        (self.priority.sort_order(), self.submission_date)
    }

    pub fn entity_description(&self) -> String {
        format!(
            "实验请求 '{}' (申请人: {}, 系统: {})",
            self.request_id, self.requester.name, self.experiment.microscope_system
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_spec() -> SampleSpec {
        json!({
            "sample_id": "test_sample_001",
            "biological_context": {"cell_line": "HeLa", "passage_number": 12},
            "imaging_parameters": {
                "microscope_type": "light_sheet",
                "channels": [{"name": "GFP", "excitation": 488}]
            }
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    fn new_request(priority: Priority) -> ExperimentRequest {
        ExperimentRequest::new(
            sample_spec(),
            Requester::new("Dr. Test", "test@example.com", "Test University"),
            "DiSPIM".to_string(),
            "Test the system".to_string(),
            priority,
        )
    }

    #[test]
    fn test_new_request_has_single_submitted_entry() {
        let request = new_request(Priority::Medium);

        assert_eq!(request.status, RequestStatus::Submitted);
        assert_eq!(request.history().len(), 1);
        assert_eq!(request.history()[0].event, "submitted");
        assert_eq!(request.history()[0].actor, "Dr. Test");
        assert!(!request.request_id.is_empty());
    }

    #[test]
    fn test_priority_ordering() {
        let mut priorities = vec![Priority::Low, Priority::Urgent, Priority::Medium, Priority::High];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Urgent, Priority::High, Priority::Medium, Priority::Low]
        );
        assert!(Priority::Urgent.sort_order() < Priority::Low.sort_order());
    }

    #[test]
    fn test_parse_rejects_unknown_values() {
        assert_eq!("in_progress".parse::<RequestStatus>().unwrap(), RequestStatus::InProgress);
        assert!("done".parse::<RequestStatus>().unwrap_err().is_validation());
        assert!("asap".parse::<Priority>().unwrap_err().is_validation());
    }

    #[test]
    fn test_round_trip_with_populated_records() {
        let mut original = new_request(Priority::High);
        original.status = RequestStatus::Completed;
        original.review.reviewer_name = Some("Ryan".to_string());
        original.review.requested_modifications = vec!["add controls".to_string()];
        original.scheduling.scheduled_date = Some("2025-11-20T09:00:00".to_string());
        original.execution.start_time = Some(Utc::now());
        original.execution.completion_status = Some("success".to_string());
        original.results.data_location = Some("/data/run-1".to_string());
        original.results.quality_metrics.insert("snr".to_string(), json!(12.5));
        original.record_event("status_changed", "operator", None);

        let encoded = serde_json::to_string(&original).unwrap();
        let restored: ExperimentRequest = serde_json::from_str(&encoded).unwrap();

        assert_eq!(restored, original);
    }

    #[test]
    fn test_round_trip_with_empty_records() {
        let original = new_request(Priority::Low);
        let restored: ExperimentRequest =
            serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(restored, original);
    }

    #[test]
    fn test_persisted_shape_nests_experiment() {
        let value = serde_json::to_value(new_request(Priority::Urgent)).unwrap();

        assert_eq!(value["status"], "submitted");
        assert_eq!(value["priority"], "urgent");
        assert_eq!(value["experiment"]["microscope_system"], "DiSPIM");
        assert_eq!(value["experiment"]["sample_spec"]["sample_id"], "test_sample_001");
        assert_eq!(value["history"][0]["event"], "submitted");
    }

    #[test]
    fn test_missing_nested_records_use_defaults() {
        let request: ExperimentRequest = serde_json::from_value(json!({
            "request_id": "legacy-1",
            "submission_date": "2025-01-01T00:00:00Z",
            "status": "approved",
            "requester": {"name": "A", "email": "a@x.org", "institution": "X"},
            "experiment": {"microscope_system": "confocal", "scientific_rationale": "r"}
        }))
        .unwrap();

        assert_eq!(request.priority, Priority::Medium);
        assert_eq!(request.review, ReviewInfo::default());
        assert!(request.history().is_empty());
        assert!(request.sample_spec().is_empty());
    }

    #[test]
    fn test_ensure_history_backfills_submission() {
        let mut request: ExperimentRequest = serde_json::from_value(json!({
            "request_id": "legacy-2",
            "submission_date": "2025-01-01T00:00:00Z",
            "status": "submitted",
            "requester": {"name": "B", "email": "b@x.org", "institution": "X"},
            "experiment": {"microscope_system": "confocal", "scientific_rationale": "r"}
        }))
        .unwrap();

        request.ensure_history();
        request.ensure_history();
        assert_eq!(request.history().len(), 1);
        assert_eq!(request.history()[0].actor, "B");
    }

    #[test]
    fn test_unknown_status_is_validation_error() {
        let result = serde_json::from_value::<ExperimentRequest>(json!({
            "request_id": "bad",
            "submission_date": "2025-01-01T00:00:00Z",
            "status": "archived",
            "requester": {"name": "B", "email": "b@x.org", "institution": "X"},
            "experiment": {"microscope_system": "confocal", "scientific_rationale": "r"}
        }));
        assert!(GentlyError::from(result.unwrap_err()).is_validation());
    }
}
