//! 实验请求队列
//!
//! 队列独占持有所有实验请求，负责审核、排期和执行跟踪的状态流转。每次变更
//! 都整体写回快照；写入失败时该请求恢复到调用前的状态并返回持久化错误。
//!
//! 状态流转不校验源状态：例如对已完成的请求再次审批也会被接受，流程约束由
//! 调用方负责。

use std::collections::BTreeMap;

use chrono::Utc;
use gently_core::models::{
    ExperimentRequest, Priority, QueueSnapshot, RequestStatus, Requester, SampleSpec,
};
use gently_core::{GentlyError, GentlyResult, SnapshotStore};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::biology::{BiologicalQuery, SampleSummary};

fn default_actor() -> String {
    "system".to_string()
}

/// 新提交的实验
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Submission {
    #[serde(default)]
    pub sample_spec: SampleSpec,
    pub requester: Requester,
    pub microscope_system: String,
    pub scientific_rationale: String,
    #[serde(default)]
    pub priority: Priority,
}

/// 审批通过；给出 `scheduled_date` 时直接进入 `scheduled`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Approval {
    pub reviewer_name: String,
    #[serde(default)]
    pub reviewer_email: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub scheduled_date: Option<String>,
    #[serde(default)]
    pub assigned_microscope_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Rejection {
    pub reviewer_name: String,
    pub comments: String,
    #[serde(default)]
    pub reviewer_email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RevisionRequest {
    pub reviewer_name: String,
    pub requested_modifications: Vec<String>,
    #[serde(default)]
    pub comments: Option<String>,
    #[serde(default)]
    pub reviewer_email: Option<String>,
}

/// 执行跟踪用的通用状态更新
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusUpdate {
    #[serde(rename = "status")]
    pub new_status: RequestStatus,
    #[serde(default = "default_actor")]
    pub actor: String,
    #[serde(default)]
    pub results_location: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl StatusUpdate {
    pub fn new(new_status: RequestStatus) -> Self {
        Self {
            new_status,
            actor: default_actor(),
            results_location: None,
            notes: None,
        }
    }
}

/// 列表过滤条件，各条件之间为与关系
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestFilter {
    pub status: Option<RequestStatus>,
    pub microscope_system: Option<String>,
    pub priority: Option<Priority>,
    pub requester_email: Option<String>,
}

impl RequestFilter {
    pub fn with_status(status: RequestStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn microscope_system(mut self, microscope_system: Option<String>) -> Self {
        self.microscope_system = microscope_system;
        self
    }

    pub fn matches(&self, request: &ExperimentRequest) -> bool {
        self.status.map_or(true, |s| request.status == s)
            && self
                .microscope_system
                .as_deref()
                .map_or(true, |m| request.microscope_system() == m)
            && self.priority.map_or(true, |p| request.priority == p)
            && self
                .requester_email
                .as_deref()
                .map_or(true, |e| request.requester.email == e)
    }
}

/// 队列统计，每次调用时重新计算
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueueStats {
    pub total_requests: usize,
    pub by_status: BTreeMap<String, usize>,
    pub by_microscope: BTreeMap<String, usize>,
    pub by_priority: BTreeMap<String, usize>,
}

/// 实验请求队列
pub struct ExperimentQueue {
    requests: BTreeMap<String, ExperimentRequest>,
    store: Box<dyn SnapshotStore<QueueSnapshot>>,
}

impl ExperimentQueue {
    /// 从存储加载队列，存储为空时得到空队列
    pub fn open(store: Box<dyn SnapshotStore<QueueSnapshot>>) -> GentlyResult<Self> {
        let requests: BTreeMap<_, _> = store
            .load()?
            .map(|snapshot| snapshot.requests)
            .unwrap_or_default()
            .into_iter()
            .map(|mut request| {
                request.ensure_history();
                (request.request_id.clone(), request)
            })
            .collect();

        info!("实验队列已加载，共 {} 个请求", requests.len());
        Ok(Self { requests, store })
    }

    pub fn submit(&mut self, submission: Submission) -> GentlyResult<ExperimentRequest> {
        let request = ExperimentRequest::new(
            submission.sample_spec,
            submission.requester,
            submission.microscope_system,
            submission.scientific_rationale,
            submission.priority,
        );
        let id = request.request_id.clone();
        self.requests.insert(id.clone(), request.clone());

        if let Err(e) = self.persist() {
            self.requests.remove(&id);
            return Err(e);
        }

        info!(
            "新实验请求已提交: {} (系统: {}, 优先级: {})",
            id,
            request.microscope_system(),
            request.priority
        );
        Ok(request)
    }

    pub fn get(&self, request_id: &str) -> Option<&ExperimentRequest> {
        self.requests.get(request_id)
    }

    /// 按过滤条件列出请求，先按优先级、再按提交时间升序排列
    pub fn list(&self, filter: &RequestFilter) -> Vec<&ExperimentRequest> {
        let results = sorted(self.requests.values().filter(|r| filter.matches(r)));
        debug!("实验列表查询返回 {} 条", results.len());
        results
    }

    pub fn approve(
        &mut self,
        request_id: &str,
        approval: Approval,
    ) -> GentlyResult<ExperimentRequest> {
        let updated = self.mutate(request_id, |request| {
            request.status = RequestStatus::Approved;
            request.review.reviewer_name = Some(approval.reviewer_name.clone());
            request.review.reviewer_email = approval.reviewer_email;
            request.review.comments = approval.comments.clone();
            request.review.review_date = Some(Utc::now());

            if let Some(date) = approval.scheduled_date.filter(|d| !d.is_empty()) {
                request.scheduling.scheduled_date = Some(date);
                request.status = RequestStatus::Scheduled;
            }
            if let Some(microscope_id) = approval.assigned_microscope_id {
                request.scheduling.assigned_microscope_id = Some(microscope_id);
            }

            let details = approval
                .comments
                .filter(|c| !c.is_empty())
                .unwrap_or_else(|| "Request approved".to_string());
            request.record_event("approved", approval.reviewer_name, Some(details));
        })?;

        info!("实验请求已批准: {} -> {}", request_id, updated.status);
        Ok(updated)
    }

    pub fn reject(
        &mut self,
        request_id: &str,
        rejection: Rejection,
    ) -> GentlyResult<ExperimentRequest> {
        let updated = self.mutate(request_id, |request| {
            request.status = RequestStatus::Rejected;
            request.review.reviewer_name = Some(rejection.reviewer_name.clone());
            request.review.reviewer_email = rejection.reviewer_email;
            request.review.comments = Some(rejection.comments.clone());
            request.review.review_date = Some(Utc::now());
            request.record_event("rejected", rejection.reviewer_name, Some(rejection.comments));
        })?;

        info!("实验请求已拒绝: {}", request_id);
        Ok(updated)
    }

    pub fn request_revision(
        &mut self,
        request_id: &str,
        revision: RevisionRequest,
    ) -> GentlyResult<ExperimentRequest> {
        let updated = self.mutate(request_id, |request| {
            let details = format!(
                "Modifications requested: {}",
                revision.requested_modifications.join(", ")
            );
            request.status = RequestStatus::RevisionRequested;
            request.review.reviewer_name = Some(revision.reviewer_name.clone());
            request.review.reviewer_email = revision.reviewer_email;
            request.review.comments = revision.comments;
            request.review.review_date = Some(Utc::now());
            request.review.requested_modifications = revision.requested_modifications;
            request.record_event("revision_requested", revision.reviewer_name, Some(details));
        })?;

        info!("实验请求需要修改: {}", request_id);
        Ok(updated)
    }

    /// 通用状态流转
    ///
    /// `in_progress` 记录开始时间；`completed` 记录结束时间、标记成功并保存结果位置；
    /// `failed` 记录结束时间并标记失败。给出 `notes` 时总是覆盖执行备注。
    pub fn update_status(
        &mut self,
        request_id: &str,
        update: StatusUpdate,
    ) -> GentlyResult<ExperimentRequest> {
        let new_status = update.new_status;
        let updated = self.mutate(request_id, |request| {
            let old_status = request.status;
            request.status = new_status;

            match new_status {
                RequestStatus::InProgress => {
                    request.execution.start_time = Some(Utc::now());
                }
                RequestStatus::Completed => {
                    request.execution.end_time = Some(Utc::now());
                    request.execution.completion_status = Some("success".to_string());
                    if let Some(location) = update.results_location {
                        request.results.data_location = Some(location);
                    }
                }
                RequestStatus::Failed => {
                    request.execution.end_time = Some(Utc::now());
                    request.execution.completion_status = Some("failed".to_string());
                }
                _ => {}
            }

            if let Some(notes) = update.notes {
                request.execution.execution_notes = Some(notes);
            }

            request.record_event(
                "status_changed",
                update.actor,
                Some(format!("Status changed from {old_status} to {new_status}")),
            );
        })?;

        info!("实验请求 {} 状态更新为 {}", request_id, new_status);
        Ok(updated)
    }

    pub fn get_pending_review(&self, microscope_system: Option<String>) -> Vec<&ExperimentRequest> {
        self.list(&RequestFilter::with_status(RequestStatus::Submitted).microscope_system(microscope_system))
    }

    /// 已批准的请求在前，已排期的在后，两组各自排序
    pub fn get_approved_queue(&self, microscope_system: Option<String>) -> Vec<&ExperimentRequest> {
        let mut queue = self.list(
            &RequestFilter::with_status(RequestStatus::Approved)
                .microscope_system(microscope_system.clone()),
        );
        queue.extend(self.list(
            &RequestFilter::with_status(RequestStatus::Scheduled)
                .microscope_system(microscope_system),
        ));
        queue
    }

    pub fn get_stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            total_requests: self.requests.len(),
            ..Default::default()
        };

        for request in self.requests.values() {
            *stats
                .by_status
                .entry(request.status.as_str().to_string())
                .or_insert(0) += 1;
            *stats
                .by_microscope
                .entry(request.microscope_system().to_string())
                .or_insert(0) += 1;
            *stats
                .by_priority
                .entry(request.priority.as_str().to_string())
                .or_insert(0) += 1;
        }

        stats
    }

    /// 按生物学条件全量扫描，排序规则与 [`ExperimentQueue::list`] 相同
    pub fn find_by_biology(&self, query: &BiologicalQuery) -> Vec<&ExperimentRequest> {
        let results = sorted(self.requests.values().filter(|r| query.matches(r)));
        debug!("生物学检索命中 {} 条", results.len());
        results
    }

    pub fn sample_summary(&self, request_id: &str) -> Option<SampleSummary> {
        self.get(request_id).map(SampleSummary::from_request)
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    fn mutate<F>(&mut self, request_id: &str, apply: F) -> GentlyResult<ExperimentRequest>
    where
        F: FnOnce(&mut ExperimentRequest),
    {
        let Some(request) = self.requests.get_mut(request_id) else {
            warn!("实验请求不存在: {}", request_id);
            return Err(GentlyError::request_not_found(request_id));
        };
        let previous = request.clone();
        apply(request);
        let updated = request.clone();

        if let Err(e) = self.persist() {
            self.requests.insert(request_id.to_string(), previous);
            return Err(e);
        }
        Ok(updated)
    }

    fn persist(&self) -> GentlyResult<()> {
        let snapshot = QueueSnapshot::new(self.requests.values().cloned().collect());
        self.store.save(&snapshot)
    }
}

fn sorted<'a, I>(requests: I) -> Vec<&'a ExperimentRequest>
where
    I: Iterator<Item = &'a ExperimentRequest>,
{
    let mut results: Vec<_> = requests.collect();
    results.sort_by_key(|request| request.queue_order_key());
    results
}
