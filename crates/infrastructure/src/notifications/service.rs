use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use gently_core::config::{NotificationChannelKind, NotificationConfig};
use gently_core::models::{ExperimentRequest, RequestStatus};
use gently_core::{GentlyError, GentlyResult, Notification, NotificationChannel};
use tracing::{info, warn};

use super::channels::{LogChannel, WebhookChannel};

const SUBJECT_PREFIX: &str = "[gently-meta]";
const RATIONALE_PREVIEW_CHARS: usize = 500;
const SIGNATURE: &str = "---\ngently-meta Coordination System";

/// 通知服务
///
/// 在状态变更成功之后由调用方触发。投递失败只记录告警，不会影响请求状态，
/// 也不会向调用方返回错误。
pub struct NotificationService {
    config: NotificationConfig,
    channel: Arc<dyn NotificationChannel>,
}

impl NotificationService {
    pub fn new(config: NotificationConfig, channel: Arc<dyn NotificationChannel>) -> Self {
        Self { config, channel }
    }

    /// 按配置选择通道：未启用时只写日志
    pub fn from_config(config: NotificationConfig) -> GentlyResult<Self> {
        let channel: Arc<dyn NotificationChannel> = match (config.enabled, config.channel) {
            (true, NotificationChannelKind::Webhook) => {
                let url = config.webhook_url.clone().ok_or_else(|| {
                    GentlyError::config_error("webhook通道必须配置webhook_url")
                })?;
                Arc::new(WebhookChannel::new(
                    url,
                    config.from_email.clone(),
                    Duration::from_secs(config.webhook_timeout_seconds),
                )?)
            }
            _ => Arc::new(LogChannel),
        };

        info!(
            "通知服务已初始化 (启用: {}, 通道: {})",
            config.enabled,
            channel.name()
        );
        Ok(Self::new(config, channel))
    }

    pub fn config(&self) -> &NotificationConfig {
        &self.config
    }

    pub fn reviewers_for(&self, microscope_system: &str) -> &[String] {
        self.config.reviewers_for(microscope_system)
    }

    /// 通知审核人有新的提交；没有可用审核人时跳过
    pub async fn notify_new_submission(&self, request: &ExperimentRequest) {
        match self.compose_new_submission(request) {
            Some(notification) => self.deliver(notification).await,
            None => warn!(
                "显微镜系统 {} 没有配置审核人，跳过新提交通知",
                request.microscope_system()
            ),
        }
    }

    pub async fn notify_approval(&self, request: &ExperimentRequest) {
        self.deliver(self.compose_approval(request)).await;
    }

    pub async fn notify_rejection(&self, request: &ExperimentRequest) {
        self.deliver(self.compose_rejection(request)).await;
    }

    pub async fn notify_revision(&self, request: &ExperimentRequest) {
        self.deliver(self.compose_revision(request)).await;
    }

    pub async fn notify_status_change(&self, request: &ExperimentRequest, old_status: RequestStatus) {
        self.deliver(self.compose_status_change(request, old_status))
            .await;
    }

    pub async fn notify_completion(&self, request: &ExperimentRequest) {
        self.deliver(self.compose_completion(request)).await;
    }

    pub fn compose_new_submission(&self, request: &ExperimentRequest) -> Option<Notification> {
        let reviewers = self.reviewers_for(request.microscope_system());
        if reviewers.is_empty() {
            return None;
        }

        let priority = request.priority.as_str().to_uppercase();
        let rationale = &request.experiment.scientific_rationale;
        let mut preview: String = rationale.chars().take(RATIONALE_PREVIEW_CHARS).collect();
        if rationale.chars().count() > RATIONALE_PREVIEW_CHARS {
            preview.push_str("...");
        }

        let body = format!(
            "New Experiment Submission\n\n\
             Request ID: {id}\n\
             Microscope System: {system}\n\
             Requester: {name} ({institution})\n\
             Priority: {priority}\n\
             Submitted: {submitted}\n\n\
             Scientific Rationale:\n{preview}\n\n\
             Review this request at:\n{base}/review/{id}\n\n{SIGNATURE}",
            id = request.request_id,
            system = request.microscope_system(),
            name = request.requester.name,
            institution = request.requester.institution,
            submitted = request.submission_date.format("%Y-%m-%d %H:%M UTC"),
            base = self.config.base_url,
        );

        Some(Notification::new(
            reviewers.to_vec(),
            format!(
                "{SUBJECT_PREFIX} New {priority} request for {}",
                request.microscope_system()
            ),
            body,
        ))
    }

    pub fn compose_approval(&self, request: &ExperimentRequest) -> Notification {
        let schedule_info = match request.scheduling.scheduled_date.as_deref() {
            Some(date) => format!("Scheduled for: {date}"),
            None => "Scheduling: To be determined".to_string(),
        };
        let comments_info = request
            .review
            .comments
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| format!("\n\nReviewer comments:\n{c}"))
            .unwrap_or_default();

        let body = format!(
            "Your experiment request has been approved!\n\n\
             Request ID: {id}\n\
             Reviewed by: {reviewer}\n\
             Status: APPROVED\n\
             {schedule_info}{comments_info}\n\n\
             Track your experiment at:\n{base}/experiments/{id}\n\n\
             You will receive notifications when your experiment begins and when results are ready.\n\n\
             {SIGNATURE}",
            id = request.request_id,
            reviewer = reviewer_name(request),
            base = self.config.base_url,
        );

        self.to_requester(request, "Your experiment has been approved", body)
    }

    pub fn compose_rejection(&self, request: &ExperimentRequest) -> Notification {
        let body = format!(
            "Your experiment request has been reviewed.\n\n\
             Request ID: {id}\n\
             Reviewed by: {reviewer}\n\
             Status: NOT APPROVED\n\n\
             Reviewer comments:\n{comments}\n\n\
             You may revise and resubmit your request with additional information.\n\
             View your request at:\n{base}/experiments/{id}\n\n\
             {SIGNATURE}",
            id = request.request_id,
            reviewer = reviewer_name(request),
            comments = request.review.comments.as_deref().unwrap_or_default(),
            base = self.config.base_url,
        );

        self.to_requester(request, "Experiment request update", body)
    }

    pub fn compose_revision(&self, request: &ExperimentRequest) -> Notification {
        let modifications: String = request
            .review
            .requested_modifications
            .iter()
            .map(|m| format!("  - {m}\n"))
            .collect();
        let comments_info = request
            .review
            .comments
            .as_deref()
            .filter(|c| !c.is_empty())
            .map(|c| format!("\nReviewer comments:\n{c}\n"))
            .unwrap_or_default();

        let body = format!(
            "Your experiment request needs revision before it can be approved.\n\n\
             Request ID: {id}\n\
             Reviewed by: {reviewer}\n\
             Status: REVISION REQUESTED\n\n\
             Requested modifications:\n{modifications}{comments_info}\n\
             Update your request at:\n{base}/experiments/{id}\n\n\
             {SIGNATURE}",
            id = request.request_id,
            reviewer = reviewer_name(request),
            base = self.config.base_url,
        );

        self.to_requester(request, "Revision requested for your experiment", body)
    }

    pub fn compose_status_change(
        &self,
        request: &ExperimentRequest,
        old_status: RequestStatus,
    ) -> Notification {
        let details_info = request
            .execution
            .execution_notes
            .as_deref()
            .map(|d| format!("\n\nDetails:\n{d}"))
            .unwrap_or_default();

        let body = format!(
            "Your experiment status has been updated.\n\n\
             Request ID: {id}\n\
             Previous Status: {old_status}\n\
             New Status: {new_status}{details_info}\n\n\
             Track your experiment at:\n{base}/experiments/{id}\n\n\
             {SIGNATURE}",
            id = request.request_id,
            new_status = request.status,
            base = self.config.base_url,
        );

        self.to_requester(
            request,
            &format!("Experiment status: {}", request.status),
            body,
        )
    }

    pub fn compose_completion(&self, request: &ExperimentRequest) -> Notification {
        let results_info = request
            .results
            .data_location
            .as_deref()
            .map(|location| format!("\nResults available at: {location}"))
            .unwrap_or_default();
        let completed_at = request.execution.end_time.unwrap_or_else(Utc::now);

        let body = format!(
            "Your experiment has been completed!\n\n\
             Request ID: {id}\n\
             Status: COMPLETED\n\
             Completion time: {completed}{results_info}\n\n\
             Access your data at:\n{base}/experiments/{id}\n\n\
             Thank you for using gently-meta!\n\n\
             {SIGNATURE}",
            id = request.request_id,
            completed = completed_at.format("%Y-%m-%d %H:%M UTC"),
            base = self.config.base_url,
        );

        self.to_requester(request, "Your experiment is complete!", body)
    }

    fn to_requester(&self, request: &ExperimentRequest, subject: &str, body: String) -> Notification {
        Notification::new(
            vec![request.requester.email.clone()],
            format!("{SUBJECT_PREFIX} {subject}"),
            body,
        )
    }

    async fn deliver(&self, notification: Notification) {
        match self.channel.send(&notification).await {
            Ok(()) => info!(
                "通知已发送至 {}: {}",
                notification.recipients.join(", "),
                notification.subject
            ),
            Err(e) => warn!(
                "通知发送失败 (通道: {}, 主题: {}): {}",
                self.channel.name(),
                notification.subject,
                e
            ),
        }
    }
}

fn reviewer_name(request: &ExperimentRequest) -> &str {
    request.review.reviewer_name.as_deref().unwrap_or("reviewer")
}
