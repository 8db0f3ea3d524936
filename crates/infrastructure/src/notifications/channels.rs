use std::time::Duration;

use async_trait::async_trait;
use gently_core::{GentlyError, GentlyResult, Notification, NotificationChannel};
use serde::Serialize;
use tracing::{debug, info};

const BODY_PREVIEW_CHARS: usize = 200;

/// 只写日志的通道，通知关闭时使用
#[derive(Debug, Clone, Default)]
pub struct LogChannel;

#[async_trait]
impl NotificationChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> GentlyResult<()> {
        let preview: String = notification.body.chars().take(BODY_PREVIEW_CHARS).collect();
        info!(
            recipients = %notification.recipients.join(", "),
            subject = %notification.subject,
            "[NOTIFICATION] {}",
            preview
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    from: &'a str,
    to: &'a [String],
    subject: &'a str,
    body: &'a str,
}

/// 把通知以 JSON 形式 POST 到外部地址
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    url: String,
    from_email: String,
    http_client: reqwest::Client,
}

impl WebhookChannel {
    pub fn new<S: Into<String>>(url: S, from_email: S, timeout: Duration) -> GentlyResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GentlyError::config_error(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            url: url.into(),
            from_email: from_email.into(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn send(&self, notification: &Notification) -> GentlyResult<()> {
        let payload = WebhookPayload {
            from: &self.from_email,
            to: &notification.recipients,
            subject: &notification.subject,
            body: &notification.body,
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| GentlyError::notification_error(format!("请求 {} 失败: {e}", self.url)))?;

        if response.status().is_success() {
            debug!("通知已投递到 {}: {}", self.url, notification.subject);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(GentlyError::notification_error(format!(
                "Webhook返回 {status}: {body}"
            )))
        }
    }
}
