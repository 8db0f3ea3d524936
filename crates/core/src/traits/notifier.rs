use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::GentlyResult;

/// 一条待投递的通知
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    pub recipients: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Notification {
    pub fn new<S: Into<String>>(recipients: Vec<String>, subject: S, body: S) -> Self {
        Self {
            recipients,
            subject: subject.into(),
            body: body.into(),
        }
    }
}

/// 通知通道抽象接口
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// 通道名称，用于日志
    fn name(&self) -> &str;

    /// 投递通知
    async fn send(&self, notification: &Notification) -> GentlyResult<()>;
}
