use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 快照存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    pub queue_path: String,
    pub registry_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            queue_path: "gently_meta_queue.json".to_string(),
            registry_path: "gently_meta_microscopes.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.queue_path.trim().is_empty() {
            return Err(anyhow::anyhow!("队列存储路径不能为空"));
        }
        if self.registry_path.trim().is_empty() {
            return Err(anyhow::anyhow!("注册表存储路径不能为空"));
        }
        if self.queue_path == self.registry_path {
            return Err(anyhow::anyhow!("队列与注册表不能共用同一存储文件"));
        }
        Ok(())
    }
}

/// 通知投递通道
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NotificationChannelKind {
    #[default]
    Log,
    Webhook,
}

/// 通知配置
///
/// `reviewers` 按显微镜系统名称映射审核人地址，找不到时使用 `default_reviewers`。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub channel: NotificationChannelKind,
    pub webhook_url: Option<String>,
    pub webhook_timeout_seconds: u64,
    pub from_email: String,
    pub base_url: String,
    pub default_reviewers: Vec<String>,
    pub reviewers: BTreeMap<String, Vec<String>>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        let reviewers = [
            ("DiSPIM", "dispim-reviewer@lab.org"),
            ("confocal", "confocal-reviewer@lab.org"),
            ("widefield", "widefield-reviewer@lab.org"),
            ("light_sheet", "lightsheet-reviewer@lab.org"),
        ]
        .into_iter()
        .map(|(system, address)| (system.to_string(), vec![address.to_string()]))
        .collect();

        Self {
            enabled: false,
            channel: NotificationChannelKind::Log,
            webhook_url: None,
            webhook_timeout_seconds: 10,
            from_email: "experiments@gently-meta.org".to_string(),
            base_url: "https://gently-meta.org".to_string(),
            default_reviewers: vec!["imaging-team@lab.org".to_string()],
            reviewers,
        }
    }
}

impl NotificationConfig {
    /// 解析显微镜系统的审核人，名称先精确匹配再忽略大小写匹配
    pub fn reviewers_for(&self, microscope_system: &str) -> &[String] {
        self.reviewers
            .get(microscope_system)
            .or_else(|| {
                self.reviewers
                    .iter()
                    .find(|(system, _)| system.eq_ignore_ascii_case(microscope_system))
                    .map(|(_, addresses)| addresses)
            })
            .map(Vec::as_slice)
            .unwrap_or(self.default_reviewers.as_slice())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.channel == NotificationChannelKind::Webhook {
            match self.webhook_url.as_deref() {
                Some(url) if url.starts_with("http://") || url.starts_with("https://") => {}
                Some(url) => {
                    return Err(anyhow::anyhow!("Webhook地址必须以http://或https://开头: {url}"))
                }
                None => return Err(anyhow::anyhow!("webhook通道必须配置webhook_url")),
            }
            if self.webhook_timeout_seconds == 0 {
                return Err(anyhow::anyhow!("Webhook超时时间必须大于0"));
            }
        }
        if self.from_email.is_empty() {
            return Err(anyhow::anyhow!("发件地址不能为空"));
        }
        if self.base_url.is_empty() {
            return Err(anyhow::anyhow!("基础URL不能为空"));
        }
        Ok(())
    }
}
