use serde_json::error::Category;
use thiserror::Error;

/// 协调系统错误类型定义
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GentlyError {
    #[error("实验请求不存在: id={id}")]
    RequestNotFound { id: String },

    #[error("显微镜不存在: id={id}")]
    MicroscopeNotFound { id: String },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("持久化存储错误: {0}")]
    Persistence(String),

    #[error("数据序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    #[error("系统内部错误: {0}")]
    Internal(String),
}

/// 统一的Result类型
pub type GentlyResult<T> = std::result::Result<T, GentlyError>;

impl GentlyError {
    pub fn request_not_found<S: Into<String>>(id: S) -> Self {
        Self::RequestNotFound { id: id.into() }
    }
    pub fn microscope_not_found<S: Into<String>>(id: S) -> Self {
        Self::MicroscopeNotFound { id: id.into() }
    }
    pub fn validation_error<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }
    pub fn persistence_error<S: Into<String>>(msg: S) -> Self {
        Self::Persistence(msg.into())
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    pub fn notification_error<S: Into<String>>(msg: S) -> Self {
        Self::Notification(msg.into())
    }

    /// 未识别的枚举字符串统一报告为验证错误
    pub fn unknown_variant(kind: &str, value: &str, expected: &[&str]) -> Self {
        Self::Validation(format!(
            "无效的{kind}: '{value}'，可选值: {}",
            expected.join(", ")
        ))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GentlyError::RequestNotFound { .. } | GentlyError::MicroscopeNotFound { .. }
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GentlyError::Validation(_))
    }

    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GentlyError::Persistence(_) | GentlyError::Configuration(_) | GentlyError::Internal(_)
        )
    }

    pub fn user_message(&self) -> &str {
        match self {
            GentlyError::RequestNotFound { .. } => "请求的实验不存在",
            GentlyError::MicroscopeNotFound { .. } => "请求的显微镜不存在",
            GentlyError::Validation(_) => "输入数据验证失败",
            GentlyError::Persistence(_) => "存储暂不可用，请稍后重试",
            _ => "系统繁忙，请稍后重试",
        }
    }
}

impl From<std::io::Error> for GentlyError {
    fn from(err: std::io::Error) -> Self {
        GentlyError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for GentlyError {
    fn from(err: serde_json::Error) -> Self {
        match err.classify() {
            // 结构正确但取值非法（如未知的状态字符串）
            Category::Data => GentlyError::Validation(err.to_string()),
            Category::Io | Category::Syntax | Category::Eof => {
                GentlyError::Persistence(err.to_string())
            }
        }
    }
}

impl From<anyhow::Error> for GentlyError {
    fn from(err: anyhow::Error) -> Self {
        GentlyError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(GentlyError::request_not_found("abc").is_not_found());
        assert!(GentlyError::microscope_not_found("m1").is_not_found());
        assert!(GentlyError::validation_error("bad").is_validation());
        assert!(GentlyError::persistence_error("disk").is_fatal());
        assert!(!GentlyError::validation_error("bad").is_fatal());
    }

    #[test]
    fn test_serde_data_error_maps_to_validation() {
        #[derive(Debug, serde::Deserialize)]
        struct Probe {
            #[allow(dead_code)]
            count: u32,
        }
        let err = serde_json::from_str::<Probe>(r#"{"count": "many"}"#).unwrap_err();
        assert!(GentlyError::from(err).is_validation());
    }

    #[test]
    fn test_serde_syntax_error_maps_to_persistence() {
        let err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        assert!(matches!(GentlyError::from(err), GentlyError::Persistence(_)));
    }

    #[test]
    fn test_unknown_variant_message() {
        let err = GentlyError::unknown_variant("优先级", "asap", &["urgent", "high"]);
        let message = err.to_string();
        assert!(message.contains("asap"));
        assert!(message.contains("urgent, high"));
    }
}
