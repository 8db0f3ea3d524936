//! gently-meta 核心库：错误类型、配置模型、数据模型以及持久化与通知的接口定义

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use traits::{Notification, NotificationChannel, SnapshotStore};
