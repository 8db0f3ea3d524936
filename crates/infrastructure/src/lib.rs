//! gently-meta 基础设施层：快照存储与通知投递

pub mod notifications;
pub mod storage;

pub use notifications::{LogChannel, NotificationService, WebhookChannel};
pub use storage::{InMemoryStore, JsonFileStore};
