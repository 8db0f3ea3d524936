pub mod api_observability;
pub mod app_config;
pub mod storage_notifications;

pub use api_observability::{ApiConfig, ObservabilityConfig};
pub use app_config::AppConfig;
pub use storage_notifications::{NotificationChannelKind, NotificationConfig, StorageConfig};
