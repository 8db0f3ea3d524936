//! 通知投递：通道实现与消息编排

pub mod channels;
pub mod service;

pub use channels::{LogChannel, WebhookChannel};
pub use service::NotificationService;
