//! 配置管理
//!
//! 配置按以下顺序合并，后者覆盖前者：
//!
//! 1. 内置默认值
//! 2. TOML 配置文件（显式路径，或依次查找 `config/gently-meta.toml`、`gently-meta.toml`）
//! 3. 环境变量，前缀 `GENTLY`，层级分隔符 `__`，例如 `GENTLY__STORAGE__QUEUE_PATH`
//!
//! ```rust,no_run
//! use gently_core::config::AppConfig;
//!
//! let config = AppConfig::load(None)?;
//! println!("队列文件: {}", config.storage.queue_path);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod models;

pub use models::*;
