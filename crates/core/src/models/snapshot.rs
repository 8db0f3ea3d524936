//! 持久化快照文档
//!
//! 每个存储对应一个完整的 JSON 文档，每次变更都整体重写。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::capability::MicroscopeCapability;
use super::request::ExperimentRequest;
use super::timestamp;

pub const SCHEMA_VERSION: &str = "1.0.0";

fn default_schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// 实验队列快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub requests: Vec<ExperimentRequest>,
}

impl QueueSnapshot {
    pub fn new(requests: Vec<ExperimentRequest>) -> Self {
        Self {
            last_updated: Utc::now(),
            schema_version: default_schema_version(),
            requests,
        }
    }
}

/// 显微镜注册表快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegistrySnapshot {
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub last_updated: DateTime<Utc>,
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    #[serde(default)]
    pub microscopes: Vec<MicroscopeCapability>,
}

impl RegistrySnapshot {
    pub fn new(microscopes: Vec<MicroscopeCapability>) -> Self {
        Self {
            last_updated: Utc::now(),
            schema_version: default_schema_version(),
            microscopes,
        }
    }
}
