//! # 数据模型
//!
//! 协调系统的核心数据结构：显微镜能力记录、实验请求及其生命周期子记录、
//! 无固定模式的样本规格，以及持久化快照文档。
//!
//! 所有时间字段使用 `DateTime<Utc>`，读取时兼容不带偏移的 ISO8601 时间；状态、优先级、显微镜类型在类型层面是
//! 封闭枚举，持久化为字符串，反序列化遇到未知值时报验证错误。
//!
//! ## 请求状态流转
//! ```text
//! submitted → approved | scheduled → in_progress → completed | failed | cancelled
//!     ├──→ rejected
//!     └──→ revision_requested
//! ```

pub mod capability;
pub mod request;
pub mod sample_spec;
pub mod snapshot;
pub mod timestamp;

pub use capability::*;
pub use request::*;
pub use sample_spec::{SampleSpec, SpecView};
pub use snapshot::*;
