//! gently-meta 领域层：显微镜注册表、实验请求队列和生物学检索

pub mod biology;
pub mod queue;
pub mod registry;

pub use biology::{BiologicalQuery, SampleSummary};
pub use queue::{
    Approval, ExperimentQueue, QueueStats, Rejection, RequestFilter, RevisionRequest,
    StatusUpdate, Submission,
};
pub use registry::{CapabilityRequirements, MicroscopeFilter, MicroscopeRegistry, RegistryStats};
