use axum::{
    routing::{get, post, put},
    Router,
};
use gently_domain::{ExperimentQueue, MicroscopeRegistry};
use gently_infrastructure::NotificationService;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::handlers::{
    experiments::{get_experiment, list_experiments, submit_experiment, update_experiment_status},
    health::{api_info, health_check},
    microscopes::{
        find_microscopes, get_microscope, list_microscopes, microscope_heartbeat,
        register_microscope, unregister_microscope, update_microscope_status,
    },
    review::{
        approve_experiment, get_approved_queue, get_pending_reviews, reject_experiment,
        request_revision,
    },
    samples::{get_sample_summary, search_samples_get, search_samples_post},
    stats::get_stats,
};

/// API应用状态
///
/// 队列和注册表各自由一把读写锁保护；通知在释放锁之后发送。
#[derive(Clone)]
pub struct AppState {
    pub queue: Arc<RwLock<ExperimentQueue>>,
    pub registry: Arc<RwLock<MicroscopeRegistry>>,
    pub notifications: Arc<NotificationService>,
}

impl AppState {
    pub fn new(
        queue: ExperimentQueue,
        registry: MicroscopeRegistry,
        notifications: NotificationService,
    ) -> Self {
        Self {
            queue: Arc::new(RwLock::new(queue)),
            registry: Arc::new(RwLock::new(registry)),
            notifications: Arc::new(notifications),
        }
    }
}

/// 创建API路由
pub fn create_routes(state: AppState) -> Router {
    Router::new()
        // 系统
        .route("/api/v1/health", get(health_check))
        .route("/api/v1/info", get(api_info))
        .route("/api/v1/stats", get(get_stats))
        // 实验请求
        .route(
            "/api/v1/experiments",
            get(list_experiments).post(submit_experiment),
        )
        .route("/api/v1/experiments/{id}", get(get_experiment))
        .route("/api/v1/experiments/{id}/status", put(update_experiment_status))
        // 审核
        .route("/api/v1/review/pending", get(get_pending_reviews))
        .route("/api/v1/review/{id}/approve", post(approve_experiment))
        .route("/api/v1/review/{id}/reject", post(reject_experiment))
        .route("/api/v1/review/{id}/request-revision", post(request_revision))
        .route("/api/v1/queue/approved", get(get_approved_queue))
        // 样本检索
        .route(
            "/api/v1/samples/search",
            get(search_samples_get).post(search_samples_post),
        )
        .route("/api/v1/samples/{id}/summary", get(get_sample_summary))
        // 显微镜注册表
        .route("/api/v1/microscopes", get(list_microscopes))
        .route("/api/v1/microscopes/register", post(register_microscope))
        .route("/api/v1/microscopes/find", get(find_microscopes))
        .route(
            "/api/v1/microscopes/{id}",
            get(get_microscope).delete(unregister_microscope),
        )
        .route("/api/v1/microscopes/{id}/status", put(update_microscope_status))
        .route("/api/v1/microscopes/{id}/heartbeat", post(microscope_heartbeat))
        .with_state(state)
}
