//! # gently-meta API
//!
//! 多显微镜实验协调系统的REST接口，把实验队列和显微镜注册表的操作映射为HTTP请求。
//!
//! ## API 端点
//!
//! ### 系统
//! - `GET /api/v1/health` - 健康检查
//! - `GET /api/v1/info` - 服务信息
//! - `GET /api/v1/stats` - 队列和显微镜统计
//!
//! ### 实验请求
//! - `POST /api/v1/experiments` - 提交实验请求
//! - `GET /api/v1/experiments` - 按状态、显微镜、优先级、申请人过滤
//! - `GET /api/v1/experiments/{id}` - 获取请求详情
//! - `PUT /api/v1/experiments/{id}/status` - 更新执行状态
//!
//! ### 审核
//! - `GET /api/v1/review/pending`
//! - `POST /api/v1/review/{id}/approve`
//! - `POST /api/v1/review/{id}/reject`
//! - `POST /api/v1/review/{id}/request-revision`
//! - `GET /api/v1/queue/approved`
//!
//! ### 样本检索
//! - `GET|POST /api/v1/samples/search` - GET参数中的列表以逗号分隔
//! - `GET /api/v1/samples/{id}/summary`
//!
//! ### 显微镜注册表
//! - `GET /api/v1/microscopes`
//! - `GET|DELETE /api/v1/microscopes/{id}`
//! - `POST /api/v1/microscopes/register`
//! - `PUT /api/v1/microscopes/{id}/status`
//! - `POST /api/v1/microscopes/{id}/heartbeat`
//! - `GET /api/v1/microscopes/find`
//!
//! ## 响应格式
//!
//! ### 成功响应
//! ```json
//! {
//!   "success": true,
//!   "data": { "request_id": "3f0c…", "status": "submitted" },
//!   "message": "Experiment request submitted successfully",
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! ### 错误响应
//! ```json
//! {
//!   "success": false,
//!   "error": {
//!     "message": "实验请求 abc 不存在",
//!     "type": "REQUEST_NOT_FOUND",
//!     "code": 404,
//!     "suggestions": ["请检查请求ID是否正确"]
//!   },
//!   "timestamp": "2024-01-01T00:00:00Z"
//! }
//! ```
//!
//! 未知的ID返回404，未知的枚举取值和格式错误的请求体返回400，存储失败返回500。

pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod response;
pub mod routes;

use axum::Router;
use gently_core::config::ApiConfig;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;

use middleware::{cors_layer, request_logging, trace_layer};
use routes::create_routes;

pub use error::{ApiError, ApiResult};
pub use routes::AppState;

/// 创建完整的API应用
pub fn create_app(state: AppState, api_config: &ApiConfig) -> Router {
    let router = create_routes(state).layer(
        ServiceBuilder::new()
            .layer(trace_layer())
            .layer(TimeoutLayer::new(Duration::from_secs(
                api_config.request_timeout_seconds,
            )))
            .layer(axum::middleware::from_fn(request_logging)),
    );

    if api_config.cors_enabled {
        router.layer(cors_layer())
    } else {
        router
    }
}
