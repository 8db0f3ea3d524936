use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use gently_core::GentlyError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("协调系统错误: {0}")]
    Gently(#[from] GentlyError),

    #[error("请求体格式错误: {0}")]
    JsonBody(#[from] JsonRejection),

    #[error("查询参数错误: {0}")]
    Query(#[from] QueryRejection),

    #[error("请求参数错误: {0}")]
    BadRequest(String),

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        ApiError::BadRequest(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Gently(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Gently(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Gently(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::JsonBody(_) | ApiError::Query(_) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let (error_message, error_type, suggestions) = match &self {
            ApiError::Gently(GentlyError::RequestNotFound { id }) => (
                format!("实验请求 {} 不存在", id),
                "REQUEST_NOT_FOUND",
                vec![
                    "请检查请求ID是否正确".to_string(),
                    "使用 GET /api/v1/experiments 查看所有实验请求".to_string(),
                ],
            ),
            ApiError::Gently(GentlyError::MicroscopeNotFound { id }) => (
                format!("显微镜 {} 不存在", id),
                "MICROSCOPE_NOT_FOUND",
                vec![
                    "请检查显微镜ID是否正确".to_string(),
                    "使用 GET /api/v1/microscopes 查看已注册的显微镜".to_string(),
                ],
            ),
            ApiError::Gently(GentlyError::Validation(msg)) => (
                format!("数据验证失败: {}", msg),
                "VALIDATION_ERROR",
                vec!["请检查状态、优先级、显微镜类型等枚举取值".to_string()],
            ),
            ApiError::JsonBody(rejection) => (
                format!("请求数据格式错误: {}", rejection.body_text()),
                "INVALID_BODY",
                vec![
                    "请检查JSON格式是否正确".to_string(),
                    "确保所有必需字段都已提供".to_string(),
                    "确保Content-Type为application/json".to_string(),
                ],
            ),
            ApiError::Query(rejection) => (
                format!("查询参数错误: {}", rejection.body_text()),
                "INVALID_QUERY",
                vec!["请检查查询参数的名称和取值".to_string()],
            ),
            ApiError::BadRequest(msg) => (
                format!("请求参数错误: {}", msg),
                "BAD_REQUEST",
                vec!["请检查请求格式和参数".to_string()],
            ),
            ApiError::Gently(e) => (
                e.user_message().to_string(),
                "INTERNAL_ERROR",
                vec![
                    "系统遇到内部错误，请稍后重试".to_string(),
                    "查看 GET /api/v1/health 检查系统状态".to_string(),
                ],
            ),
            ApiError::Internal(msg) => (
                "系统内部错误".to_string(),
                "INTERNAL_ERROR",
                vec![format!("错误详情: {}", msg)],
            ),
        };

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", self);
        }

        let timestamp = chrono::Utc::now().to_rfc3339();
        let body = Json(json!({
            "success": false,
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
                "suggestions": suggestions,
            },
            "timestamp": timestamp,
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gently_error_conversion() {
        let api_error: ApiError = GentlyError::request_not_found("abc").into();
        match api_error {
            ApiError::Gently(GentlyError::RequestNotFound { id }) => assert_eq!(id, "abc"),
            _ => panic!("Expected GentlyError::RequestNotFound"),
        }
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::from(GentlyError::microscope_not_found("m1")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_maps_to_400() {
        let response = ApiError::from(GentlyError::validation_error("未知状态")).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = ApiError::bad_request("wavelength").into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_persistence_maps_to_500() {
        let response = ApiError::from(GentlyError::persistence_error("磁盘已满")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = ApiError::Internal("boom".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
