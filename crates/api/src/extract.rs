//! 请求提取器
//!
//! 包装axum的 `Json` 和 `Query`，把解析失败统一转换为 `ApiError`（400 + 标准错误体），
//! 而不是axum默认的422纯文本响应。

use axum::{
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use gently_core::{GentlyError, GentlyResult};
use serde::de::DeserializeOwned;
use std::str::FromStr;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(Self(value))
    }
}

/// 解析逗号分隔的列表参数，忽略空白项
pub fn split_list(value: Option<&str>) -> Option<Vec<String>> {
    let items: Vec<String> = value?
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();
    (!items.is_empty()).then_some(items)
}

/// 解析可选的枚举查询参数，未知取值返回验证错误
pub fn parse_optional<T>(value: Option<&str>) -> GentlyResult<Option<T>>
where
    T: FromStr<Err = GentlyError>,
{
    value.map(str::parse).transpose()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_list() {
        assert_eq!(
            split_list(Some("GFP, mCherry,,")),
            Some(vec!["GFP".to_string(), "mCherry".to_string()])
        );
        assert_eq!(split_list(Some(" , ")), None);
        assert_eq!(split_list(None), None);
    }

    #[test]
    fn test_parse_optional() {
        use gently_core::models::RequestStatus;

        assert_eq!(
            parse_optional::<RequestStatus>(Some("approved")).unwrap(),
            Some(RequestStatus::Approved)
        );
        assert_eq!(parse_optional::<RequestStatus>(None).unwrap(), None);
        assert!(parse_optional::<RequestStatus>(Some("archived"))
            .unwrap_err()
            .is_validation());
    }
}
