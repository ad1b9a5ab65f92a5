use std::fmt::Display;

use axum::{extract::rejection::JsonRejection, http::StatusCode, Json};
use serde::{ser::SerializeStruct, Serialize};
use serde_json::Value;

use crate::{database::StoreError, error::CrmError};

#[derive(Debug)]
enum Body {
    Data(Value),
    Message(String),
}

/// 响应数据
///
/// Serialized as `{success, data}` or `{success, message}`; the status code
/// travels on the HTTP response itself.
#[derive(Debug)]
pub struct Response {
    code: StatusCode,
    body: Body,
}

impl axum::response::IntoResponse for Response {
    fn into_response(self) -> axum::response::Response {
        (self.code, Json(self)).into_response()
    }
}

impl Serialize for Response {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut s = serializer.serialize_struct("Response", 2)?;
        s.serialize_field("success", &self.code.is_success())?;
        match &self.body {
            Body::Data(data) => s.serialize_field("data", data)?,
            Body::Message(message) => s.serialize_field("message", message)?,
        }
        s.end()
    }
}

impl Response {
    fn new(code: StatusCode, body: Body) -> Response {
        Self { code, body }
    }
    pub fn ok(data: Value) -> Self {
        Self::new(StatusCode::OK, Body::Data(data))
    }
    pub fn created(data: Value) -> Self {
        Self::new(StatusCode::CREATED, Body::Data(data))
    }
    /// 成功，只返回提示信息
    pub fn message(msg: impl Display) -> Self {
        Self::new(StatusCode::OK, Body::Message(msg.to_string()))
    }
    /// 参数格式错误
    pub fn invalid_format(e: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Body::Message(e.to_string()))
    }
    /// 缺少或无效的 token
    pub fn token_error(e: impl Display) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, Body::Message(e.to_string()))
    }
    /// 权限不足
    pub fn permission_denied(e: impl Display) -> Self {
        Self::new(StatusCode::FORBIDDEN, Body::Message(e.to_string()))
    }
    /// 请求的数据不存在
    pub fn not_exist(e: impl Display) -> Self {
        Self::new(StatusCode::NOT_FOUND, Body::Message(e.to_string()))
    }
    /// 与实体当前状态冲突
    pub fn invalid_state(e: impl Display) -> Self {
        Self::new(StatusCode::BAD_REQUEST, Body::Message(e.to_string()))
    }
    /// 内部错误
    pub fn internal_server_error(e: impl Display) -> Self {
        tracing::error!(error = %e, "internal server error");
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            Body::Message("Internal Server Error".into()),
        )
    }
    pub fn code(&self) -> StatusCode {
        self.code
    }
}

impl From<CrmError> for Response {
    fn from(value: CrmError) -> Self {
        match value {
            CrmError::Validation(e) => Response::invalid_format(e),
            CrmError::Unauthenticated(e) => Response::token_error(e),
            CrmError::Forbidden(e) => Response::permission_denied(e),
            CrmError::NotFound(e) => Response::not_exist(e),
            CrmError::InvalidState(e) => Response::invalid_state(e),
            CrmError::Internal(e) => Response::internal_server_error(e),
        }
    }
}

impl From<StoreError> for Response {
    fn from(value: StoreError) -> Self {
        CrmError::from(value).into()
    }
}

impl From<serde_json::Error> for Response {
    fn from(value: serde_json::Error) -> Self {
        Response::invalid_format(value)
    }
}

impl From<JsonRejection> for Response {
    fn from(value: JsonRejection) -> Self {
        Response::invalid_format(value.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_shapes() {
        let ok = serde_json::to_value(Response::ok(json!([1, 2]))).unwrap();
        assert_eq!(ok, json!({"success": true, "data": [1, 2]}));

        let err = Response::from(CrmError::invalid_state("Lead already converted"));
        assert_eq!(err.code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            serde_json::to_value(err).unwrap(),
            json!({"success": false, "message": "Lead already converted"})
        );
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let err = Response::from(CrmError::Internal("connection reset by peer".into()));
        assert_eq!(err.code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = serde_json::to_value(err).unwrap();
        assert_eq!(body["message"], "Internal Server Error");
    }

    #[test]
    fn taxonomy_status_codes() {
        let cases = [
            (CrmError::validation("x"), StatusCode::BAD_REQUEST),
            (CrmError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (CrmError::forbidden("x"), StatusCode::FORBIDDEN),
            (CrmError::not_found("x"), StatusCode::NOT_FOUND),
            (CrmError::invalid_state("x"), StatusCode::BAD_REQUEST),
        ];
        for (err, code) in cases {
            assert_eq!(Response::from(err).code(), code);
        }
    }
}
