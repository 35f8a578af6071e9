//! HTTP 错误信封
//!
//! 所有错误统一为 `{ "error": { "code", "message" } }`。
//! 服务端故障只回通用消息，详情写日志。

use actix_web::{HttpRequest, HttpResponse, ResponseError, error, http::StatusCode};
use serde::Serialize;
use tracing::error;

use crate::errors::TallyError;

const GENERIC_SERVER_ERROR: &str = "internal server error";

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub code: &'a str,
    pub message: &'a str,
    /// 只有服务端故障才带上，方便对照日志
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope<'a> {
    pub error: ErrorBody<'a>,
}

impl ResponseError for TallyError {
    fn status_code(&self) -> StatusCode {
        self.http_status()
    }

    fn error_response(&self) -> HttpResponse {
        error_response_for(self, None)
    }
}

/// 构造错误信封；`request_id` 只在服务端故障时写入响应体
pub fn error_response_for(err: &TallyError, request_id: Option<&str>) -> HttpResponse {
    let (message, request_id) = if err.is_server_fault() {
        match request_id {
            Some(id) => error!(request_id = %id, "{}", err),
            None => error!("{}", err),
        }
        (GENERIC_SERVER_ERROR, request_id)
    } else {
        (err.message(), None)
    };
    HttpResponse::build(err.http_status()).json(ErrorEnvelope {
        error: ErrorBody {
            code: err.code(),
            message,
            request_id,
        },
    })
}

/// JSON 请求体解析失败
pub fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    TallyError::invalid_request(format!("invalid JSON body: {}", err)).into()
}

/// 查询串解析失败
pub fn query_error_handler(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    TallyError::invalid_request(format!("invalid query string: {}", err)).into()
}

/// 路径参数解析失败
pub fn path_error_handler(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    TallyError::invalid_request(format!("invalid path: {}", err)).into()
}

/// 未匹配的路由
pub async fn not_found() -> Result<HttpResponse, TallyError> {
    Err(TallyError::not_found("no such route"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_rt::test]
    async fn test_envelope_shape() {
        let resp = TallyError::forbidden("internal event").error_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "forbidden");
        assert_eq!(json["error"]["message"], "internal event");
        assert!(json["error"].get("request_id").is_none());
    }

    #[actix_rt::test]
    async fn test_request_id_only_on_server_faults() {
        let resp = error_response_for(&TallyError::storage("disk gone"), Some("req-1"));
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], GENERIC_SERVER_ERROR);
        assert_eq!(json["error"]["request_id"], "req-1");

        let resp = error_response_for(&TallyError::not_found("nope"), Some("req-2"));
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert!(json["error"].get("request_id").is_none());
    }

    #[actix_rt::test]
    async fn test_server_fault_hides_detail() {
        let resp = TallyError::storage("redis at 10.0.0.3 refused").error_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "server_error");
        assert_eq!(json["error"]["message"], GENERIC_SERVER_ERROR);
    }

    #[actix_rt::test]
    async fn test_upstream_keeps_message() {
        let resp = TallyError::upstream("campaign feed timed out").error_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
        let body = to_bytes(resp.into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["message"], "campaign feed timed out");
    }
}
