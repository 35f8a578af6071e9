//! Request ID middleware
//!
//! 边缘代理通常已经带了 `X-Request-ID`，格式合法就沿用，否则生成 UUID v4。
//! 请求在 `request` span 里执行，结束时把状态码记到 span 上，
//! 响应头回写同一个 ID，`FaultBarrier` 也用它关联 panic 日志和错误信封。

use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::{
    Error, HttpMessage, HttpRequest,
    dev::{ServiceRequest, ServiceResponse},
    http::header::{HeaderName, HeaderValue},
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::{Instrument, Span, debug, field, info_span};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_FORWARDED_LEN: usize = 64;

/// 当前请求的 ID（存放在 request extensions 中）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 取出中间件写入的 ID；没经过中间件时为 `None`
    pub fn of(req: &HttpRequest) -> Option<RequestId> {
        req.extensions().get::<RequestId>().cloned()
    }

    fn for_request(req: &ServiceRequest) -> RequestId {
        let forwarded = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|id| is_acceptable(id));
        RequestId(match forwarded {
            Some(id) => id.to_string(),
            None => Uuid::new_v4().to_string(),
        })
    }
}

/// 只接受短的、不会污染日志的 ID
fn is_acceptable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_FORWARDED_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

#[derive(Clone, Default)]
pub struct RequestIdMiddleware;

impl<S, B> Transform<S, ServiceRequest> for RequestIdMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestIdService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestIdService {
            service: Rc::new(service),
        }))
    }
}

pub struct RequestIdService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestIdService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    actix_service::forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        let id = RequestId::for_request(&req);
        let span = info_span!(
            "request",
            request_id = %id.as_str(),
            method = %req.method(),
            path = %req.path(),
            status = field::Empty,
        );
        let header_value = HeaderValue::from_str(id.as_str()).ok();
        req.extensions_mut().insert(id);

        Box::pin(
            async move {
                let mut response = srv.call(req).await?;
                let status = response.status();
                Span::current().record("status", status.as_u16());
                debug!("Completed with {}", status);

                if let Some(value) = header_value {
                    response
                        .headers_mut()
                        .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::{self, TestRequest};
    use actix_web::{App, HttpResponse, web};

    async fn echo(req: HttpRequest) -> HttpResponse {
        let id = RequestId::of(&req).map(|id| id.0).unwrap_or_default();
        HttpResponse::Ok().body(id)
    }

    #[test]
    fn test_forwarded_id_validation() {
        assert!(is_acceptable("edge-7f3a.01_b"));
        assert!(!is_acceptable(""));
        assert!(!is_acceptable("has space"));
        assert!(!is_acceptable("line\nbreak"));
        assert!(!is_acceptable(&"a".repeat(MAX_FORWARDED_LEN + 1)));
    }

    #[actix_web::test]
    async fn test_forwarded_id_is_reused() {
        let app = test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .route("/", web::get().to(echo)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "edge-123"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "edge-123");
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), b"edge-123");
    }

    #[actix_web::test]
    async fn test_malformed_id_is_replaced() {
        let app = test::init_service(
            App::new()
                .wrap(RequestIdMiddleware)
                .route("/", web::get().to(echo)),
        )
        .await;

        let req = TestRequest::get()
            .uri("/")
            .insert_header((REQUEST_ID_HEADER, "<script>"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        let header = resp
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_ne!(header, "<script>");
        assert!(Uuid::parse_str(&header).is_ok());
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), header.as_bytes());
    }
}
