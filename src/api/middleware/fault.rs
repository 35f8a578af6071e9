//! FaultBarrier middleware
//!
//! 把处理链中的 panic 转成 `server_error` 响应，worker 不随之退出。
//! 放在 `RequestIdMiddleware` 内层时，响应体和日志都带上请求 ID。
//! 需要 `panic = "unwind"`。

use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use actix_service::{Service, Transform};
use actix_web::{
    Error,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
};
use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, Ready, ready};
use tracing::error;

use super::request_id::RequestId;
use crate::api::error::error_response_for;
use crate::errors::TallyError;
use crate::system::panic_handler::panic_message;

#[derive(Clone, Default)]
pub struct FaultBarrier;

impl<S, B> Transform<S, ServiceRequest> for FaultBarrier
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = FaultBarrierService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(FaultBarrierService {
            service: Rc::new(service),
        }))
    }
}

pub struct FaultBarrierService<S> {
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for FaultBarrierService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &self,
        ctx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let srv = self.service.clone();
        // 处理链会消耗 req，panic 时用副本构造响应
        let http_req = req.request().clone();

        Box::pin(async move {
            let outcome = match std::panic::catch_unwind(AssertUnwindSafe(|| srv.call(req))) {
                Ok(fut) => AssertUnwindSafe(fut).catch_unwind().await,
                Err(payload) => Err(payload),
            };

            match outcome {
                Ok(result) => result.map(ServiceResponse::map_into_left_body),
                Err(payload) => {
                    let request_id = RequestId::of(&http_req);
                    let request_id = request_id.as_ref().map(RequestId::as_str);
                    error!(
                        "Request {} {} [{}] panicked: {}",
                        http_req.method(),
                        http_req.path(),
                        request_id.unwrap_or("-"),
                        panic_message(payload.as_ref())
                    );
                    let response = error_response_for(
                        &TallyError::internal("request handler panicked"),
                        request_id,
                    )
                    .map_into_right_body();
                    Ok(ServiceResponse::new(http_req, response))
                }
            }
        })
    }
}
