use actix_service::{Service, Transform};
use actix_web::{
    Error, ResponseError,
    body::EitherBody,
    dev::{ServiceRequest, ServiceResponse},
    http::header::AUTHORIZATION,
    web,
};
use futures_util::future::{LocalBoxFuture, Ready, ready};
use std::rc::Rc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, trace};

use crate::api::AppState;
use crate::errors::TallyError;

/// 管理接口 Bearer Token 认证
///
/// - 未配置 admin token：整个管理面返回 404
/// - 缺少 Authorization：401
/// - token 不匹配：403（常量时间比较）
#[derive(Clone, Default)]
pub struct AdminAuth;

impl<S, B> Transform<S, ServiceRequest> for AdminAuth
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminAuthMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(AdminAuthMiddleware {
            service: Rc::new(service),
        }))
    }
}

pub struct AdminAuthMiddleware<S> {
    service: Rc<S>,
}

impl<S> AdminAuthMiddleware<S> {
    /// 从 Authorization header 提取 Bearer token
    fn extract_bearer_token(req: &ServiceRequest) -> Option<String> {
        req.headers()
            .get(AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.strip_prefix("Bearer "))
            .map(|s| s.trim().to_string())
    }

    fn reject<B>(req: ServiceRequest, err: TallyError) -> ServiceResponse<EitherBody<B>> {
        req.into_response(err.error_response().map_into_right_body())
    }
}

impl<S, B> Service<ServiceRequest> for AdminAuthMiddleware<S>
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

        Box::pin(async move {
            let admin_token = req
                .app_data::<web::Data<AppState>>()
                .map(|state| state.config.api.admin_token.clone())
                .unwrap_or_default();

            if admin_token.is_empty() {
                debug!("Admin token not configured - returning 404");
                return Ok(Self::reject(req, TallyError::not_found("no such route")));
            }

            let Some(presented) = Self::extract_bearer_token(&req) else {
                info!("Admin request without bearer token: {}", req.path());
                return Ok(Self::reject(
                    req,
                    TallyError::unauthorized("missing bearer token"),
                ));
            };

            if !bool::from(presented.as_bytes().ct_eq(admin_token.as_bytes())) {
                info!("Admin authentication failed - invalid token");
                return Ok(Self::reject(req, TallyError::forbidden("invalid token")));
            }

            trace!("Admin authentication succeeded");
            let res = srv.call(req).await?;
            Ok(res.map_into_left_body())
        })
    }
}
