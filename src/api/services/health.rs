use actix_web::{HttpResponse, Responder, web};
use serde::Serialize;
use std::time::Duration;
use tracing::{error, trace};

use crate::api::AppState;

const HEALTH_PROBE_KEY: &str = "health:probe";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: &'static str,
    pub uptime_secs: u64,
}

/// Health Service
///
/// 只做一次 KV 读探测，不依赖活动来源等外部服务。
pub struct HealthService;

impl HealthService {
    /// `GET /health`
    pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
        trace!("Received health check request");

        let healthy =
            match tokio::time::timeout(Duration::from_secs(5), state.store.get(HEALTH_PROBE_KEY))
                .await
            {
                Ok(Ok(_)) => true,
                Ok(Err(e)) => {
                    error!("Store health check failed: {}", e);
                    false
                }
                Err(_) => {
                    error!("Store health check timeout");
                    false
                }
            };

        let body = HealthResponse {
            status: if healthy { "ok" } else { "unhealthy" },
            store: state.store.backend_name(),
            uptime_secs: state.started_at.elapsed().as_secs(),
        };

        if healthy {
            HttpResponse::Ok().json(body)
        } else {
            HttpResponse::ServiceUnavailable().json(body)
        }
    }
}

pub fn health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(HealthService::health_check))
        .route("/health", web::head().to(HealthService::health_check));
}
