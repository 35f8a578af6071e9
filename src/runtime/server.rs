//! Server mode
//!
//! 组装应用状态和中间件栈，启动 HTTP 服务。

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Compress, web};
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::api::middleware::{FaultBarrier, RequestIdMiddleware};
use crate::api::{self, AppState};
use crate::config::{CorsConfig, StaticConfig};

/// Validate CORS configuration at startup (runs once)
fn validate_cors_config(cors: &CorsConfig) {
    if cors.allowed_origins.is_empty() {
        info!("CORS allowlist is empty, cross-origin requests will be rejected");
        return;
    }

    let is_any_origin = cors.allowed_origins.iter().any(|o| o == "*");
    if is_any_origin && cors.allow_credentials {
        error!(
            "SECURITY WARNING: allow_any_origin + allow_credentials is a dangerous combination! \
            Disabling credentials for safety."
        );
    }
}

/// Build CORS middleware from configuration
///
/// 预检请求由该中间件在路由匹配前直接应答。
pub fn build_cors(cors_config: &CorsConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "HEAD", "POST", "OPTIONS"])
        // 不放行 x-internal-hit：/hit 的内部事件只接受服务端之间调用
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
            actix_web::http::header::ACCEPT,
        ])
        .expose_headers(vec!["x-request-id"])
        .max_age(cors_config.max_age);

    let is_any_origin = cors_config.allowed_origins.iter().any(|o| o == "*");

    // 空白名单 = 仅同源
    if is_any_origin {
        cors = cors.allow_any_origin();
    } else {
        for origin in &cors_config.allowed_origins {
            cors = cors.allowed_origin(origin.trim_end_matches('/'));
        }
    }

    // any_origin + credentials 组合强制关闭凭证
    if cors_config.allow_credentials && !is_any_origin {
        cors = cors.supports_credentials();
    }

    cors
}

/// Run the HTTP server
///
/// **Note**: Logging system must be initialized before calling this function
pub async fn run_server(config: Arc<StaticConfig>) -> Result<()> {
    let state = AppState::from_config(config.clone())
        .await
        .map_err(|e| {
            error!("Server startup failed: {}", e);
            anyhow::anyhow!(e.format_simple())
        })?;
    info!(
        "Store backend: {}, campaign source ready",
        state.store.backend_name()
    );
    let state = web::Data::new(state);

    validate_cors_config(&config.cors);
    let cors_config = config.cors.clone();

    let workers = config.server.workers.clamp(1, 32);
    let bind_address = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(256 * 1024))
            // 最后 wrap 的在最外层
            .wrap(FaultBarrier)
            .wrap(Compress::default())
            .wrap(build_cors(&cors_config))
            .wrap(RequestIdMiddleware)
            .configure(api::configure)
    })
    .keep_alive(Duration::from_secs(30))
    .client_request_timeout(Duration::from_millis(5000))
    .client_disconnect_timeout(Duration::from_millis(1000))
    .workers(workers)
    .bind(&bind_address)
    .with_context(|| format!("Failed to bind {}", bind_address))?;

    warn!(
        "Starting server at http://{} with {} workers",
        bind_address, workers
    );

    // actix 自行处理 SIGINT / SIGTERM 并优雅退出
    server.run().await.context("HTTP server error")?;
    info!("Server stopped");
    Ok(())
}
