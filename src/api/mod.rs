//! HTTP 接口层
//!
//! handler 只做参数解析和响应组装，业务逻辑都在 `services` 中。

pub mod error;
pub mod meta;
pub mod middleware;
pub mod services;
mod state;

use actix_web::web;

pub use state::AppState;

/// 注册全部路由和提取器配置（server 与集成测试共用）
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(error::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(error::query_error_handler))
        .app_data(web::PathConfig::default().error_handler(error::path_error_handler))
        .configure(services::health_routes)
        .configure(services::track_routes)
        .configure(services::promo_routes)
        .configure(services::stats_routes)
        .configure(services::admin_routes)
        .default_service(web::to(error::not_found));
}
