//! 管理接口（由 `AdminAuth` 保护）
//!
//! 批量任务均为分页执行：调用方用返回的 `next_cursor` 继续，直到为 null。

use actix_web::{HttpResponse, web};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AppState;
use crate::api::middleware::AdminAuth;
use crate::errors::TallyError;
use crate::identity::{LocationId, generate_canonical_id, normalize_slug};
use crate::services::{AliasSeedEntry, BackfillNamespace, BatchOptions};

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize)]
pub struct BackfillBody {
    pub namespace: BackfillNamespace,
    #[serde(flatten)]
    pub options: BatchOptions,
}

#[derive(Debug, Deserialize)]
pub struct SeedBody {
    pub entries: Vec<AliasSeedEntry>,
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub input: String,
    pub slug: String,
    pub id: LocationId,
    /// 原始 alias 记录（canonical 输入时为空）
    pub alias: Option<String>,
    /// slug 的确定性 id，可与 alias 记录比对
    pub deterministic_id: LocationId,
}

pub struct AdminService;

impl AdminService {
    /// `POST /admin/normalize`
    pub async fn normalize(
        state: web::Data<AppState>,
        body: web::Json<BatchOptions>,
    ) -> Result<HttpResponse, TallyError> {
        let report = state.maintenance.normalize_counters(&body).await?;
        info!(
            "Normalize pass: scanned={}, rewritten={}, dry_run={}",
            report.scanned, report.rewritten, report.dry_run
        );
        Ok(HttpResponse::Ok().json(report))
    }

    /// `POST /admin/backfill`
    pub async fn backfill(
        state: web::Data<AppState>,
        body: web::Json<BackfillBody>,
    ) -> Result<HttpResponse, TallyError> {
        let body = body.into_inner();
        let report = state
            .maintenance
            .backfill(body.namespace, &body.options)
            .await?;
        info!(
            "Backfill pass ({:?}): scanned={}, moved={}, unresolved={}",
            body.namespace,
            report.scanned,
            report.moved,
            report.unresolved.len()
        );
        Ok(HttpResponse::Ok().json(report))
    }

    /// `POST /admin/seed-aliases`
    pub async fn seed_aliases(
        state: web::Data<AppState>,
        body: web::Json<SeedBody>,
    ) -> Result<HttpResponse, TallyError> {
        let body = body.into_inner();
        if body.entries.is_empty() {
            return Err(TallyError::invalid_request("entries cannot be empty"));
        }
        let report = state
            .maintenance
            .seed_aliases(&body.entries, body.overwrite)
            .await?;
        info!(
            "Seeded aliases: created={}, overwritten={}, conflicts={}, invalid={}",
            report.created, report.overwritten, report.conflicts, report.invalid
        );
        Ok(HttpResponse::Ok().json(report))
    }

    /// `GET /admin/resolve/{slug}`
    pub async fn resolve(
        state: web::Data<AppState>,
        path: web::Path<String>,
    ) -> Result<HttpResponse, TallyError> {
        let input = path.into_inner();
        let slug = normalize_slug(&input);
        let id = state
            .resolver
            .resolve(&input)
            .await?
            .ok_or_else(|| TallyError::not_found(format!("unknown location: {}", slug)))?;
        let alias = if id.as_str() == input.trim() {
            None
        } else {
            state.resolver.lookup_alias(&slug).await?
        };

        Ok(HttpResponse::Ok().json(ResolveResponse {
            input,
            deterministic_id: generate_canonical_id(&slug),
            slug,
            id,
            alias,
        }))
    }
}

/// 管理路由，整个 scope 由 `AdminAuth` 包裹
pub fn admin_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .wrap(AdminAuth)
            .route("/normalize", web::post().to(AdminService::normalize))
            .route("/backfill", web::post().to(AdminService::backfill))
            .route("/seed-aliases", web::post().to(AdminService::seed_aliases))
            .route("/resolve/{slug}", web::get().to(AdminService::resolve)),
    );
}
