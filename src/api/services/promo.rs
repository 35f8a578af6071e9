//! 二维码与促销兑换接口

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use serde::Deserialize;
use tracing::trace;

use crate::api::AppState;
use crate::api::meta::extract_meta;
use crate::errors::TallyError;
use crate::services::{IssueRequest, RedeemRequest, qr};
use crate::utils::url_validator::validate_redirect_target;

const SVG_CONTENT_TYPE: &str = "image/svg+xml";

// ============ Request DTOs ============

#[derive(Debug, Deserialize)]
pub struct QrQuery {
    pub id: String,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct PromoQrQuery {
    pub id: String,
    /// 缺省时取当天生效的活动
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
    /// `json`（默认）或 `svg`
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RedeemBody {
    pub token: String,
    pub id: String,
    pub campaign: String,
    #[serde(default)]
    pub tz: Option<String>,
}

fn svg_response(svg: String) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, SVG_CONTENT_TYPE))
        .insert_header((header::CACHE_CONTROL, "no-store"))
        .body(svg)
}

pub struct PromoService;

impl PromoService {
    /// `GET /qr?id=&to=&size=`
    ///
    /// 二维码内容为本服务的 `/out/qr-scan/{id}` 追踪跳转。
    pub async fn qr(
        state: web::Data<AppState>,
        query: web::Query<QrQuery>,
    ) -> Result<HttpResponse, TallyError> {
        let query = query.into_inner();
        let location = state.tracking.require_location(&query.id).await?;
        let api = &state.config.api;

        let target = match query.to.as_deref() {
            Some(to) => validate_redirect_target(to),
            None => validate_redirect_target(
                &api.landing_url_template
                    .replace("{id}", location.as_str()),
            ),
        }
        .map_err(|e| TallyError::invalid_request(e.to_string()))?;

        let payload = format!(
            "{}/out/qr-scan/{}?to={}",
            api.public_base_url.trim_end_matches('/'),
            location,
            urlencoding::encode(target.as_str())
        );
        trace!("Rendering QR for {}: {}", location, payload);

        Ok(svg_response(qr::render_svg(&payload, query.size)?))
    }

    /// `GET /promo-qr?id=&campaign=&tz=&format=`
    pub async fn promo_qr(
        req: HttpRequest,
        state: web::Data<AppState>,
        query: web::Query<PromoQrQuery>,
    ) -> Result<HttpResponse, TallyError> {
        let query = query.into_inner();
        let as_svg = match query.format.as_deref().map(str::trim) {
            None | Some("") | Some("json") => false,
            Some("svg") => true,
            Some(other) => {
                return Err(TallyError::invalid_request(format!(
                    "unsupported format '{}', expected json or svg",
                    other
                )));
            }
        };

        let issued = state
            .redemption
            .issue(IssueRequest {
                id: query.id,
                campaign: query.campaign,
                timezone: query.tz,
                meta: extract_meta(&req, &state.config.api),
            })
            .await?;

        if as_svg {
            return Ok(svg_response(qr::render_svg(&issued.url, query.size)?));
        }
        Ok(HttpResponse::Ok()
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .json(issued))
    }

    /// `POST /redeem`
    ///
    /// 兑换失败也是 200，`status = invalid` 并附原因。
    pub async fn redeem(
        req: HttpRequest,
        state: web::Data<AppState>,
        body: web::Json<RedeemBody>,
    ) -> Result<HttpResponse, TallyError> {
        let body = body.into_inner();
        if body.token.trim().is_empty() {
            return Err(TallyError::invalid_request("token is required"));
        }

        let result = state
            .redemption
            .redeem(RedeemRequest {
                token: body.token.trim().to_string(),
                id: body.id,
                campaign: body.campaign,
                timezone: body.tz,
                meta: extract_meta(&req, &state.config.api),
            })
            .await?;

        Ok(HttpResponse::Ok().json(result))
    }
}

pub fn promo_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/qr", web::get().to(PromoService::qr))
        .route("/promo-qr", web::get().to(PromoService::promo_qr))
        .route("/redeem", web::post().to(PromoService::redeem));
}
