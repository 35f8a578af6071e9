//! 事件采集接口：`/track` beacon、`/out` 追踪跳转、`/hit` 计数

use actix_web::{HttpRequest, HttpResponse, http::header, web};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use tracing::{debug, trace, warn};

use crate::analytics::EventKey;
use crate::api::AppState;
use crate::api::meta::{extract_meta, is_human_navigation};
use crate::errors::TallyError;
use crate::services::{TrackOutcome, TrackRequest};
use crate::utils::url_validator::validate_redirect_target;

/// `/hit` 内部事件的标记头
pub const INTERNAL_HIT_HEADER: &str = "x-internal-hit";

// ============ Request/Response DTOs ============

#[derive(Debug, Deserialize)]
pub struct TrackBody {
    pub id: String,
    pub event: String,
    #[serde(default)]
    pub value: Option<u8>,
    #[serde(default)]
    pub tz: Option<String>,
    /// 前端附带的动作描述，只记日志
    #[serde(default)]
    pub action: Option<serde_json::Value>,
    #[serde(default)]
    pub context: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct OutQuery {
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub tz: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HitQuery {
    #[serde(default)]
    pub tz: Option<String>,
    #[serde(default)]
    pub value: Option<u8>,
}

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub ok: bool,
    pub counted: bool,
    pub event: EventKey,
    pub day: String,
}

impl From<TrackOutcome> for TrackResponse {
    fn from(outcome: TrackOutcome) -> Self {
        Self {
            ok: true,
            counted: outcome.counted,
            event: outcome.event,
            day: outcome.day.key(),
        }
    }
}

/// 解析事件名；未知事件为 invalid_request
fn parse_event(raw: &str) -> Result<EventKey, TallyError> {
    raw.trim().parse::<EventKey>().map_err(|_| {
        TallyError::invalid_request(format!(
            "unknown event '{}', expected one of: {}",
            raw,
            EventKey::vocabulary()
        ))
    })
}

/// 公开接口不接受内部事件
fn parse_public_event(raw: &str) -> Result<EventKey, TallyError> {
    let event = parse_event(raw)?;
    if event.is_internal() {
        return Err(TallyError::forbidden(format!(
            "event '{}' cannot be recorded from this endpoint",
            event
        )));
    }
    Ok(event)
}

fn has_internal_marker(req: &HttpRequest, secret: &str) -> bool {
    if secret.is_empty() {
        return false;
    }
    req.headers()
        .get(INTERNAL_HIT_HEADER)
        .and_then(|h| h.to_str().ok())
        .is_some_and(|v| bool::from(v.trim().as_bytes().ct_eq(secret.as_bytes())))
}

pub struct TrackService;

impl TrackService {
    /// `POST /track`
    pub async fn track(
        req: HttpRequest,
        state: web::Data<AppState>,
        body: web::Json<TrackBody>,
    ) -> Result<HttpResponse, TallyError> {
        let body = body.into_inner();
        let event = parse_public_event(&body.event)?;

        if body.action.is_some() || body.context.is_some() {
            trace!(
                "Track {} for {}: action={:?} context={:?}",
                event, body.id, body.action, body.context
            );
        }

        let outcome = state
            .tracking
            .record(TrackRequest {
                id: body.id,
                event,
                value: body.value,
                timezone: body.tz,
                meta: extract_meta(&req, &state.config.api),
                count: true,
            })
            .await?;

        Ok(HttpResponse::Ok().json(TrackResponse::from(outcome)))
    }

    /// `GET /out/{event}/{id}?to=`
    ///
    /// 跳转总会发生；只有真人导航才计数，未知地点不计数。
    pub async fn out(
        req: HttpRequest,
        state: web::Data<AppState>,
        path: web::Path<(String, String)>,
        query: web::Query<OutQuery>,
    ) -> Result<HttpResponse, TallyError> {
        let (raw_event, id) = path.into_inner();
        let query = query.into_inner();
        let event = parse_public_event(&raw_event)?;

        let target = match query.to.as_deref() {
            Some(to) => validate_redirect_target(to)
                .map_err(|e| TallyError::invalid_request(e.to_string()))?,
            None => {
                let landing = state
                    .config
                    .api
                    .landing_url_template
                    .replace("{id}", &urlencoding::encode(id.trim()));
                validate_redirect_target(&landing).map_err(|e| {
                    TallyError::internal(format!("invalid landing url template: {}", e))
                })?
            }
        };

        let human = is_human_navigation(&req);
        let result = state
            .tracking
            .record(TrackRequest {
                id: id.clone(),
                event,
                value: None,
                timezone: query.tz,
                meta: extract_meta(&req, &state.config.api),
                count: human,
            })
            .await;

        match result {
            Ok(outcome) if outcome.counted => {
                trace!("Counted {} for {}", event, outcome.location);
            }
            Ok(_) => {}
            Err(TallyError::NotFound(_)) => {
                debug!("Redirecting unknown location {} without counting", id);
            }
            Err(e) => {
                warn!("Failed to record {} for {}: {}", event, id, e);
            }
        }

        Ok(HttpResponse::Found()
            .insert_header((header::LOCATION, target.as_str()))
            .insert_header((header::CACHE_CONTROL, "no-store"))
            .finish())
    }

    /// `POST /hit/{event}/{id}`
    ///
    /// 内部事件需要携带与 `internal_hit_secret` 一致的标记头。
    pub async fn hit(
        req: HttpRequest,
        state: web::Data<AppState>,
        path: web::Path<(String, String)>,
        query: web::Query<HitQuery>,
    ) -> Result<HttpResponse, TallyError> {
        let (raw_event, id) = path.into_inner();
        let query = query.into_inner();
        let event = parse_event(&raw_event)?;

        if event.is_internal() && !has_internal_marker(&req, &state.config.api.internal_hit_secret)
        {
            warn!("Rejected internal event {} for {} without marker", event, id);
            return Err(TallyError::forbidden(format!(
                "event '{}' requires the internal marker header",
                event
            )));
        }

        let outcome = state
            .tracking
            .record(TrackRequest {
                id,
                event,
                value: query.value,
                timezone: query.tz,
                meta: extract_meta(&req, &state.config.api),
                count: true,
            })
            .await?;

        Ok(HttpResponse::Ok().json(TrackResponse::from(outcome)))
    }
}

/// 采集路由
pub fn track_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/track", web::post().to(TrackService::track))
        .route("/out/{event}/{id}", web::get().to(TrackService::out))
        .route("/hit/{event}/{id}", web::post().to(TrackService::hit));
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_parse_public_event() {
        assert_eq!(parse_public_event("qr-scan").unwrap(), EventKey::QrScan);
        assert!(matches!(
            parse_public_event("qr-redeem"),
            Err(TallyError::Forbidden(_))
        ));
        assert!(matches!(
            parse_public_event("bogus"),
            Err(TallyError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_internal_marker() {
        let req = TestRequest::default()
            .insert_header((INTERNAL_HIT_HEADER, "s3cret"))
            .to_http_request();
        assert!(has_internal_marker(&req, "s3cret"));
        assert!(!has_internal_marker(&req, "other"));
        // 未配置 secret 时一律拒绝
        assert!(!has_internal_marker(&req, ""));

        let bare = TestRequest::default().to_http_request();
        assert!(!has_internal_marker(&bare, "s3cret"));
    }
}
