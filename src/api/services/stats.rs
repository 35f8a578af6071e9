use actix_web::{HttpResponse, web};
use serde::Deserialize;
use tracing::debug;

use crate::analytics::StatsQuery;
use crate::analytics::day::parse_day;
use crate::api::AppState;
use crate::errors::TallyError;

#[derive(Debug, Deserialize)]
pub struct StatsParams {
    pub id: String,
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub tz: Option<String>,
}

fn require_day(field: &str, raw: &str) -> Result<chrono::NaiveDate, TallyError> {
    parse_day(raw.trim()).ok_or_else(|| {
        TallyError::invalid_request(format!(
            "'{}' must be a date in YYYY-MM-DD format, got '{}'",
            field, raw
        ))
    })
}

pub struct StatsService;

impl StatsService {
    /// `GET /stats?id=&from=&to=&tz=`
    ///
    /// 计数在写入时已按当地日期分桶，`tz` 不会重新分桶，
    /// 只决定响应里回显的 `timezone`（缺省为回退时区）。
    pub async fn stats(
        state: web::Data<AppState>,
        params: web::Query<StatsParams>,
    ) -> Result<HttpResponse, TallyError> {
        let params = params.into_inner();
        let query = StatsQuery {
            from: require_day("from", &params.from)?,
            to: require_day("to", &params.to)?,
            id: params.id,
            timezone: params.tz,
        };
        debug!("Stats query for {} {}..{}", query.id, query.from, query.to);

        let report = state.stats.query(&query).await?;
        Ok(HttpResponse::Ok().json(report))
    }
}

pub fn stats_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/stats", web::get().to(StatsService::stats));
}
