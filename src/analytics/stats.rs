//! 区间统计
//!
//! 按位置前缀翻页扫描计数器和扫码日志，在内存里折叠成仪表盘需要的形状。
//! 损坏的记录跳过，不影响整体结果。

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, warn};

use super::counter::parse_count;
use super::day::{parse_day, resolve_timezone};
use super::events::{CounterKey, EventKey};
use super::keys::{scan_prefix, split_scan_key, split_stats_key, stats_prefix};
use super::rating::rating_average;
use super::scan_log::{ScanLogEntry, Signal};
use crate::campaigns::{CampaignCatalog, CampaignDefinition};
use crate::config::AnalyticsConfig;
use crate::errors::{Result, TallyError};
use crate::identity::{IdentityResolver, LocationId};
use crate::store::{KvStore, list_all};

#[derive(Debug, Clone)]
pub struct StatsQuery {
    pub id: String,
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub location: LocationId,
    pub from: NaiveDate,
    pub to: NaiveDate,
    /// 仅回显：日期桶在写入时已经确定，查询不会按它重新划分
    pub timezone: String,
    /// day -> event -> count
    pub days: BTreeMap<String, BTreeMap<String, u64>>,
    pub totals: BTreeMap<String, u64>,
    pub rated_sum: u64,
    pub rating_score_sum: u64,
    pub rating_avg: f64,
    /// 最新在前，最多 `max_scan_records` 条
    pub scans: Vec<ScanLogEntry>,
    pub campaigns: Vec<CampaignReport>,
}

/// 单个活动的聚合结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct CampaignReport {
    pub campaign: String,
    pub name: Option<String>,
    pub brand: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<String>,
    pub discount: Option<String>,
    pub scans: u64,
    pub redemptions: u64,
    pub invalids: u64,
    pub unique_visitors: u64,
    pub repeat_visitors: u64,
    pub unique_redeemers: u64,
    pub repeat_redeemers: u64,
    pub languages: BTreeMap<String, u64>,
    pub countries: BTreeMap<String, u64>,
}

#[derive(Default)]
struct CampaignFold {
    scans: u64,
    redemptions: u64,
    invalids: u64,
    visitors: HashMap<String, u64>,
    redeemers: HashMap<String, u64>,
    languages: BTreeMap<String, u64>,
    countries: BTreeMap<String, u64>,
}

impl CampaignFold {
    fn add(&mut self, entry: &ScanLogEntry) {
        match entry.signal {
            Signal::Scan => {
                self.scans += 1;
                *self.visitors.entry(entry.visitor.clone()).or_default() += 1;
            }
            Signal::Redeem => {
                self.redemptions += 1;
                *self.redeemers.entry(entry.visitor.clone()).or_default() += 1;
            }
            Signal::Invalid => self.invalids += 1,
        }
        if let Some(lang) = entry.lang.as_deref().filter(|l| !l.is_empty()) {
            *self.languages.entry(lang.to_string()).or_default() += 1;
        }
        if let Some(country) = entry.country.as_deref().filter(|c| !c.is_empty()) {
            *self.countries.entry(country.to_string()).or_default() += 1;
        }
    }

    fn finish(self, key: String, definition: Option<&CampaignDefinition>) -> CampaignReport {
        let repeats = |seen: &HashMap<String, u64>| seen.values().filter(|n| **n > 1).count() as u64;
        CampaignReport {
            name: definition.and_then(|d| d.name.clone()),
            brand: definition.and_then(|d| d.brand.clone()),
            start: definition.and_then(|d| d.start),
            end: definition.and_then(|d| d.end),
            status: definition.map(|d| d.status.clone()),
            discount: definition.and_then(|d| d.discount.clone()),
            scans: self.scans,
            redemptions: self.redemptions,
            invalids: self.invalids,
            unique_visitors: self.visitors.len() as u64,
            repeat_visitors: repeats(&self.visitors),
            unique_redeemers: self.redeemers.len() as u64,
            repeat_redeemers: repeats(&self.redeemers),
            languages: self.languages,
            countries: self.countries,
            campaign: key,
        }
    }
}

pub struct StatsAggregator {
    store: Arc<dyn KvStore>,
    resolver: Arc<IdentityResolver>,
    catalog: Arc<CampaignCatalog>,
    analytics: AnalyticsConfig,
    page_size: usize,
}

impl StatsAggregator {
    pub fn new(
        store: Arc<dyn KvStore>,
        resolver: Arc<IdentityResolver>,
        catalog: Arc<CampaignCatalog>,
        analytics: AnalyticsConfig,
        page_size: usize,
    ) -> Self {
        Self {
            store,
            resolver,
            catalog,
            analytics,
            page_size: page_size.max(1),
        }
    }

    pub async fn query(&self, query: &StatsQuery) -> Result<StatsReport> {
        if query.from > query.to {
            return Err(TallyError::invalid_request("'from' must not be after 'to'"));
        }
        let span_days = (query.to - query.from).num_days() + 1;
        if span_days > self.analytics.max_range_days {
            return Err(TallyError::invalid_request(format!(
                "date range too large: {} days (max {})",
                span_days, self.analytics.max_range_days
            )));
        }

        let location = self
            .resolver
            .resolve(&query.id)
            .await?
            .ok_or_else(|| TallyError::not_found(format!("unknown location: {}", query.id.trim())))?;

        let timezone = resolve_timezone(
            query.timezone.as_deref(),
            None,
            &self.analytics.fallback_timezone,
        )
        .map(|tz| tz.name().to_string())
        .unwrap_or_else(|| "UTC".to_string());

        let mut report = StatsReport {
            location: location.clone(),
            from: query.from,
            to: query.to,
            timezone,
            days: BTreeMap::new(),
            totals: BTreeMap::new(),
            rated_sum: 0,
            rating_score_sum: 0,
            rating_avg: 0.0,
            scans: Vec::new(),
            campaigns: Vec::new(),
        };

        self.fold_counters(&location, query, &mut report).await?;
        self.fold_scans(&location, query, &mut report).await?;

        report.rated_sum = report
            .totals
            .get(EventKey::Rating.as_str())
            .copied()
            .unwrap_or(0);
        report.rating_avg = rating_average(report.rated_sum, report.rating_score_sum);

        debug!(
            "Stats for {} [{}..{}]: {} day(s), {} scan record(s), {} campaign(s)",
            location,
            query.from,
            query.to,
            report.days.len(),
            report.scans.len(),
            report.campaigns.len()
        );
        Ok(report)
    }

    async fn fold_counters(
        &self,
        location: &LocationId,
        query: &StatsQuery,
        report: &mut StatsReport,
    ) -> Result<()> {
        // SCAN 可能重复返回同一个 key，累加前先去重
        let keys: BTreeSet<String> =
            list_all(self.store.as_ref(), &stats_prefix(location.as_str()), self.page_size)
                .await?
                .into_iter()
                .collect();

        let mut wanted: Vec<(String, String, CounterKey)> = Vec::new();
        for key in keys {
            let Some(raw) = split_stats_key(&key) else {
                continue;
            };
            // 非规范日期或事件名属于待迁移的旧数据
            let (Some(day), Some(counter)) = (parse_day(raw.day), CounterKey::parse(raw.counter))
            else {
                continue;
            };
            if day < query.from || day > query.to {
                continue;
            }
            let day = raw.day.to_string();
            wanted.push((key, day, counter));
        }

        for chunk in wanted.chunks(self.page_size) {
            let keys: Vec<String> = chunk.iter().map(|(k, _, _)| k.clone()).collect();
            let values = self.store.get_many(&keys).await?;
            for ((key, day, counter), value) in chunk.iter().zip(values) {
                let Some(raw) = value else {
                    // 列举与读取之间过期
                    continue;
                };
                let Some(count) = parse_count(&raw) else {
                    warn!("Skipping counter {} with non-numeric value '{}'", key, raw);
                    continue;
                };
                match counter {
                    CounterKey::RatingScore => report.rating_score_sum += count,
                    CounterKey::Event(event) => {
                        *report
                            .days
                            .entry(day.clone())
                            .or_default()
                            .entry(event.as_str().to_string())
                            .or_default() += count;
                        *report
                            .totals
                            .entry(event.as_str().to_string())
                            .or_default() += count;
                    }
                }
            }
        }
        Ok(())
    }

    async fn fold_scans(
        &self,
        location: &LocationId,
        query: &StatsQuery,
        report: &mut StatsReport,
    ) -> Result<()> {
        let mut keys: Vec<String> =
            list_all(self.store.as_ref(), &scan_prefix(location.as_str()), self.page_size)
                .await?
                .into_iter()
                .filter(|key| {
                    split_scan_key(key)
                        .and_then(|raw| parse_day(raw.day))
                        .is_some_and(|day| day >= query.from && day <= query.to)
                })
                .collect();
        // key 字典序即时间序
        keys.sort_unstable_by(|a, b| b.cmp(a));
        keys.dedup();

        let mut folds: BTreeMap<String, CampaignFold> = BTreeMap::new();
        for chunk in keys.chunks(self.page_size) {
            let values = self.store.get_many(chunk).await?;
            for (key, value) in chunk.iter().zip(values) {
                let Some(raw) = value else {
                    continue;
                };
                let entry = match serde_json::from_str::<ScanLogEntry>(&raw) {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Skipping malformed scan log entry {}: {}", key, e);
                        continue;
                    }
                };
                if let Some(campaign) = entry.campaign.as_deref().filter(|c| !c.is_empty()) {
                    folds.entry(campaign.to_string()).or_default().add(&entry);
                }
                if report.scans.len() < self.analytics.max_scan_records {
                    report.scans.push(entry);
                }
            }
        }

        if !folds.is_empty() {
            let definitions = self.catalog.for_location(location).await;
            report.campaigns = folds
                .into_iter()
                .map(|(key, fold)| {
                    let definition = definitions.iter().find(|d| d.key == key);
                    fold.finish(key, definition)
                })
                .collect();
        }
        Ok(())
    }
}
