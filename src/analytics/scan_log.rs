use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use super::day::format_day;
use super::keys::scan_key;
use crate::campaigns::CampaignCatalog;
use crate::identity::LocationId;
use crate::store::KvStore;
use crate::utils::generate_short_id;

const ENTRY_ID_LENGTH: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Scan,
    Redeem,
    Invalid,
}

/// 请求元数据（来自边缘节点请求头）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMeta {
    pub user_agent: Option<String>,
    pub language: Option<String>,
    pub country: Option<String>,
    pub city: Option<String>,
    /// 边缘节点给出的 IANA 时区
    pub timezone: Option<String>,
}

impl RequestMeta {
    /// 访客指纹：UA + 国家，不使用 IP
    pub fn visitor_fingerprint(&self) -> String {
        format!(
            "{}|{}",
            self.user_agent.as_deref().unwrap_or_default(),
            self.country.as_deref().unwrap_or_default()
        )
    }
}

/// 一次扫码交互
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanLogEntry {
    pub id: String,
    pub ts: DateTime<Utc>,
    pub location: String,
    pub day: String,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub signal: Signal,
    #[serde(default)]
    pub visitor: String,
    #[serde(default)]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// 扫码 / 兑换日志
///
/// 写入失败只记 warn，绝不向调用方传播。
pub struct ScanLog {
    store: Arc<dyn KvStore>,
    catalog: Arc<CampaignCatalog>,
    ttl: Duration,
}

impl ScanLog {
    pub fn new(store: Arc<dyn KvStore>, catalog: Arc<CampaignCatalog>, ttl: Duration) -> Self {
        Self {
            store,
            catalog,
            ttl,
        }
    }

    /// 记录扫码，活动由匹配器推导
    pub async fn log_scan(
        &self,
        location: &LocationId,
        day: NaiveDate,
        meta: &RequestMeta,
    ) -> Option<ScanLogEntry> {
        let campaign = self.matched_campaign(location, day).await;
        self.append(location, day, meta, Signal::Scan, campaign, None)
            .await
    }

    /// 记录成功兑换
    pub async fn log_redeem(
        &self,
        location: &LocationId,
        day: NaiveDate,
        meta: &RequestMeta,
        campaign: &str,
    ) -> Option<ScanLogEntry> {
        self.append(
            location,
            day,
            meta,
            Signal::Redeem,
            Some(campaign.to_string()),
            None,
        )
        .await
    }

    /// 记录无效兑换；未给出活动时由匹配器推导
    pub async fn log_invalid(
        &self,
        location: &LocationId,
        day: NaiveDate,
        meta: &RequestMeta,
        campaign: Option<&str>,
        reason: &str,
    ) -> Option<ScanLogEntry> {
        let campaign = match campaign.map(str::trim).filter(|c| !c.is_empty()) {
            Some(c) => Some(c.to_string()),
            None => self.matched_campaign(location, day).await,
        };
        self.append(
            location,
            day,
            meta,
            Signal::Invalid,
            campaign,
            Some(reason.to_string()),
        )
        .await
    }

    async fn matched_campaign(&self, location: &LocationId, day: NaiveDate) -> Option<String> {
        self.catalog
            .active_for(location, day)
            .await
            .map(|c| c.key)
    }

    async fn append(
        &self,
        location: &LocationId,
        day: NaiveDate,
        meta: &RequestMeta,
        signal: Signal,
        campaign: Option<String>,
        reason: Option<String>,
    ) -> Option<ScanLogEntry> {
        let ts = Utc::now();
        let entry = ScanLogEntry {
            id: generate_short_id(ENTRY_ID_LENGTH),
            ts,
            location: location.to_string(),
            day: format_day(day),
            user_agent: meta.user_agent.clone(),
            lang: meta.language.clone(),
            country: meta.country.clone(),
            city: meta.city.clone(),
            signal,
            visitor: meta.visitor_fingerprint(),
            campaign,
            reason,
        };

        let value = match serde_json::to_string(&entry) {
            Ok(v) => v,
            Err(e) => {
                warn!("Failed to serialize scan log entry: {}", e);
                return None;
            }
        };
        let key = scan_key(location.as_str(), day, ts.timestamp_millis(), &entry.id);
        match self.store.put(&key, &value, Some(self.ttl)).await {
            Ok(()) => {
                trace!("Scan log {:?} written: {}", signal, key);
                Some(entry)
            }
            Err(e) => {
                warn!("Failed to write scan log entry {}: {}", key, e);
                None
            }
        }
    }
}
