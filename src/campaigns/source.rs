//! 活动元数据来源
//!
//! - `HttpCampaignSource`：外部 HTTP JSON 列表（ureq，在 spawn_blocking 中执行）
//! - `StaticCampaignSource`：本地 JSON 文件或内存列表
//!
//! `CampaignCatalog` 在来源之上加一层短 TTL 缓存，并把位置字段规范化。

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use moka::future::Cache;
use tracing::{debug, info, trace, warn};
use ureq::Agent;

use super::matcher::{find_active_campaign, pick_active_campaign};
use super::model::{CampaignDefinition, RawCampaign, parse_listing};
use crate::config::CampaignsConfig;
use crate::errors::{Result, TallyError};
use crate::identity::{IdentityResolver, LocationId};

/// 活动来源
#[async_trait]
pub trait CampaignSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawCampaign>>;

    /// 来源名称（用于日志）
    fn name(&self) -> &'static str;
}

/// 全局 HTTP Agent（ureq 的 Agent 是 Send + Sync）
static HTTP_AGENT: OnceLock<Agent> = OnceLock::new();

fn get_agent(timeout: Duration) -> &'static Agent {
    HTTP_AGENT.get_or_init(|| {
        Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into()
    })
}

pub struct HttpCampaignSource {
    url: String,
    timeout: Duration,
}

impl HttpCampaignSource {
    pub fn new(url: &str, timeout: Duration) -> Self {
        Self {
            url: url.to_string(),
            timeout,
        }
    }

    /// 同步拉取（在 spawn_blocking 中调用）
    fn fetch_sync(url: String, timeout: Duration) -> Result<serde_json::Value> {
        let agent = get_agent(timeout);
        let resp = agent
            .get(&url)
            .header("Accept", "application/json")
            .call()
            .map_err(|e| TallyError::upstream(format!("campaign listing request failed: {}", e)))?;
        resp.into_body()
            .read_json::<serde_json::Value>()
            .map_err(|e| TallyError::upstream(format!("campaign listing is not valid JSON: {}", e)))
    }
}

#[async_trait]
impl CampaignSource for HttpCampaignSource {
    async fn fetch(&self) -> Result<Vec<RawCampaign>> {
        let url = self.url.clone();
        let timeout = self.timeout;
        let value = tokio::task::spawn_blocking(move || Self::fetch_sync(url, timeout))
            .await
            .map_err(|e| TallyError::internal(format!("campaign fetch task failed: {}", e)))??;
        Ok(parse_listing(value))
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// 固定活动列表
#[derive(Default)]
pub struct StaticCampaignSource {
    campaigns: Vec<RawCampaign>,
}

impl StaticCampaignSource {
    pub fn new(campaigns: Vec<RawCampaign>) -> Self {
        Self { campaigns }
    }

    pub fn from_json(value: serde_json::Value) -> Self {
        Self::new(parse_listing(value))
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let value: serde_json::Value = serde_json::from_str(&content)?;
        Ok(Self::from_json(value))
    }
}

#[async_trait]
impl CampaignSource for StaticCampaignSource {
    async fn fetch(&self) -> Result<Vec<RawCampaign>> {
        Ok(self.campaigns.clone())
    }

    fn name(&self) -> &'static str {
        "static"
    }
}

/// 根据配置选择来源：`source_url` 优先，其次 `file`，都没有时为空列表
pub fn create_source(config: &CampaignsConfig) -> Result<Arc<dyn CampaignSource>> {
    let timeout = Duration::from_secs(config.timeout_secs.max(1));
    let source: Arc<dyn CampaignSource> = match (&config.source_url, &config.file) {
        (Some(url), _) if !url.trim().is_empty() => {
            info!("Campaigns: fetching from {}", url);
            Arc::new(HttpCampaignSource::new(url.trim(), timeout))
        }
        (_, Some(path)) if !path.trim().is_empty() => {
            info!("Campaigns: loading from file {}", path);
            Arc::new(StaticCampaignSource::from_file(path.trim())?)
        }
        _ => {
            info!("Campaigns: no source configured, campaign list is empty");
            Arc::new(StaticCampaignSource::default())
        }
    };
    Ok(source)
}

const CATALOG_KEY: &str = "campaigns";

/// 带缓存的活动目录
pub struct CampaignCatalog {
    source: Arc<dyn CampaignSource>,
    resolver: Arc<IdentityResolver>,
    cache: Cache<&'static str, Arc<Vec<CampaignDefinition>>>,
}

impl CampaignCatalog {
    pub fn new(
        source: Arc<dyn CampaignSource>,
        resolver: Arc<IdentityResolver>,
        cache_ttl: Duration,
    ) -> Self {
        let cache = Cache::builder()
            .time_to_live(cache_ttl)
            .max_capacity(1)
            .build();
        Self {
            source,
            resolver,
            cache,
        }
    }

    /// 拉取并规范化；失败不缓存，下次请求重试
    pub async fn campaigns_strict(&self) -> Result<Arc<Vec<CampaignDefinition>>> {
        self.cache
            .try_get_with(CATALOG_KEY, async {
                trace!("Campaign cache miss, fetching from {}", self.source.name());
                let raws = self.source.fetch().await?;
                Ok::<_, TallyError>(Arc::new(self.normalize(raws).await))
            })
            .await
            .map_err(|e: Arc<TallyError>| (*e).clone())
    }

    /// 尽力而为：失败时退化为空列表
    pub async fn campaigns(&self) -> Arc<Vec<CampaignDefinition>> {
        match self.campaigns_strict().await {
            Ok(list) => list,
            Err(e) => {
                warn!("Campaign metadata unavailable, continuing without: {}", e);
                Arc::new(Vec::new())
            }
        }
    }

    /// 某位置在某天生效的活动
    pub async fn active_for(&self, location: &LocationId, day: NaiveDate) -> Option<CampaignDefinition> {
        let campaigns = self.campaigns().await;
        pick_active_campaign(&campaigns, location, day).cloned()
    }

    /// 指定 key 的活动在某天对该位置是否生效
    pub async fn active_by_key(
        &self,
        location: &LocationId,
        key: &str,
        day: NaiveDate,
    ) -> Option<CampaignDefinition> {
        let campaigns = self.campaigns().await;
        find_active_campaign(&campaigns, location, key, day).cloned()
    }

    /// 某位置的全部活动定义
    pub async fn for_location(&self, location: &LocationId) -> Vec<CampaignDefinition> {
        self.campaigns()
            .await
            .iter()
            .filter(|c| &c.location == location)
            .cloned()
            .collect()
    }

    pub async fn invalidate(&self) {
        self.cache.invalidate(CATALOG_KEY).await;
    }

    async fn normalize(&self, raws: Vec<RawCampaign>) -> Vec<CampaignDefinition> {
        let total = raws.len();
        let mut out = Vec::with_capacity(total);
        for raw in raws {
            let Some(location_ref) = raw.location_ref().map(str::to_string) else {
                warn!("Skipping campaign without a location");
                continue;
            };
            let location = match self.resolver.resolve(&location_ref).await {
                Ok(Some(id)) => id,
                Ok(None) => {
                    warn!("Skipping campaign for unknown location '{}'", location_ref);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping campaign, location '{}' lookup failed: {}", location_ref, e);
                    continue;
                }
            };
            if let Some(def) = raw.into_definition(location) {
                out.push(def);
            }
        }
        debug!("Loaded {}/{} campaign definitions", out.len(), total);
        out
    }
}
