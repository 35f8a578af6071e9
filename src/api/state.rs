use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::analytics::{
    CounterStore, KvCounterStore, RatingAggregator, ScanLog, StatsAggregator, TokenMachine,
};
use crate::campaigns::{CampaignCatalog, CampaignSource, create_source};
use crate::config::StaticConfig;
use crate::errors::Result;
use crate::identity::IdentityResolver;
use crate::services::{MaintenanceService, RedemptionService, TrackingService};
use crate::store::{KvStore, create_store, days};

/// 共享应用状态（每个 worker 持有一份 `web::Data` 克隆）
///
/// 只有只读配置和各组件的 `Arc`，请求之间没有可变共享状态。
pub struct AppState {
    pub config: Arc<StaticConfig>,
    pub store: Arc<dyn KvStore>,
    pub resolver: Arc<IdentityResolver>,
    pub counters: Arc<dyn CounterStore>,
    pub catalog: Arc<CampaignCatalog>,
    pub tokens: Arc<TokenMachine>,
    pub tracking: Arc<TrackingService>,
    pub redemption: Arc<RedemptionService>,
    pub stats: Arc<StatsAggregator>,
    pub maintenance: Arc<MaintenanceService>,
    pub started_at: Instant,
}

impl AppState {
    /// 按配置创建存储和活动来源
    pub async fn from_config(config: Arc<StaticConfig>) -> Result<Self> {
        let store = create_store(&config.store).await?;
        let source = create_source(&config.campaigns)?;
        Ok(Self::build(config, store, source))
    }

    /// 组装各组件（测试可注入内存存储和固定活动列表）
    pub fn build(
        config: Arc<StaticConfig>,
        store: Arc<dyn KvStore>,
        source: Arc<dyn CampaignSource>,
    ) -> Self {
        let analytics = &config.analytics;

        let resolver = Arc::new(IdentityResolver::new(store.clone()));
        let kv_counters = Arc::new(KvCounterStore::new(
            store.clone(),
            days(analytics.counter_ttl_days),
        ));
        let counters: Arc<dyn CounterStore> = kv_counters.clone();
        let catalog = Arc::new(CampaignCatalog::new(
            source,
            resolver.clone(),
            Duration::from_secs(config.campaigns.cache_ttl_secs.max(1)),
        ));
        let scan_log = Arc::new(ScanLog::new(
            store.clone(),
            catalog.clone(),
            days(analytics.scan_ttl_days),
        ));
        let tokens = Arc::new(TokenMachine::new(
            store.clone(),
            days(analytics.token_ttl_days),
        ));
        let ratings = Arc::new(RatingAggregator::new(counters.clone()));

        let tracking = Arc::new(TrackingService::new(
            resolver.clone(),
            counters.clone(),
            ratings,
            scan_log.clone(),
            analytics.fallback_timezone.clone(),
        ));
        let redemption = Arc::new(RedemptionService::new(
            tracking.clone(),
            tokens.clone(),
            counters.clone(),
            scan_log,
            catalog.clone(),
            &config.api.public_base_url,
        ));
        let stats = Arc::new(StatsAggregator::new(
            store.clone(),
            resolver.clone(),
            catalog.clone(),
            analytics.clone(),
            config.store.list_page_size,
        ));
        let maintenance = Arc::new(MaintenanceService::new(
            store.clone(),
            resolver.clone(),
            kv_counters,
            days(analytics.scan_ttl_days),
            config.store.list_page_size,
        ));

        Self {
            config,
            store,
            resolver,
            counters,
            catalog,
            tokens,
            tracking,
            redemption,
            stats,
            maintenance,
            started_at: Instant::now(),
        }
    }
}
