//! 集成测试共用的环境构造
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use actix_web::web;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};

use qrtally::api::AppState;
use qrtally::campaigns::StaticCampaignSource;
use qrtally::config::StaticConfig;
use qrtally::identity::{LocationId, generate_canonical_id};
use qrtally::errors::{Result, TallyError};
use qrtally::store::{KeyPage, KvStore, MemoryStore};

pub const ADMIN_TOKEN: &str = "admin-secret";
pub const HIT_SECRET: &str = "hit-secret";
pub const PUBLIC_BASE: &str = "https://qr.example.com";

pub const BROWSER_UA: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_4) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15";
pub const BOT_UA: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

pub fn test_config() -> StaticConfig {
    let mut config = StaticConfig::default();
    config.api.admin_token = ADMIN_TOKEN.to_string();
    config.api.internal_hit_secret = HIT_SECRET.to_string();
    config.api.public_base_url = PUBLIC_BASE.to_string();
    config.analytics.fallback_timezone = "UTC".to_string();
    config
}

pub fn cafe_id() -> LocationId {
    generate_canonical_id("my-cafe")
}

/// 单条不限日期的活动
pub fn open_campaign(location: &LocationId, key: &str) -> Value {
    json!({
        "locationId": location.as_str(),
        "campaignKey": key,
        "name": "Summer deal",
        "brand": "Acme",
        "discount": 10,
        "status": "active",
    })
}

pub struct TestEnv {
    pub state: web::Data<AppState>,
    pub store: Arc<MemoryStore>,
}

pub fn build_env(config: StaticConfig, campaigns: Value) -> TestEnv {
    let store = Arc::new(MemoryStore::new());
    let kv: Arc<dyn KvStore> = store.clone();
    build_env_with(config, campaigns, store, kv)
}

/// `kv` 是包在 `store` 外面的存储，应用通过它读写
pub fn build_env_with(
    config: StaticConfig,
    campaigns: Value,
    store: Arc<MemoryStore>,
    kv: Arc<dyn KvStore>,
) -> TestEnv {
    let state = AppState::build(
        Arc::new(config),
        kv,
        Arc::new(StaticCampaignSource::from_json(campaigns)),
    );
    TestEnv {
        state: web::Data::new(state),
        store,
    }
}

pub fn day(raw: &str) -> NaiveDate {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").unwrap()
}

/// 行为接近 Redis SCAN 的列举：
/// 每个真实页前先给一个带游标的空页，页大小只有 limit 的一半，页内每个 key 出现两次
pub struct ScanLikeStore {
    inner: Arc<MemoryStore>,
}

impl ScanLikeStore {
    pub fn wrap(inner: Arc<MemoryStore>) -> Arc<Self> {
        Arc::new(Self { inner })
    }
}

#[async_trait]
impl KvStore for ScanLikeStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KeyPage> {
        let cursor = cursor.unwrap_or("gap:");
        if let Some(inner) = cursor.strip_prefix("gap:") {
            return Ok(KeyPage {
                keys: Vec::new(),
                cursor: Some(format!("page:{}", inner)),
            });
        }
        let inner = cursor
            .strip_prefix("page:")
            .ok_or_else(|| TallyError::invalid_request(format!("bad cursor '{}'", cursor)))?;
        let inner = (!inner.is_empty()).then_some(inner);

        let page = self.inner.list(prefix, inner, (limit / 2).max(1)).await?;
        let keys = page.keys.iter().chain(page.keys.iter()).cloned().collect();
        Ok(KeyPage {
            keys,
            cursor: page.cursor.map(|next| format!("gap:{}", next)),
        })
    }

    fn backend_name(&self) -> &'static str {
        "scan-like"
    }
}

/// 打开开关后，key 含有 `pattern` 的写入全部失败
pub struct FailingWrites {
    inner: Arc<MemoryStore>,
    pattern: String,
    enabled: AtomicBool,
}

impl FailingWrites {
    pub fn wrap(inner: Arc<MemoryStore>, pattern: &str) -> Arc<Self> {
        Arc::new(Self {
            inner,
            pattern: pattern.to_string(),
            enabled: AtomicBool::new(false),
        })
    }

    pub fn fail(&self, on: bool) {
        self.enabled.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl KvStore for FailingWrites {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        if self.enabled.load(Ordering::SeqCst) && key.contains(&self.pattern) {
            return Err(TallyError::storage(format!("write to {} refused", key)));
        }
        self.inner.put(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key).await
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KeyPage> {
        self.inner.list(prefix, cursor, limit).await
    }

    fn backend_name(&self) -> &'static str {
        "failing-writes"
    }
}
