use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use tracing::{trace, warn};

use super::canonical::{LocationId, is_canonical, normalize_slug};
use crate::errors::Result;
use crate::store::KvStore;

/// 别名缓存 TTL
const ALIAS_CACHE_TTL_SECS: u64 = 5 * 60;
/// 别名缓存最大容量
const ALIAS_CACHE_MAX_CAPACITY: u64 = 10_000;

/// 别名记录的 key
pub fn alias_key(slug: &str) -> String {
    format!("alias:{}", slug)
}

/// slug / 规范 ID 解析器
///
/// 只缓存命中结果；未知 slug 每次都回源，种子写入后立即可见。
pub struct IdentityResolver {
    store: Arc<dyn KvStore>,
    cache: Cache<String, LocationId>,
}

impl IdentityResolver {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ALIAS_CACHE_TTL_SECS))
            .max_capacity(ALIAS_CACHE_MAX_CAPACITY)
            .build();
        Self { store, cache }
    }

    /// 解析 ID 或 slug
    ///
    /// 规范形式直接返回，不查表。`Ok(None)` 表示未知位置，
    /// 调用方不得把原始输入当作存储 key 使用。
    pub async fn resolve(&self, id_or_slug: &str) -> Result<Option<LocationId>> {
        if let Some(id) = LocationId::parse(id_or_slug) {
            return Ok(Some(id));
        }

        let slug = normalize_slug(id_or_slug);
        if slug.is_empty() {
            return Ok(None);
        }

        if let Some(id) = self.cache.get(&slug).await {
            trace!("Alias cache hit: {} -> {}", slug, id);
            return Ok(Some(id));
        }

        let Some(raw) = self.store.get(&alias_key(&slug)).await? else {
            trace!("Alias not found: {}", slug);
            return Ok(None);
        };

        match LocationId::parse(&raw) {
            Some(id) => {
                self.cache.insert(slug, id.clone()).await;
                Ok(Some(id))
            }
            None => {
                warn!("Alias '{}' points to a non-canonical id '{}', ignoring", slug, raw);
                Ok(None)
            }
        }
    }

    /// 读取别名记录原值（不经缓存），用于种子冲突检测
    pub async fn lookup_alias(&self, slug: &str) -> Result<Option<String>> {
        self.store.get(&alias_key(&normalize_slug(slug))).await
    }

    /// 写入别名记录（永不过期）
    pub async fn put_alias(&self, slug: &str, id: &LocationId) -> Result<()> {
        let slug = normalize_slug(slug);
        debug_assert!(is_canonical(id.as_str()));
        self.store.put(&alias_key(&slug), id.as_str(), None).await?;
        self.cache.invalidate(&slug).await;
        Ok(())
    }
}
