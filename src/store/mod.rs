//! 键值存储抽象
//!
//! 整个引擎只依赖一个扁平的 KV 命名空间：
//! - 单 key 读写，写入可带 TTL（到期自动清理，没有显式 GC）
//! - 按前缀分页列举 key（游标续读，不假设一次读完）
//! - 没有事务，也不保证读己之写；上层所有“读-改-写”都可能丢更新
//!
//! 后端：
//! - `memory`：进程内 DashMap，测试与单机部署
//! - `redis`：共享部署

pub mod memory;
pub mod redis;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::config::StoreConfig;
use crate::errors::{Result, TallyError};

pub use memory::MemoryStore;
pub use self::redis::RedisStore;

/// 一页 key 列举结果
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPage {
    pub keys: Vec<String>,
    /// `None` 表示已经列举完毕
    pub cursor: Option<String>,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// 批量读取，返回值与 `keys` 一一对应
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            values.push(self.get(key).await?);
        }
        Ok(values)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// 按前缀列举 key；`cursor` 为上一页返回的游标
    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KeyPage>;

    /// 后端名称（用于日志和健康检查）
    fn backend_name(&self) -> &'static str;
}

/// 按前缀列举全部 key（内部循环翻页）
pub async fn list_all(store: &dyn KvStore, prefix: &str, page_size: usize) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let page = store.list(prefix, cursor.as_deref(), page_size).await?;
        keys.extend(page.keys);
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(keys)
}

/// 根据配置创建存储后端
pub async fn create_store(config: &StoreConfig) -> Result<Arc<dyn KvStore>> {
    let store: Arc<dyn KvStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryStore::new()),
        "redis" => Arc::new(RedisStore::connect(&config.redis.url, &config.redis.key_prefix).await?),
        other => {
            return Err(TallyError::internal(format!(
                "Unknown store backend '{}'. Valid: memory, redis",
                other
            )));
        }
    };
    info!("Using key-value store backend: {}", store.backend_name());
    Ok(store)
}

/// 天数转 TTL
pub fn days(n: u64) -> Duration {
    Duration::from_secs(n * 24 * 60 * 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_all_pages_through_everything() {
        let store = MemoryStore::new();
        for i in 0..25 {
            store
                .put(&format!("stats:L:{:02}", i), "1", None)
                .await
                .unwrap();
        }
        store.put("scan:L:x", "1", None).await.unwrap();

        let keys = list_all(&store, "stats:", 7).await.unwrap();
        assert_eq!(keys.len(), 25);
        assert!(keys.iter().all(|k| k.starts_with("stats:")));
    }

    #[tokio::test]
    async fn test_create_store_rejects_unknown_backend() {
        let config = StoreConfig {
            backend: "sled".to_string(),
            ..Default::default()
        };
        let err = create_store(&config).await.err().unwrap();
        assert_eq!(err.code(), "server_error");
    }

    #[test]
    fn test_days() {
        assert_eq!(days(1), Duration::from_secs(86_400));
    }
}
