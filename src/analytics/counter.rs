use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{trace, warn};

use super::events::CounterKey;
use super::keys::stats_key;
use crate::errors::Result;
use crate::identity::LocationId;
use crate::store::KvStore;

/// 计数器存储
///
/// 所有写入都是“读-改-写”，不是原子自增：同一 key 的并发自增可能交错并丢失更新。
/// 这是可用性优先的取舍，近似计数即可，不要在这里加锁。
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// 把 `delta` 加到计数器上，返回写入后的值
    async fn add(
        &self,
        location: &LocationId,
        day: NaiveDate,
        counter: CounterKey,
        delta: u64,
    ) -> Result<u64>;

    async fn increment(
        &self,
        location: &LocationId,
        day: NaiveDate,
        counter: CounterKey,
    ) -> Result<u64> {
        self.add(location, day, counter, 1).await
    }

    async fn get(&self, location: &LocationId, day: NaiveDate, counter: CounterKey)
    -> Result<u64>;
}

/// 解析计数器取值；非数字视为损坏
pub fn parse_count(raw: &str) -> Option<u64> {
    raw.trim().parse().ok()
}

/// 基于 KV 存储的计数器
pub struct KvCounterStore {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl KvCounterStore {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    /// 按完整 key 累加（维护任务合并旧 key 时使用）
    pub async fn add_to_key(&self, key: &str, delta: u64) -> Result<u64> {
        let current = match self.store.get(key).await? {
            Some(raw) => parse_count(&raw).unwrap_or_else(|| {
                warn!("Counter {} holds a non-numeric value '{}', resetting", key, raw);
                0
            }),
            None => 0,
        };
        let next = current.saturating_add(delta);
        self.store
            .put(key, &next.to_string(), Some(self.ttl))
            .await?;
        trace!("Counter {} -> {}", key, next);
        Ok(next)
    }
}

#[async_trait]
impl CounterStore for KvCounterStore {
    async fn add(
        &self,
        location: &LocationId,
        day: NaiveDate,
        counter: CounterKey,
        delta: u64,
    ) -> Result<u64> {
        let key = stats_key(location.as_str(), day, counter);
        self.add_to_key(&key, delta).await
    }

    async fn get(
        &self,
        location: &LocationId,
        day: NaiveDate,
        counter: CounterKey,
    ) -> Result<u64> {
        let key = stats_key(location.as_str(), day, counter);
        Ok(self
            .store
            .get(&key)
            .await?
            .as_deref()
            .and_then(parse_count)
            .unwrap_or(0))
    }
}
