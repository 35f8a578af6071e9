use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::trace;

use super::{KeyPage, KvStore};
use crate::errors::Result;

struct MemoryEntry {
    value: String,
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// 进程内 KV 存储
///
/// 过期项惰性清理：读到或列举到时才删除。
/// 列举按 key 字典序，游标为上一页最后一个 key。
#[derive(Default)]
pub struct MemoryStore {
    inner: DashMap<String, MemoryEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    /// 当前未过期的条目数
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner.iter().filter(|e| !e.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let expired = match self.inner.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            trace!("MemoryStore: evicting expired key {}", key);
            self.inner.remove_if(key, |_, e| e.is_expired(now));
        }
        Ok(None)
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        self.inner.insert(
            key.to_string(),
            MemoryEntry {
                value: value.to_string(),
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.inner.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KeyPage> {
        let now = Instant::now();
        let mut matching: Vec<String> = Vec::new();
        let mut expired: Vec<String> = Vec::new();

        for entry in self.inner.iter() {
            let key = entry.key();
            if !key.starts_with(prefix) {
                continue;
            }
            if entry.is_expired(now) {
                expired.push(key.clone());
                continue;
            }
            if cursor.is_some_and(|c| key.as_str() <= c) {
                continue;
            }
            matching.push(key.clone());
        }

        for key in expired {
            self.inner.remove_if(&key, |_, e| e.is_expired(now));
        }

        matching.sort_unstable();
        let limit = limit.max(1);
        let cursor = if matching.len() > limit {
            matching.truncate(limit);
            matching.last().cloned()
        } else {
            None
        };

        Ok(KeyPage {
            keys: matching,
            cursor,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.put("a", "1", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("1".to_string()));

        store.put("a", "2", None).await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), Some("2".to_string()));

        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_expired_entries_are_invisible() {
        let store = MemoryStore::new();
        store
            .put("gone", "x", Some(Duration::from_millis(0)))
            .await
            .unwrap();
        store
            .put("kept", "y", Some(Duration::from_secs(3600)))
            .await
            .unwrap();

        assert_eq!(store.get("gone").await.unwrap(), None);
        let page = store.list("", None, 10).await.unwrap();
        assert_eq!(page.keys, vec!["kept".to_string()]);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_list_cursor_continuation() {
        let store = MemoryStore::new();
        for key in ["p:c", "p:a", "p:b", "q:a"] {
            store.put(key, "1", None).await.unwrap();
        }

        let first = store.list("p:", None, 2).await.unwrap();
        assert_eq!(first.keys, vec!["p:a".to_string(), "p:b".to_string()]);
        assert_eq!(first.cursor.as_deref(), Some("p:b"));

        let second = store.list("p:", first.cursor.as_deref(), 2).await.unwrap();
        assert_eq!(second.keys, vec!["p:c".to_string()]);
        assert_eq!(second.cursor, None);
    }

    #[tokio::test]
    async fn test_get_many_preserves_order() {
        let store = MemoryStore::new();
        store.put("k1", "v1", None).await.unwrap();
        store.put("k3", "v3", None).await.unwrap();

        let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
        let values = store.get_many(&keys).await.unwrap();
        assert_eq!(
            values,
            vec![Some("v1".to_string()), None, Some("v3".to_string())]
        );
    }
}
