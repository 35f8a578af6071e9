use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, aio::MultiplexedConnection};
use tokio::sync::RwLock;
use tracing::{debug, error, trace};

use super::{KeyPage, KvStore};
use crate::errors::{Result, TallyError};

/// Redis KV 存储
///
/// 所有 key 自动加上 `key_prefix`，列举结果会把前缀去掉。
/// 列举基于 SCAN：同一轮内可能出现重复 key，页大小只是提示值，
/// 调用方必须容忍空页和重复。
pub struct RedisStore {
    client: redis::Client,
    /// 持久化连接，使用 RwLock 保护
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    key_prefix: String,
}

impl RedisStore {
    pub async fn connect(url: &str, key_prefix: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;

        let mut conn = client.get_multiplexed_async_connection().await.map_err(|e| {
            error!(
                "Failed to connect to Redis: {}. Check Redis server status and URL: {}",
                e, url
            );
            e
        })?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis connection test successful: {}", pong);

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(Some(conn))),
            key_prefix: key_prefix.to_string(),
        })
    }

    /// 获取或建立持久连接
    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        {
            let conn_guard = self.connection.read().await;
            if let Some(ref conn) = *conn_guard {
                return Ok(conn.clone());
            }
        }

        let mut conn_guard = self.connection.write().await;

        // 双重检查，避免竞态条件
        if let Some(ref conn) = *conn_guard {
            return Ok(conn.clone());
        }

        let new_conn = self.client.get_multiplexed_async_connection().await?;
        *conn_guard = Some(new_conn.clone());
        debug!("Redis connection established and cached");

        Ok(new_conn)
    }

    /// 重置连接（在连接错误时调用）
    async fn reset_connection(&self) {
        let mut conn_guard = self.connection.write().await;
        *conn_guard = None;
        debug!("Redis connection reset due to error");
    }

    /// 命令失败时丢弃缓存的连接，下次重新建立
    async fn checked<T>(&self, result: redis::RedisResult<T>) -> Result<T> {
        match result {
            Ok(v) => Ok(v),
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    self.reset_connection().await;
                }
                Err(e.into())
            }
        }
    }

    fn make_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }

    fn strip_key(&self, key: String) -> String {
        match key.strip_prefix(&self.key_prefix) {
            Some(stripped) => stripped.to_string(),
            None => key,
        }
    }
}

/// 转义 glob 特殊字符，SCAN MATCH 只做前缀匹配
fn escape_glob(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + 4);
    for c in raw.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let result: redis::RedisResult<Option<String>> = conn.get(self.make_key(key)).await;
        let value = self.checked(result).await?;
        trace!("RedisStore get {} -> hit={}", key, value.is_some());
        Ok(value)
    }

    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.get_connection().await?;
        let full_keys: Vec<String> = keys.iter().map(|k| self.make_key(k)).collect();
        let result = redis::cmd("MGET")
            .arg(&full_keys)
            .query_async::<Vec<Option<String>>>(&mut conn)
            .await;
        self.checked(result).await
    }

    async fn put(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let redis_key = self.make_key(key);
        let result = match ttl {
            Some(ttl) => {
                conn.set_ex::<String, &str, ()>(redis_key, value, ttl.as_secs().max(1))
                    .await
            }
            None => conn.set::<String, &str, ()>(redis_key, value).await,
        };
        self.checked(result).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let result = conn.del::<String, i64>(self.make_key(key)).await;
        let deleted = self.checked(result).await?;
        trace!("RedisStore delete {} -> {}", key, deleted);
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<&str>, limit: usize) -> Result<KeyPage> {
        let mut conn = self.get_connection().await?;
        let scan_cursor = parse_scan_cursor(cursor)?;
        let pattern = format!("{}*", escape_glob(&self.make_key(prefix)));

        let result = redis::cmd("SCAN")
            .arg(scan_cursor)
            .arg("MATCH")
            .arg(&pattern)
            .arg("COUNT")
            .arg(limit.max(1))
            .query_async::<(u64, Vec<String>)>(&mut conn)
            .await;
        let (next, keys) = self.checked(result).await?;

        Ok(KeyPage {
            keys: keys.into_iter().map(|k| self.strip_key(k)).collect(),
            cursor: (next != 0).then(|| next.to_string()),
        })
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}

/// 游标只能是上一页返回的 SCAN 游标；解析失败不能退回 0 从头扫
fn parse_scan_cursor(cursor: Option<&str>) -> Result<u64> {
    match cursor {
        None => Ok(0),
        Some(raw) => raw.trim().parse().map_err(|_| {
            TallyError::invalid_request(format!("invalid cursor '{}'", raw))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scan_cursor() {
        assert_eq!(parse_scan_cursor(None).unwrap(), 0);
        assert_eq!(parse_scan_cursor(Some("1536")).unwrap(), 1536);
        let err = parse_scan_cursor(Some("stats:abc")).unwrap_err();
        assert_eq!(err.code(), "invalid_request");
        assert!(parse_scan_cursor(Some("-1")).is_err());
    }

    #[test]
    fn test_escape_glob() {
        assert_eq!(escape_glob("stats:ABC:"), "stats:ABC:");
        assert_eq!(escape_glob("a*b?[c]\\"), "a\\*b\\?\\[c\\]\\\\");
    }
}
