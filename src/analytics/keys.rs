//! 存储 key 布局
//!
//! - `stats:{loc}:{day}:{counter}`            计数器
//! - `scan:{loc}:{day}:{ts_ms}:{id}`          扫码日志（ts 补零到 13 位，字典序即时间序）
//! - `redeem:{token}`                         兑换令牌
//!
//! `loc` 在新数据里总是规范 ID；旧数据里可能是 slug，维护任务负责迁移。

use chrono::NaiveDate;

use super::day::format_day;
use super::events::CounterKey;

pub const STATS_NAMESPACE: &str = "stats:";
pub const SCAN_NAMESPACE: &str = "scan:";
pub const REDEEM_NAMESPACE: &str = "redeem:";

pub fn stats_key(location: &str, day: NaiveDate, counter: CounterKey) -> String {
    format!(
        "{}{}:{}:{}",
        STATS_NAMESPACE,
        location,
        format_day(day),
        counter.as_str()
    )
}

pub fn stats_prefix(location: &str) -> String {
    format!("{}{}:", STATS_NAMESPACE, location)
}

pub fn scan_key(location: &str, day: NaiveDate, ts_millis: i64, id: &str) -> String {
    format!(
        "{}{}:{}:{:013}:{}",
        SCAN_NAMESPACE,
        location,
        format_day(day),
        ts_millis.max(0),
        id
    )
}

pub fn scan_prefix(location: &str) -> String {
    format!("{}{}:", SCAN_NAMESPACE, location)
}

pub fn redeem_key(token: &str) -> String {
    format!("{}{}", REDEEM_NAMESPACE, token)
}

/// 计数器 key 的原始片段（不校验日期和事件名）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatsKey<'a> {
    pub location: &'a str,
    pub day: &'a str,
    pub counter: &'a str,
}

pub fn split_stats_key(key: &str) -> Option<RawStatsKey<'_>> {
    let rest = key.strip_prefix(STATS_NAMESPACE)?;
    let mut parts = rest.splitn(3, ':');
    let location = parts.next().filter(|s| !s.is_empty())?;
    let day = parts.next().filter(|s| !s.is_empty())?;
    let counter = parts.next().filter(|s| !s.is_empty())?;
    Some(RawStatsKey {
        location,
        day,
        counter,
    })
}

/// 扫码日志 key 的原始片段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScanKey<'a> {
    pub location: &'a str,
    pub day: &'a str,
    /// `{ts}:{id}`，迁移时原样保留
    pub tail: &'a str,
}

pub fn split_scan_key(key: &str) -> Option<RawScanKey<'_>> {
    let rest = key.strip_prefix(SCAN_NAMESPACE)?;
    let mut parts = rest.splitn(3, ':');
    let location = parts.next().filter(|s| !s.is_empty())?;
    let day = parts.next().filter(|s| !s.is_empty())?;
    let tail = parts.next().filter(|s| !s.is_empty())?;
    Some(RawScanKey {
        location,
        day,
        tail,
    })
}
