//! 分析引擎：计数器、评分、扫码日志、兑换令牌、区间统计
//!
//! 底层只有一个无事务的 KV 存储，所有写路径都是尽力而为的“读-改-写”。

pub mod counter;
pub mod day;
pub mod events;
pub mod keys;
pub mod rating;
pub mod scan_log;
pub mod stats;
pub mod tokens;

pub use counter::{CounterStore, KvCounterStore};
pub use day::{LocalDay, resolve_day};
pub use events::{CounterKey, EventKey};
pub use rating::{RatingAggregator, rating_average};
pub use scan_log::{RequestMeta, ScanLog, ScanLogEntry, Signal};
pub use stats::{CampaignReport, StatsAggregator, StatsQuery, StatsReport};
pub use tokens::{ConsumeOutcome, InvalidReason, RedeemToken, TokenMachine, TokenStatus};
