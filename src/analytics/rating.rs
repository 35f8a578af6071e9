use std::sync::Arc;

use chrono::NaiveDate;

use super::counter::CounterStore;
use super::events::{CounterKey, EventKey};
use crate::errors::{Result, TallyError};
use crate::identity::LocationId;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// 评分聚合：只存次数和总分两个计数器，平均值在读取时计算
pub struct RatingAggregator {
    counters: Arc<dyn CounterStore>,
}

impl RatingAggregator {
    pub fn new(counters: Arc<dyn CounterStore>) -> Self {
        Self { counters }
    }

    /// 记录一次评分（1..=5）
    ///
    /// 两个计数器分别写入，中间失败会让次数和总分短暂不一致。
    pub async fn submit(&self, location: &LocationId, day: NaiveDate, value: u8) -> Result<()> {
        if !(MIN_RATING..=MAX_RATING).contains(&value) {
            return Err(TallyError::invalid_request(format!(
                "rating value must be between {} and {}",
                MIN_RATING, MAX_RATING
            )));
        }
        self.counters
            .increment(location, day, EventKey::Rating.into())
            .await?;
        self.counters
            .add(location, day, CounterKey::RatingScore, u64::from(value))
            .await?;
        Ok(())
    }
}

/// 平均分，保留两位小数；没有评分时为 0
pub fn rating_average(count: u64, score_sum: u64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let avg = score_sum as f64 / count as f64;
    (avg * 100.0).round() / 100.0
}
