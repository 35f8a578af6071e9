use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::AsRefStr;
use tracing::{debug, warn};

use super::keys::redeem_key;
use crate::errors::{Result, TallyError};
use crate::identity::LocationId;
use crate::store::KvStore;
use crate::utils::generate_token;

/// 令牌长度（52 字符字母表，约 137 位熵）
pub const TOKEN_LENGTH: usize = 24;

/// `fresh -> redeemed`，`redeemed` 为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStatus {
    Fresh,
    Redeemed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedeemToken {
    pub location: String,
    pub campaign: String,
    pub status: TokenStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeemed_at: Option<DateTime<Utc>>,
}

/// 兑换失败原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvalidReason {
    /// 令牌不存在、已过期或记录损坏
    UnknownToken,
    AlreadyRedeemed,
    LocationMismatch,
    CampaignMismatch,
    /// 该位置当天没有生效活动，或活动与请求不符
    NoActiveCampaign,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConsumeOutcome {
    Ok(RedeemToken),
    Invalid(InvalidReason),
}

/// 一次性兑换令牌
///
/// 状态迁移同样是“读-改-写”：两个并发的 `consume` 可能都读到 `fresh`，
/// 导致同一令牌被兑换两次。接受这一风险，不加锁。
pub struct TokenMachine {
    store: Arc<dyn KvStore>,
    ttl: Duration,
}

impl TokenMachine {
    pub fn new(store: Arc<dyn KvStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 创建 `fresh` 令牌
    pub async fn create(&self, location: &LocationId, campaign: &str) -> Result<String> {
        let campaign = campaign.trim();
        if campaign.is_empty() {
            return Err(TallyError::invalid_request("campaign is required"));
        }

        let token = generate_token(TOKEN_LENGTH);
        let record = RedeemToken {
            location: location.to_string(),
            campaign: campaign.to_string(),
            status: TokenStatus::Fresh,
            created_at: Utc::now(),
            redeemed_at: None,
        };
        self.write(&token, &record).await?;
        debug!("Redeem token created for {} / {}", location, campaign);
        Ok(token)
    }

    /// 读取令牌记录（不改变状态）
    pub async fn peek(&self, token: &str) -> Result<Option<RedeemToken>> {
        let Some(raw) = self.store.get(&redeem_key(token)).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<RedeemToken>(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(e) => {
                warn!("Redeem token record is malformed, treating as missing: {}", e);
                Ok(None)
            }
        }
    }

    /// 消费令牌
    ///
    /// 任何不匹配都返回 `Invalid` 且不写入。
    pub async fn consume(
        &self,
        token: &str,
        location: &LocationId,
        campaign: &str,
    ) -> Result<ConsumeOutcome> {
        let token = token.trim();
        if token.is_empty() {
            return Ok(ConsumeOutcome::Invalid(InvalidReason::UnknownToken));
        }
        let Some(mut record) = self.peek(token).await? else {
            return Ok(ConsumeOutcome::Invalid(InvalidReason::UnknownToken));
        };

        if record.status != TokenStatus::Fresh {
            return Ok(ConsumeOutcome::Invalid(InvalidReason::AlreadyRedeemed));
        }
        if record.location != location.as_str() {
            return Ok(ConsumeOutcome::Invalid(InvalidReason::LocationMismatch));
        }
        if record.campaign != campaign.trim() {
            return Ok(ConsumeOutcome::Invalid(InvalidReason::CampaignMismatch));
        }

        record.status = TokenStatus::Redeemed;
        record.redeemed_at = Some(Utc::now());
        self.write(token, &record).await?;
        debug!("Redeem token consumed for {} / {}", record.location, record.campaign);
        Ok(ConsumeOutcome::Ok(record))
    }

    async fn write(&self, token: &str, record: &RedeemToken) -> Result<()> {
        let value = serde_json::to_string(record)?;
        self.store
            .put(&redeem_key(token), &value, Some(self.ttl))
            .await
    }
}
