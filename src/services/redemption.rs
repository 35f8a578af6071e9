//! Promotion redemption service
//!
//! Issues one-time tokens for the location's active campaign and consumes
//! them. A failed redemption is a normal outcome: it is counted as
//! `qr-invalid`, logged with a reason, and never surfaces as an error.

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::analytics::{
    ConsumeOutcome, CounterStore, EventKey, InvalidReason, RequestMeta, ScanLog, TokenMachine,
};
use crate::campaigns::CampaignCatalog;
use crate::errors::{Result, TallyError};
use crate::identity::LocationId;
use crate::services::TrackingService;

// ============ Request/Response DTOs ============

#[derive(Debug, Clone)]
pub struct IssueRequest {
    pub id: String,
    /// Issue for this campaign instead of today's pick
    pub campaign: Option<String>,
    pub timezone: Option<String>,
    pub meta: RequestMeta,
}

/// A freshly issued promotion token
#[derive(Debug, Clone, Serialize)]
pub struct PromoIssue {
    pub token: String,
    pub url: String,
    pub location: LocationId,
    pub campaign: String,
    pub expires_in_days: u64,
}

#[derive(Debug, Clone)]
pub struct RedeemRequest {
    pub token: String,
    pub id: String,
    pub campaign: String,
    pub timezone: Option<String>,
    pub meta: RequestMeta,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RedeemStatus {
    Ok,
    Invalid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RedeemResult {
    pub status: RedeemStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<InvalidReason>,
    pub location: LocationId,
    pub campaign: String,
    pub day: String,
}

// ============ Service ============

pub struct RedemptionService {
    tracking: Arc<TrackingService>,
    tokens: Arc<TokenMachine>,
    counters: Arc<dyn CounterStore>,
    scan_log: Arc<ScanLog>,
    catalog: Arc<CampaignCatalog>,
    public_base_url: String,
}

impl RedemptionService {
    pub fn new(
        tracking: Arc<TrackingService>,
        tokens: Arc<TokenMachine>,
        counters: Arc<dyn CounterStore>,
        scan_log: Arc<ScanLog>,
        catalog: Arc<CampaignCatalog>,
        public_base_url: &str,
    ) -> Self {
        Self {
            tracking,
            tokens,
            counters,
            scan_log,
            catalog,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create a fresh token for today's active campaign
    ///
    /// With an explicit `campaign`, that campaign must itself be running for
    /// the location today. Fails with `not_found` when the location is unknown
    /// or no campaign qualifies. Counts a `promo-view` for the location.
    pub async fn issue(&self, request: IssueRequest) -> Result<PromoIssue> {
        let location = self.tracking.require_location(&request.id).await?;
        let day = self
            .tracking
            .local_day(request.timezone.as_deref(), &request.meta);

        let requested = request
            .campaign
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty());
        let campaign = match requested {
            Some(key) => self
                .catalog
                .active_by_key(&location, key, day.day)
                .await
                .ok_or_else(|| {
                    TallyError::not_found(format!(
                        "campaign {} is not active for {} on {}",
                        key,
                        location,
                        day.key()
                    ))
                })?,
            None => self
                .catalog
                .active_for(&location, day.day)
                .await
                .ok_or_else(|| {
                    TallyError::not_found(format!(
                        "no active campaign for {} on {}",
                        location,
                        day.key()
                    ))
                })?,
        };

        let token = self.tokens.create(&location, &campaign.key).await?;
        self.counters
            .increment(&location, day.day, EventKey::PromoView.into())
            .await?;

        let url = format!(
            "{}/redeem?token={}&id={}&campaign={}",
            self.public_base_url,
            urlencoding::encode(&token),
            urlencoding::encode(location.as_str()),
            urlencoding::encode(&campaign.key)
        );
        info!("Promo token issued for {} / {}", location, campaign.key);

        Ok(PromoIssue {
            token,
            url,
            location,
            campaign: campaign.key,
            expires_in_days: self.tokens.ttl().as_secs() / 86_400,
        })
    }

    /// Redeem a token
    ///
    /// The campaign must be running for the location on its local day, the
    /// same rule `issue` applies to an explicit campaign; otherwise the token
    /// is not touched.
    pub async fn redeem(&self, request: RedeemRequest) -> Result<RedeemResult> {
        let location = self.tracking.require_location(&request.id).await?;
        let day = self
            .tracking
            .local_day(request.timezone.as_deref(), &request.meta);
        let campaign = request.campaign.trim().to_string();

        let running = if campaign.is_empty() {
            None
        } else {
            self.catalog.active_by_key(&location, &campaign, day.day).await
        };
        let outcome = match running {
            Some(_) => {
                self.tokens
                    .consume(&request.token, &location, &campaign)
                    .await?
            }
            None => ConsumeOutcome::Invalid(InvalidReason::NoActiveCampaign),
        };

        let (status, reason) = match outcome {
            ConsumeOutcome::Ok(_) => {
                // the token is already spent; bookkeeping must not turn it into an error
                self.count(&location, day.day, EventKey::QrRedeem).await;
                self.scan_log
                    .log_redeem(&location, day.day, &request.meta, &campaign)
                    .await;
                info!("Redeemed {} / {}", location, campaign);
                (RedeemStatus::Ok, None)
            }
            ConsumeOutcome::Invalid(reason) => {
                self.count(&location, day.day, EventKey::QrInvalid).await;
                self.scan_log
                    .log_invalid(
                        &location,
                        day.day,
                        &request.meta,
                        Some(campaign.as_str()),
                        reason.as_ref(),
                    )
                    .await;
                warn!(
                    "Invalid redemption for {} / {}: {}",
                    location,
                    campaign,
                    reason.as_ref()
                );
                (RedeemStatus::Invalid, Some(reason))
            }
        };

        Ok(RedeemResult {
            status,
            reason,
            location,
            campaign,
            day: day.key(),
        })
    }

    async fn count(&self, location: &LocationId, day: NaiveDate, event: EventKey) {
        if let Err(e) = self.counters.increment(location, day, event.into()).await {
            warn!("Failed to count {} for {}: {}", event, location, e);
        }
    }
}
