//! Event tracking service
//!
//! Shared by the `/track` beacon, the `/out` redirect and the `/hit` beacon.

use std::sync::Arc;

use chrono::Utc;
use tracing::debug;

use crate::analytics::{
    CounterStore, EventKey, LocalDay, RatingAggregator, RequestMeta, ScanLog, resolve_day,
};
use crate::errors::{Result, TallyError};
use crate::identity::{IdentityResolver, LocationId};

// ============ Request/Response DTOs ============

/// One interaction to record
#[derive(Debug, Clone)]
pub struct TrackRequest {
    /// Canonical id or slug
    pub id: String,
    pub event: EventKey,
    /// Rating value, required for `rating`
    pub value: Option<u8>,
    /// Explicit timezone, overrides the edge header
    pub timezone: Option<String>,
    pub meta: RequestMeta,
    /// `false` for filtered traffic (bots, prefetch): resolved but not written
    pub count: bool,
}

#[derive(Debug, Clone)]
pub struct TrackOutcome {
    pub location: LocationId,
    pub event: EventKey,
    pub day: LocalDay,
    pub counted: bool,
}

// ============ Service ============

pub struct TrackingService {
    resolver: Arc<IdentityResolver>,
    counters: Arc<dyn CounterStore>,
    ratings: Arc<RatingAggregator>,
    scan_log: Arc<ScanLog>,
    fallback_timezone: String,
}

impl TrackingService {
    pub fn new(
        resolver: Arc<IdentityResolver>,
        counters: Arc<dyn CounterStore>,
        ratings: Arc<RatingAggregator>,
        scan_log: Arc<ScanLog>,
        fallback_timezone: String,
    ) -> Self {
        Self {
            resolver,
            counters,
            ratings,
            scan_log,
            fallback_timezone,
        }
    }

    /// Resolve the location-local day for a request
    pub fn local_day(&self, timezone: Option<&str>, meta: &RequestMeta) -> LocalDay {
        resolve_day(
            Utc::now(),
            timezone.or(meta.timezone.as_deref()),
            meta.country.as_deref(),
            &self.fallback_timezone,
        )
    }

    /// Resolve an id or slug, mapping unknown locations to `not_found`
    pub async fn require_location(&self, id: &str) -> Result<LocationId> {
        self.resolver
            .resolve(id)
            .await?
            .ok_or_else(|| TallyError::not_found(format!("unknown location: {}", id.trim())))
    }

    /// Record one event
    ///
    /// `qr-scan` additionally appends a scan log entry; `rating` goes through
    /// the rating aggregator and needs a value.
    pub async fn record(&self, request: TrackRequest) -> Result<TrackOutcome> {
        if request.event == EventKey::Rating && request.value.is_none() {
            return Err(TallyError::invalid_request(
                "rating events require a 'value' between 1 and 5",
            ));
        }

        let location = self.require_location(&request.id).await?;
        let day = self.local_day(request.timezone.as_deref(), &request.meta);

        if request.count {
            match (request.event, request.value) {
                (EventKey::Rating, Some(value)) => {
                    self.ratings.submit(&location, day.day, value).await?;
                }
                (event, _) => {
                    self.counters
                        .increment(&location, day.day, event.into())
                        .await?;
                }
            }
            if request.event == EventKey::QrScan {
                self.scan_log
                    .log_scan(&location, day.day, &request.meta)
                    .await;
            }
        } else {
            debug!(
                "Not counting {} for {}: filtered request",
                request.event, location
            );
        }

        Ok(TrackOutcome {
            location,
            event: request.event,
            day,
            counted: request.count,
        })
    }
}
