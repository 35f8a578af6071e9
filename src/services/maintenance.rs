//! Batch maintenance operations
//!
//! Used by the admin endpoints and the CLI. Every pass works on one page of
//! keys and returns `next_cursor`, so callers drive long migrations in
//! bounded steps. Merges are additive: re-running a pass never loses counts,
//! but running the same page twice concurrently can double them.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analytics::counter::parse_count;
use crate::analytics::day::{format_day, parse_day, parse_legacy_day};
use crate::analytics::keys::{
    SCAN_NAMESPACE, STATS_NAMESPACE, split_scan_key, split_stats_key,
};
use crate::analytics::{CounterKey, KvCounterStore, ScanLogEntry};
use crate::errors::{Result, TallyError};
use crate::identity::{
    IdentityResolver, LocationId, generate_canonical_id, is_canonical, normalize_slug,
};
use crate::store::KvStore;

/// Upper bound for one page
pub const MAX_BATCH_LIMIT: usize = 1000;

// ============ Request/Response DTOs ============

/// Paging options shared by all passes
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchOptions {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub dry_run: bool,
}

/// One key rewrite
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyMove {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizeReport {
    pub scanned: usize,
    pub rewritten: usize,
    pub already_canonical: usize,
    pub skipped: Vec<String>,
    pub moves: Vec<KeyMove>,
    pub dry_run: bool,
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackfillNamespace {
    Counters,
    Scans,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BackfillReport {
    pub scanned: usize,
    pub moved: usize,
    pub already_canonical: usize,
    /// Slugs with no alias record; their keys are left in place
    pub unresolved: BTreeSet<String>,
    pub skipped: Vec<String>,
    pub moves: Vec<KeyMove>,
    pub dry_run: bool,
    pub next_cursor: Option<String>,
}

/// One alias to seed
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AliasSeedEntry {
    pub slug: String,
    /// Defaults to the deterministic id of the slug
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeedStatus {
    Created,
    Unchanged,
    Overwritten,
    Conflict,
    Invalid,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedResult {
    pub slug: String,
    pub id: Option<String>,
    pub status: SeedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SeedReport {
    pub created: usize,
    pub unchanged: usize,
    pub overwritten: usize,
    pub conflicts: usize,
    pub invalid: usize,
    pub results: Vec<SeedResult>,
}

/// A SCAN page may repeat keys; keep first occurrences in order
fn dedup_page(keys: Vec<String>) -> Vec<String> {
    let mut seen = BTreeSet::new();
    keys.into_iter().filter(|k| seen.insert(k.clone())).collect()
}

// ============ Service ============

pub struct MaintenanceService {
    store: Arc<dyn KvStore>,
    resolver: Arc<IdentityResolver>,
    counters: Arc<KvCounterStore>,
    scan_ttl: Duration,
    default_limit: usize,
}

impl MaintenanceService {
    pub fn new(
        store: Arc<dyn KvStore>,
        resolver: Arc<IdentityResolver>,
        counters: Arc<KvCounterStore>,
        scan_ttl: Duration,
        default_limit: usize,
    ) -> Self {
        Self {
            store,
            resolver,
            counters,
            scan_ttl,
            default_limit: default_limit.clamp(1, MAX_BATCH_LIMIT),
        }
    }

    fn page_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, MAX_BATCH_LIMIT)
    }

    /// Rewrite legacy counter keys into canonical form
    ///
    /// Legacy event aliases (`qr`, `qr_scan`, ...) and unpadded or compact
    /// dates (`2025-6-1`, `20250601`) are merged into the canonical key and
    /// the legacy key is deleted. The location segment is left alone.
    pub async fn normalize_counters(&self, options: &BatchOptions) -> Result<NormalizeReport> {
        let page = self
            .store
            .list(
                STATS_NAMESPACE,
                options.cursor.as_deref(),
                self.page_limit(options.limit),
            )
            .await?;

        let mut report = NormalizeReport {
            dry_run: options.dry_run,
            next_cursor: page.cursor,
            ..Default::default()
        };

        for key in dedup_page(page.keys) {
            report.scanned += 1;
            let Some(raw) = split_stats_key(&key) else {
                report.skipped.push(key);
                continue;
            };
            if parse_day(raw.day).is_some() && CounterKey::parse(raw.counter).is_some() {
                report.already_canonical += 1;
                continue;
            }
            let (Some(day), Some(counter)) =
                (parse_legacy_day(raw.day), CounterKey::from_legacy(raw.counter))
            else {
                report.skipped.push(key);
                continue;
            };

            let target = format!(
                "{}{}:{}:{}",
                STATS_NAMESPACE,
                raw.location,
                format_day(day),
                counter.as_str()
            );
            if !self.merge_counter(&key, &target, options.dry_run).await? {
                report.skipped.push(key);
                continue;
            }
            report.rewritten += 1;
            report.moves.push(KeyMove {
                from: key,
                to: target,
            });
        }

        info!(
            "Counter normalization: scanned {}, rewritten {}, skipped {} (dry_run={})",
            report.scanned,
            report.rewritten,
            report.skipped.len(),
            report.dry_run
        );
        Ok(report)
    }

    /// Move slug-keyed data to canonical-id keys
    pub async fn backfill(
        &self,
        namespace: BackfillNamespace,
        options: &BatchOptions,
    ) -> Result<BackfillReport> {
        let prefix = match namespace {
            BackfillNamespace::Counters => STATS_NAMESPACE,
            BackfillNamespace::Scans => SCAN_NAMESPACE,
        };
        let page = self
            .store
            .list(
                prefix,
                options.cursor.as_deref(),
                self.page_limit(options.limit),
            )
            .await?;

        let mut report = BackfillReport {
            dry_run: options.dry_run,
            next_cursor: page.cursor,
            ..Default::default()
        };

        for key in dedup_page(page.keys) {
            report.scanned += 1;
            let location = match namespace {
                BackfillNamespace::Counters => split_stats_key(&key).map(|r| r.location),
                BackfillNamespace::Scans => split_scan_key(&key).map(|r| r.location),
            };
            let Some(location) = location else {
                report.skipped.push(key);
                continue;
            };
            if is_canonical(location) {
                report.already_canonical += 1;
                continue;
            }
            let Some(id) = self.resolver.resolve(location).await? else {
                report.unresolved.insert(location.to_string());
                continue;
            };

            let moved = match namespace {
                BackfillNamespace::Counters => {
                    let Some(raw) = split_stats_key(&key) else {
                        continue;
                    };
                    let target = format!(
                        "{}{}:{}:{}",
                        STATS_NAMESPACE, id, raw.day, raw.counter
                    );
                    self.merge_counter(&key, &target, options.dry_run)
                        .await?
                        .then_some(target)
                }
                BackfillNamespace::Scans => self.move_scan(&key, &id, options.dry_run).await?,
            };

            match moved {
                Some(target) => {
                    report.moved += 1;
                    report.moves.push(KeyMove {
                        from: key,
                        to: target,
                    });
                }
                None => report.skipped.push(key),
            }
        }

        info!(
            "Backfill {:?}: scanned {}, moved {}, unresolved {} (dry_run={})",
            namespace,
            report.scanned,
            report.moved,
            report.unresolved.len(),
            report.dry_run
        );
        Ok(report)
    }

    /// Write alias records
    pub async fn seed_aliases(
        &self,
        entries: &[AliasSeedEntry],
        overwrite: bool,
    ) -> Result<SeedReport> {
        let mut report = SeedReport::default();

        for entry in entries {
            let slug = normalize_slug(&entry.slug);
            let id = match entry.id.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                Some(raw) => LocationId::parse(&raw.to_ascii_uppercase()),
                None if !slug.is_empty() => Some(generate_canonical_id(&slug)),
                None => None,
            };
            let (Some(id), false) = (id, slug.is_empty()) else {
                report.invalid += 1;
                report.results.push(SeedResult {
                    slug,
                    id: entry.id.clone(),
                    status: SeedStatus::Invalid,
                    existing: None,
                });
                continue;
            };

            let existing = self.resolver.lookup_alias(&slug).await?;
            let status = match existing.as_deref() {
                Some(current) if current == id.as_str() => SeedStatus::Unchanged,
                Some(_) if !overwrite => SeedStatus::Conflict,
                Some(_) => SeedStatus::Overwritten,
                None => SeedStatus::Created,
            };
            if matches!(status, SeedStatus::Created | SeedStatus::Overwritten) {
                self.resolver.put_alias(&slug, &id).await?;
            }
            match status {
                SeedStatus::Created => report.created += 1,
                SeedStatus::Unchanged => report.unchanged += 1,
                SeedStatus::Overwritten => report.overwritten += 1,
                SeedStatus::Conflict => {
                    warn!(
                        "Alias '{}' already points to {:?}, not overwriting",
                        slug, existing
                    );
                    report.conflicts += 1
                }
                SeedStatus::Invalid => report.invalid += 1,
            }
            report.results.push(SeedResult {
                slug,
                id: Some(id.into_string()),
                status,
                existing: existing.filter(|_| status != SeedStatus::Unchanged),
            });
        }

        info!(
            "Alias seeding: {} created, {} unchanged, {} overwritten, {} conflicts, {} invalid",
            report.created, report.unchanged, report.overwritten, report.conflicts, report.invalid
        );
        Ok(report)
    }

    /// Additively merge `from` into `to` and delete `from`
    ///
    /// Returns `false` when the source value is not a number.
    async fn merge_counter(&self, from: &str, to: &str, dry_run: bool) -> Result<bool> {
        let Some(raw) = self.store.get(from).await? else {
            // expired between list and get
            return Ok(false);
        };
        let Some(value) = parse_count(&raw) else {
            warn!("Counter {} holds a non-numeric value '{}', leaving it", from, raw);
            return Ok(false);
        };
        if !dry_run {
            self.counters.add_to_key(to, value).await?;
            self.store.delete(from).await?;
        }
        Ok(true)
    }

    async fn move_scan(&self, from: &str, id: &LocationId, dry_run: bool) -> Result<Option<String>> {
        let Some(raw_key) = split_scan_key(from) else {
            return Ok(None);
        };
        let target = format!("{}{}:{}:{}", SCAN_NAMESPACE, id, raw_key.day, raw_key.tail);

        let Some(raw) = self.store.get(from).await? else {
            return Ok(None);
        };
        let mut entry = match serde_json::from_str::<ScanLogEntry>(&raw) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Scan entry {} is malformed, leaving it: {}", from, e);
                return Ok(None);
            }
        };
        if !dry_run {
            entry.location = id.to_string();
            let value = serde_json::to_string(&entry)
                .map_err(|e| TallyError::serialization(e.to_string()))?;
            self.store.put(&target, &value, Some(self.scan_ttl)).await?;
            self.store.delete(from).await?;
        }
        Ok(Some(target))
    }
}
