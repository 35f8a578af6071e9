//! 别名与数据迁移集成测试

mod common;

use std::sync::Arc;

use serde_json::json;

use qrtally::analytics::keys::stats_key;
use qrtally::analytics::{CounterKey, EventKey, StatsQuery};
use qrtally::identity::{generate_canonical_id, is_canonical};
use qrtally::services::{
    AliasSeedEntry, BackfillNamespace, BackfillReport, BatchOptions, NormalizeReport, SeedStatus,
};
use qrtally::store::{KvStore, MemoryStore};

use common::*;

fn seed_entry(slug: &str, id: Option<&str>) -> AliasSeedEntry {
    AliasSeedEntry {
        slug: slug.to_string(),
        id: id.map(str::to_string),
    }
}

#[tokio::test]
async fn test_alias_resolves_only_after_seeding() {
    let env = build_env(test_config(), json!([]));
    let resolver = &env.state.resolver;

    assert_eq!(resolver.resolve("my-cafe").await.unwrap(), None);

    let target = generate_canonical_id("some-other-seed");
    let report = env
        .state
        .maintenance
        .seed_aliases(&[seed_entry("my-cafe", Some(target.as_str()))], false)
        .await
        .unwrap();
    assert_eq!(report.created, 1);

    let resolved = resolver.resolve("my-cafe").await.unwrap().unwrap();
    assert_eq!(resolved, target);
    assert_eq!(resolved.as_str().len(), 26);
    assert!(is_canonical(resolved.as_str()));
    // 大小写和空白不影响解析
    assert_eq!(resolver.resolve("  MY-CAFE ").await.unwrap(), Some(target.clone()));
    // 重复解析结果稳定
    assert_eq!(resolver.resolve("my-cafe").await.unwrap(), Some(target));
}

#[tokio::test]
async fn test_seed_conflict_and_overwrite() {
    let env = build_env(test_config(), json!([]));
    let maintenance = &env.state.maintenance;
    let other = generate_canonical_id("elsewhere");

    maintenance
        .seed_aliases(&[seed_entry("my-cafe", None)], false)
        .await
        .unwrap();

    let report = maintenance
        .seed_aliases(&[seed_entry("my-cafe", Some(other.as_str()))], false)
        .await
        .unwrap();
    assert_eq!(report.conflicts, 1);
    assert_eq!(report.results[0].status, SeedStatus::Conflict);
    assert_eq!(
        env.state.resolver.resolve("my-cafe").await.unwrap(),
        Some(cafe_id())
    );

    let report = maintenance
        .seed_aliases(&[seed_entry("my-cafe", Some(other.as_str()))], true)
        .await
        .unwrap();
    assert_eq!(report.overwritten, 1);
    assert_eq!(
        env.state.resolver.resolve("my-cafe").await.unwrap(),
        Some(other)
    );
}

#[tokio::test]
async fn test_backfill_then_stats() {
    let env = build_env(test_config(), json!([]));
    let d = day("2025-06-01");

    // 旧数据按 slug 记账
    env.store
        .put(&stats_key("my-cafe", d, CounterKey::Event(EventKey::QrScan)), "5", None)
        .await
        .unwrap();
    env.store
        .put(&stats_key("ghost-town", d, CounterKey::Event(EventKey::QrScan)), "2", None)
        .await
        .unwrap();
    // 规范 ID 下已有的计数
    env.store
        .put(
            &stats_key(cafe_id().as_str(), d, CounterKey::Event(EventKey::QrScan)),
            "1",
            None,
        )
        .await
        .unwrap();

    env.state
        .maintenance
        .seed_aliases(&[seed_entry("my-cafe", None)], false)
        .await
        .unwrap();

    let dry = env
        .state
        .maintenance
        .backfill(
            BackfillNamespace::Counters,
            &BatchOptions {
                dry_run: true,
                ..BatchOptions::default()
            },
        )
        .await
        .unwrap();
    assert!(dry.dry_run);
    assert_eq!(dry.moved, 1);
    assert!(
        env.store
            .get(&stats_key("my-cafe", d, CounterKey::Event(EventKey::QrScan)))
            .await
            .unwrap()
            .is_some()
    );

    let report = env
        .state
        .maintenance
        .backfill(BackfillNamespace::Counters, &BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(report.moved, 1);
    assert!(report.unresolved.contains("ghost-town"));
    assert_eq!(report.next_cursor, None);

    let stats = env
        .state
        .stats
        .query(&StatsQuery {
            id: "my-cafe".to_string(),
            from: d,
            to: d,
            timezone: None,
        })
        .await
        .unwrap();
    assert_eq!(stats.location, cafe_id());
    assert_eq!(stats.totals["qr-scan"], 6);

    // 未解析的 slug 保持原样
    assert_eq!(
        env.store
            .get(&stats_key("ghost-town", d, CounterKey::Event(EventKey::QrScan)))
            .await
            .unwrap()
            .as_deref(),
        Some("2")
    );
}

#[tokio::test]
async fn test_normalize_then_stats() {
    let env = build_env(test_config(), json!([]));
    let l1 = cafe_id();

    env.store
        .put(&format!("stats:{}:2025-6-1:qr", l1), "2", None)
        .await
        .unwrap();
    env.store
        .put(&format!("stats:{}:20250601:qr_scan", l1), "3", None)
        .await
        .unwrap();

    let report = env
        .state
        .maintenance
        .normalize_counters(&BatchOptions::default())
        .await
        .unwrap();
    assert_eq!(report.rewritten, 2);

    let stats = env
        .state
        .stats
        .query(&StatsQuery {
            id: l1.to_string(),
            from: day("2025-06-01"),
            to: day("2025-06-01"),
            timezone: None,
        })
        .await
        .unwrap();
    assert_eq!(stats.days["2025-06-01"]["qr-scan"], 5);
}

fn scan_like_env() -> TestEnv {
    let memory = Arc::new(MemoryStore::new());
    build_env_with(test_config(), json!([]), memory.clone(), ScanLikeStore::wrap(memory))
}

fn page(cursor: Option<String>) -> BatchOptions {
    BatchOptions {
        cursor,
        limit: Some(4),
        dry_run: false,
    }
}

#[tokio::test]
async fn test_normalize_runs_to_completion_over_scan_pages() {
    let env = scan_like_env();
    let l1 = cafe_id();
    for d in 1..=5 {
        env.store
            .put(&format!("stats:{}:2025-6-{}:qr", l1, d), "1", None)
            .await
            .unwrap();
        env.store
            .put(&format!("stats:{}:2025060{}:qr_scan", l1, d), "2", None)
            .await
            .unwrap();
    }

    let mut total = NormalizeReport::default();
    let mut cursor = None;
    let mut passes = 0;
    loop {
        let report = env.state.maintenance.normalize_counters(&page(cursor)).await.unwrap();
        total.rewritten += report.rewritten;
        total.skipped.extend(report.skipped);
        passes += 1;
        assert!(passes < 100, "cursor never finished");
        match report.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(total.rewritten, 10);
    assert!(total.skipped.is_empty());

    let stats = env
        .state
        .stats
        .query(&StatsQuery {
            id: l1.to_string(),
            from: day("2025-06-01"),
            to: day("2025-06-05"),
            timezone: None,
        })
        .await
        .unwrap();
    assert_eq!(stats.days.len(), 5);
    assert_eq!(stats.days["2025-06-03"]["qr-scan"], 3);
    assert_eq!(stats.totals["qr-scan"], 15);
}

#[tokio::test]
async fn test_backfill_runs_to_completion_over_scan_pages() {
    let env = scan_like_env();
    env.state
        .maintenance
        .seed_aliases(&[seed_entry("my-cafe", None)], false)
        .await
        .unwrap();
    for d in 1..=6 {
        let key = stats_key("my-cafe", day(&format!("2025-06-0{}", d)), EventKey::Click.into());
        env.store.put(&key, "4", None).await.unwrap();
    }
    env.store
        .put(&stats_key("ghost-town", day("2025-06-01"), EventKey::Click.into()), "9", None)
        .await
        .unwrap();

    let mut total = BackfillReport::default();
    let mut cursor = None;
    loop {
        let report = env
            .state
            .maintenance
            .backfill(BackfillNamespace::Counters, &page(cursor))
            .await
            .unwrap();
        total.moved += report.moved;
        total.unresolved.extend(report.unresolved);
        match report.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    assert_eq!(total.moved, 6);
    assert_eq!(total.unresolved.len(), 1);
    assert!(total.unresolved.contains("ghost-town"));

    let stats = env
        .state
        .stats
        .query(&StatsQuery {
            id: "my-cafe".to_string(),
            from: day("2025-06-01"),
            to: day("2025-06-06"),
            timezone: None,
        })
        .await
        .unwrap();
    assert_eq!(stats.totals["click"], 24);
}
