//! 백그라운드 갱신 스케줄러 통합 테스트.

mod common;

use common::*;
use quote_core::{CacheEntry, Market, QueryConfig, QueryRequest, QueryType, SourceTag};
use quote_data::MemoryCache;
use quote_query::{RefreshScheduler, ScheduleDecision};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

async fn wait_for_completed(scheduler: &RefreshScheduler, expected: u64) {
    let scheduler = scheduler.clone();
    wait_until(move || {
        let stats = scheduler.stats();
        stats.completed + stats.failed >= expected
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_second_refresh_within_interval_is_throttled() {
    let harness = Harness::new(ScriptedUpstream::new(), QueryConfig::default(), Some(refresh_config(10)));
    let cached = quote("AAPL", 100.0);
    harness
        .cache
        .seed(key("AAPL", Market::Us), CacheEntry::new(cached.clone()))
        .await;
    let request = QueryRequest::new(["AAPL"], QueryType::GetStockQuote);

    let first = harness.pipeline.execute(&request).await.unwrap();
    assert_eq!(first.results[0].source, SourceTag::Cache);
    wait_for_completed(harness.scheduler(), 1).await;

    let second = harness.pipeline.execute(&request).await.unwrap();
    assert_eq!(second.results[0].source, SourceTag::Cache);

    let stats = harness.scheduler().stats();
    assert_eq!(stats.started, 1);
    assert_eq!(stats.throttled, 1);
    assert_eq!(harness.upstream.call_count(), 1);

    // 가격이 같으므로 캐시는 그대로
    assert_eq!(harness.cache.write_count(), 0);
    let entry = harness.cache.entry(&key("AAPL", Market::Us)).await.unwrap();
    assert_eq!(entry.data, cached);

    // 최소 간격이 지나면 다시 갱신
    tokio::time::advance(Duration::from_secs(61)).await;
    harness.pipeline.execute(&request).await.unwrap();
    assert_eq!(harness.scheduler().stats().started, 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrency_cap_queues_excess_refreshes() {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = ScriptedUpstream::new().with_gate(gate.clone());
    let harness = Harness::new(upstream, QueryConfig::default(), Some(refresh_config(10)));

    let symbols: Vec<String> = (0..15).map(us_symbol).collect();
    for symbol in &symbols {
        harness
            .cache
            .seed(key(symbol, Market::Us), CacheEntry::new(quote(symbol, 100.0)))
            .await;
    }

    let request = QueryRequest::new(symbols.clone(), QueryType::GetStockQuote);
    let response = harness.pipeline.execute(&request).await.unwrap();
    assert_eq!(response.count_source(SourceTag::Cache), 15);

    let scheduler = harness.scheduler();
    assert_eq!(scheduler.running_count(), 10);
    assert_eq!(scheduler.pending_count(), 5);

    gate.add_permits(15);
    wait_for_completed(scheduler, 15).await;

    let stats = scheduler.stats();
    assert_eq!(stats.started, 15);
    assert_eq!(stats.queued, 5);
    assert_eq!(stats.completed, 15);
    assert!(harness.upstream.max_in_flight() <= 10);
    assert_eq!(scheduler.running_count(), 0);
    assert_eq!(scheduler.pending_count(), 0);
}

#[tokio::test]
async fn test_duplicate_keys_are_dropped() {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = Arc::new(ScriptedUpstream::new().with_gate(gate.clone()));
    let cache = Arc::new(MemoryCache::new());
    let mut config = refresh_config(1);
    config.min_interval_ms = 0;
    let scheduler = scheduler(config, upstream.clone(), cache);

    assert_eq!(scheduler.schedule(refresh_task("AAPL", Market::Us, None)), ScheduleDecision::Started);
    assert_eq!(scheduler.schedule(refresh_task("AAPL", Market::Us, None)), ScheduleDecision::Duplicate);
    assert_eq!(scheduler.schedule(refresh_task("MSFT", Market::Us, None)), ScheduleDecision::Queued);
    assert_eq!(scheduler.schedule(refresh_task("MSFT", Market::Us, None)), ScheduleDecision::Duplicate);
    assert!(scheduler.is_running(&key("AAPL", Market::Us)));

    gate.add_permits(2);
    wait_for_completed(&scheduler, 2).await;
    assert_eq!(upstream.call_count(), 2);
    assert_eq!(scheduler.stats().deduplicated, 2);
    assert_eq!(scheduler.stats().throttled, 0);
}

#[tokio::test]
async fn test_running_key_within_interval_reports_throttled() {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = Arc::new(ScriptedUpstream::new().with_gate(gate.clone()));
    let scheduler = scheduler(refresh_config(1), upstream.clone(), Arc::new(MemoryCache::new()));

    assert_eq!(scheduler.schedule(refresh_task("AAPL", Market::Us, None)), ScheduleDecision::Started);
    assert!(scheduler.is_running(&key("AAPL", Market::Us)));
    assert_eq!(scheduler.schedule(refresh_task("AAPL", Market::Us, None)), ScheduleDecision::Throttled);

    gate.add_permits(1);
    wait_for_completed(&scheduler, 1).await;

    let stats = scheduler.stats();
    assert_eq!(stats.throttled, 1);
    assert_eq!(stats.deduplicated, 0);
    assert_eq!(upstream.call_count(), 1);
}

async fn admission_order(seed: u64) -> Vec<String> {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = Arc::new(ScriptedUpstream::new().with_gate(gate.clone()));
    let mut config = refresh_config(1);
    config.jitter_seed = Some(seed);
    let scheduler = scheduler(config, upstream.clone(), Arc::new(MemoryCache::new()));

    assert_eq!(scheduler.schedule(refresh_task("BLOCK", Market::Us, None)), ScheduleDecision::Started);
    for (symbol, market) in [
        ("000001", Market::Sz),
        ("00700", Market::Hk),
        ("MSFT", Market::Us),
        ("600519", Market::Sh),
        ("AAPL", Market::Us),
        ("09988", Market::Hk),
        ("TSLA", Market::Us),
    ] {
        assert_eq!(scheduler.schedule(refresh_task(symbol, market, None)), ScheduleDecision::Queued);
    }

    gate.add_permits(8);
    wait_for_completed(&scheduler, 8).await;

    upstream.calls().into_iter().flatten().collect()
}

#[tokio::test(start_paused = true)]
async fn test_queue_drains_by_priority_deterministically() {
    let first = admission_order(7).await;
    let second = admission_order(7).await;
    assert_eq!(first, second);

    assert_eq!(first.len(), 8);
    assert_eq!(first[0], "BLOCK");

    let markets: Vec<Market> = first[1..].iter().map(|s| quote_core::classify(s)).collect();
    let weights: Vec<f64> = markets.iter().map(|m| m.refresh_weight()).collect();
    assert!(weights.windows(2).all(|w| w[0] >= w[1]), "order {:?}", first);
    assert_eq!(&markets[..3], &[Market::Us, Market::Us, Market::Us]);
    assert_eq!(&markets[3..5], &[Market::Hk, Market::Hk]);
}

#[tokio::test(start_paused = true)]
async fn test_significant_change_writes_cache() {
    let upstream = Arc::new(ScriptedUpstream::new());
    upstream.set_price(105.0);
    let cache = Arc::new(MemoryCache::new());
    let scheduler = scheduler(refresh_config(10), upstream.clone(), cache.clone());

    scheduler.schedule(refresh_task("AAPL", Market::Us, Some(quote("AAPL", 100.0))));
    wait_for_completed(&scheduler, 1).await;

    assert_eq!(scheduler.stats().written, 1);
    let entry = cache.entry(&key("AAPL", Market::Us)).await.unwrap();
    assert_eq!(entry.data["lastPrice"], 105.0);
}

#[tokio::test(start_paused = true)]
async fn test_background_failure_is_absorbed() {
    let upstream = Arc::new(ScriptedUpstream::new().with_failing(&["AAPL"]));
    let cache = Arc::new(MemoryCache::new());
    let scheduler = scheduler(refresh_config(10), upstream, cache.clone());

    scheduler.schedule(refresh_task("AAPL", Market::Us, Some(quote("AAPL", 100.0))));
    wait_for_completed(&scheduler, 1).await;

    let stats = scheduler.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 0);
    assert_eq!(scheduler.running_count(), 0);
    assert!(cache.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_timeout_frees_slot() {
    let upstream = Arc::new(ScriptedUpstream::new().with_delay("SLOW", Duration::from_secs(3600)));
    let mut config = refresh_config(1);
    config.refresh_timeout_ms = 1_000;
    let scheduler = scheduler(config, upstream, Arc::new(MemoryCache::new()));

    scheduler.schedule(refresh_task("SLOW", Market::Us, None));
    assert_eq!(scheduler.schedule(refresh_task("FAST", Market::Us, None)), ScheduleDecision::Queued);

    wait_for_completed(&scheduler, 2).await;
    let stats = scheduler.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.completed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_after_grace_period() {
    let gate = Arc::new(Semaphore::new(0));
    let upstream = Arc::new(ScriptedUpstream::new().with_gate(gate));
    let mut config = refresh_config(2);
    config.shutdown_grace_ms = 1_000;
    let scheduler = scheduler(config, upstream, Arc::new(MemoryCache::new()));

    for symbol in ["AAPL", "MSFT", "TSLA", "NVDA"] {
        scheduler.schedule(refresh_task(symbol, Market::Us, None));
    }
    assert_eq!(scheduler.running_count(), 2);
    assert_eq!(scheduler.pending_count(), 2);

    let summary = scheduler.shutdown().await;

    assert_eq!(summary.dropped_pending, 2);
    assert_eq!(summary.aborted, 2);
    assert!(!scheduler.is_accepting());
    assert_eq!(scheduler.running_count(), 0);
    assert_eq!(scheduler.pending_count(), 0);
    assert_eq!(
        scheduler.schedule(refresh_task("AMZN", Market::Us, None)),
        ScheduleDecision::Rejected
    );
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_waits_for_running_refreshes() {
    let upstream = Arc::new(
        ScriptedUpstream::new()
            .with_delay("AAPL", Duration::from_millis(200))
            .with_delay("MSFT", Duration::from_millis(400)),
    );
    let scheduler = scheduler(refresh_config(10), upstream, Arc::new(MemoryCache::new()));

    scheduler.schedule(refresh_task("AAPL", Market::Us, None));
    scheduler.schedule(refresh_task("MSFT", Market::Us, None));

    let summary = scheduler.shutdown().await;

    assert_eq!(summary.aborted, 0);
    assert_eq!(scheduler.stats().completed, 2);
}
