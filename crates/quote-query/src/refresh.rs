//! 백그라운드 캐시 갱신 스케줄러.
//!
//! 캐시 적중 시 응답과 별개로 해당 항목을 다시 조회하여 캐시를 따뜻하게 유지합니다.
//!
//! 저장 키별 상태: `IDLE → (THROTTLED | QUEUED | RUNNING) → IDLE`
//!
//! - 같은 키의 실행은 최대 1개 (중복 제거)
//! - 같은 키의 두 실행 시작 사이 간격은 `min_interval` 이상 (스로틀)
//! - 전체 실행 수는 `max_concurrent` 이하, 초과분은 우선순위 큐에서 대기
//!
//! 상태는 하나의 `Mutex` 아래에서만 변경되며, 잠금을 잡은 채 await하지 않습니다.

use futures::FutureExt;
use quote_core::{
    ChangeDetector, CoreError, CoreResult, FastCache, FetchRequest, Market, MarketStatus,
    RefreshConfig, StorageKey, UpstreamFetcher,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio::task::AbortHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::metrics;
use crate::ttl::TtlCalculator;

/// 갱신 작업.
#[derive(Debug, Clone)]
pub struct RefreshTask {
    pub symbol: String,
    pub storage_key: StorageKey,
    /// 단일 심볼 업스트림 요청
    pub request: FetchRequest,
    pub correlation_id: String,
    /// 캐시 적중 시점의 스냅샷 (변경 감지 기준)
    pub cached_snapshot: Option<Value>,
    /// 스케줄 시점에 한 번 계산되는 우선순위
    pub priority: f64,
}

impl RefreshTask {
    pub fn new(
        storage_key: StorageKey,
        request: FetchRequest,
        correlation_id: impl Into<String>,
        cached_snapshot: Option<Value>,
    ) -> Self {
        Self {
            symbol: storage_key.symbol.clone(),
            storage_key,
            request,
            correlation_id: correlation_id.into(),
            cached_snapshot,
            priority: 0.0,
        }
    }

    pub fn market(&self) -> Market {
        self.storage_key.market
    }
}

/// 스케줄 요청 처리 결과.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    /// 최소 간격 미달로 버림
    Throttled,
    /// 같은 키가 실행 중이거나 대기 중이라 버림
    Duplicate,
    /// 바로 실행 시작
    Started,
    /// 대기열에 추가
    Queued,
    /// 종료 중이라 거부
    Rejected,
}

/// 갱신 통계 카운터.
#[derive(Debug, Default)]
pub struct RefreshStats {
    started: AtomicU64,
    queued: AtomicU64,
    throttled: AtomicU64,
    deduplicated: AtomicU64,
    rejected: AtomicU64,
    completed: AtomicU64,
    failed: AtomicU64,
    written: AtomicU64,
}

/// 갱신 통계 스냅샷.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatsSnapshot {
    pub started: u64,
    pub queued: u64,
    pub throttled: u64,
    pub deduplicated: u64,
    pub rejected: u64,
    pub completed: u64,
    pub failed: u64,
    /// 변경이 감지되어 캐시에 기록된 건수
    pub written: u64,
}

impl RefreshStats {
    fn incr(counter: &AtomicU64, outcome: &'static str) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
        metrics::record_refresh(outcome);
    }

    pub fn snapshot(&self) -> RefreshStatsSnapshot {
        RefreshStatsSnapshot {
            started: self.started.load(AtomicOrdering::Relaxed),
            queued: self.queued.load(AtomicOrdering::Relaxed),
            throttled: self.throttled.load(AtomicOrdering::Relaxed),
            deduplicated: self.deduplicated.load(AtomicOrdering::Relaxed),
            rejected: self.rejected.load(AtomicOrdering::Relaxed),
            completed: self.completed.load(AtomicOrdering::Relaxed),
            failed: self.failed.load(AtomicOrdering::Relaxed),
            written: self.written.load(AtomicOrdering::Relaxed),
        }
    }
}

/// 종료 결과.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownSummary {
    /// 버려진 대기 작업 수
    pub dropped_pending: usize,
    /// 유예 시간 후 강제 중단된 실행 수
    pub aborted: usize,
}

/// 대기열 항목. 우선순위가 높을수록, 같으면 먼저 들어온 것이 앞.
struct QueuedTask {
    seq: u64,
    task: RefreshTask,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.task
            .priority
            .total_cmp(&other.task.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct SchedulerState {
    accepting: bool,
    running: HashMap<StorageKey, AbortHandle>,
    last_refresh_at: HashMap<StorageKey, Instant>,
    pending: BinaryHeap<QueuedTask>,
    pending_keys: HashSet<StorageKey>,
    seq: u64,
    rng: StdRng,
}

impl SchedulerState {
    fn is_throttled(&self, key: &StorageKey, now: Instant, min_interval: std::time::Duration) -> bool {
        self.last_refresh_at
            .get(key)
            .is_some_and(|last| now.saturating_duration_since(*last) < min_interval)
    }
}

struct Inner {
    config: RefreshConfig,
    upstream: Arc<dyn UpstreamFetcher>,
    fast_cache: Arc<dyn FastCache>,
    detector: Arc<dyn ChangeDetector>,
    ttl: TtlCalculator,
    state: Mutex<SchedulerState>,
    idle: Notify,
    stats: RefreshStats,
}

/// 백그라운드 갱신 스케줄러.
///
/// 복제해도 같은 상태를 공유합니다.
#[derive(Clone)]
pub struct RefreshScheduler {
    inner: Arc<Inner>,
}

impl RefreshScheduler {
    pub fn new(
        config: RefreshConfig,
        upstream: Arc<dyn UpstreamFetcher>,
        fast_cache: Arc<dyn FastCache>,
        detector: Arc<dyn ChangeDetector>,
        ttl: TtlCalculator,
    ) -> Self {
        let rng = match config.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            inner: Arc::new(Inner {
                config,
                upstream,
                fast_cache,
                detector,
                ttl,
                state: Mutex::new(SchedulerState {
                    accepting: true,
                    running: HashMap::new(),
                    last_refresh_at: HashMap::new(),
                    pending: BinaryHeap::new(),
                    pending_keys: HashSet::new(),
                    seq: 0,
                    rng,
                }),
                idle: Notify::new(),
                stats: RefreshStats::default(),
            }),
        }
    }

    /// 갱신 작업을 스케줄합니다.
    ///
    /// 호출자는 결과를 기다리지 않습니다. 반환값은 관측용입니다.
    pub fn schedule(&self, task: RefreshTask) -> ScheduleDecision {
        self.inner.schedule(task)
    }

    /// 새 작업을 받고 있는지 여부.
    pub fn is_accepting(&self) -> bool {
        self.inner.lock().accepting
    }

    /// 실행 중인 갱신 수.
    pub fn running_count(&self) -> usize {
        self.inner.lock().running.len()
    }

    /// 대기 중인 갱신 수.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// 키가 실행 중인지 여부.
    pub fn is_running(&self, key: &StorageKey) -> bool {
        self.inner.lock().running.contains_key(key)
    }

    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// 스케줄러를 종료합니다.
    ///
    /// 새 작업을 거부하고 대기열을 비운 뒤, 유예 시간 동안 실행 중 작업을 기다립니다.
    /// 유예 시간이 지나면 남은 작업을 중단하고 모든 상태를 정리합니다.
    pub async fn shutdown(&self) -> ShutdownSummary {
        let grace = self.inner.config.shutdown_grace();
        let dropped_pending = {
            let mut state = self.inner.lock();
            state.accepting = false;
            let dropped = state.pending.len();
            state.pending.clear();
            state.pending_keys.clear();
            dropped
        };

        info!(dropped_pending, grace_ms = grace.as_millis() as u64, "Refresh scheduler shutting down");

        let deadline = Instant::now() + grace;
        loop {
            let notified = self.inner.idle.notified();
            if self.inner.lock().running.is_empty() {
                break;
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                break;
            }
        }

        let aborted = {
            let mut state = self.inner.lock();
            let aborted = state.running.len();
            for (_, handle) in state.running.drain() {
                handle.abort();
            }
            state.last_refresh_at.clear();
            state.pending.clear();
            state.pending_keys.clear();
            aborted
        };

        if aborted > 0 {
            warn!(aborted, "Refresh tasks aborted after grace period");
        }
        metrics::set_refresh_load(0, 0);
        info!(dropped_pending, aborted, "Refresh scheduler stopped");

        ShutdownSummary {
            dropped_pending,
            aborted,
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn schedule(self: &Arc<Self>, mut task: RefreshTask) -> ScheduleDecision {
        let now = Instant::now();
        let mut state = self.lock();

        if !state.accepting {
            RefreshStats::incr(&self.stats.rejected, "rejected");
            return ScheduleDecision::Rejected;
        }

        if state.is_throttled(&task.storage_key, now, self.config.min_interval()) {
            debug!(key = %task.storage_key, "Refresh throttled");
            RefreshStats::incr(&self.stats.throttled, "throttled");
            return ScheduleDecision::Throttled;
        }

        if state.running.contains_key(&task.storage_key)
            || state.pending_keys.contains(&task.storage_key)
        {
            debug!(key = %task.storage_key, "Refresh already in flight");
            RefreshStats::incr(&self.stats.deduplicated, "deduplicated");
            return ScheduleDecision::Duplicate;
        }

        let jitter = if self.config.jitter > 0.0 {
            state.rng.gen_range(0.0..self.config.jitter)
        } else {
            0.0
        };
        task.priority = task.market().refresh_weight() + jitter;

        let decision = if state.running.len() < self.config.max_concurrent {
            self.start(&mut state, task, now);
            ScheduleDecision::Started
        } else {
            state.seq += 1;
            let seq = state.seq;
            debug!(key = %task.storage_key, priority = task.priority, "Refresh queued");
            state.pending_keys.insert(task.storage_key.clone());
            state.pending.push(QueuedTask { seq, task });
            RefreshStats::incr(&self.stats.queued, "queued");
            ScheduleDecision::Queued
        };

        metrics::set_refresh_load(state.running.len(), state.pending.len());
        decision
    }

    /// 실행을 시작합니다. 호출자는 잠금을 잡고 있어야 합니다.
    fn start(self: &Arc<Self>, state: &mut SchedulerState, task: RefreshTask, now: Instant) {
        let key = task.storage_key.clone();
        state.last_refresh_at.insert(key.clone(), now);

        let inner = Arc::clone(self);
        let handle = tokio::spawn(async move { inner.run(task).await });
        state.running.insert(key, handle.abort_handle());

        RefreshStats::incr(&self.stats.started, "started");
    }

    /// 갱신 1건을 실행하고 결과와 관계없이 `complete`를 호출합니다.
    async fn run(self: Arc<Self>, task: RefreshTask) {
        let key = task.storage_key.clone();
        let guarded = AssertUnwindSafe(tokio::time::timeout(
            self.config.refresh_timeout(),
            self.refresh(&task),
        ))
        .catch_unwind()
        .await;

        match guarded {
            Ok(Ok(Ok(written))) => {
                RefreshStats::incr(&self.stats.completed, "completed");
                if written {
                    RefreshStats::incr(&self.stats.written, "written");
                }
            }
            Ok(Ok(Err(e))) => {
                warn!(key = %key, correlation_id = %task.correlation_id, error = %e, "Background refresh failed");
                RefreshStats::incr(&self.stats.failed, "failed");
            }
            Ok(Err(_)) => {
                warn!(key = %key, correlation_id = %task.correlation_id, "Background refresh timed out");
                RefreshStats::incr(&self.stats.failed, "failed");
            }
            Err(_) => {
                warn!(key = %key, correlation_id = %task.correlation_id, "Background refresh panicked");
                RefreshStats::incr(&self.stats.failed, "failed");
            }
        }

        self.complete(&key);
    }

    /// 업스트림을 다시 조회하고 의미 있는 변경이면 캐시에 기록합니다.
    ///
    /// 캐시에 기록했으면 `true`.
    #[instrument(skip(self, task), fields(key = %task.storage_key, correlation_id = %task.correlation_id))]
    async fn refresh(&self, task: &RefreshTask) -> CoreResult<bool> {
        let response = self.upstream.fetch(&task.request).await?;
        let payload = response.get(0).cloned().ok_or_else(|| {
            CoreError::Upstream(
                response
                    .failure_reason(&task.symbol)
                    .unwrap_or("데이터 없음")
                    .to_string(),
            )
        })?;

        let market = task.market();
        let (status, ttl_secs) = match self.ttl.market_status(market).await {
            Ok(status) => (status, self.ttl.ttl_for_status(&status)),
            Err(e) => {
                warn!(%market, error = %e, "시장 상태 조회 실패, 장 마감으로 간주");
                (MarketStatus::closed(), self.ttl.default_ttl())
            }
        };

        let report = self
            .detector
            .detect(&task.symbol, &payload, task.cached_snapshot.as_ref(), market, &status)
            .await?;

        if !report.changed {
            debug!(details = %report.details, "No significant change");
            return Ok(false);
        }

        self.fast_cache.set(&task.storage_key, &payload, ttl_secs).await?;
        debug!(ttl_secs, confidence = report.confidence, details = %report.details, "Cache refreshed");
        Ok(true)
    }

    /// 실행 종료 처리. 여유가 생긴 만큼 대기열에서 꺼내 실행합니다.
    fn complete(self: &Arc<Self>, key: &StorageKey) {
        let now = Instant::now();
        let mut state = self.lock();
        state.running.remove(key);

        while state.accepting && state.running.len() < self.config.max_concurrent {
            let Some(next) = state.pending.pop() else {
                break;
            };
            let next_key = next.task.storage_key.clone();
            state.pending_keys.remove(&next_key);

            debug!(key = %next_key, priority = next.task.priority, "Refresh dequeued");
            self.start(&mut state, next.task, now);
        }

        metrics::set_refresh_load(state.running.len(), state.pending.len());

        if state.running.is_empty() {
            self.idle.notify_waiters();
        }
    }
}
