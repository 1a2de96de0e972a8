//! In-memory store implementations.
//!
//! Back the runner binary and the test suite. `MemoryCycleStore` keeps the
//! same check-and-set contract as the Postgres store: completion recording
//! and the dispatch award happen under one shard lock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use uuid::Uuid;
use walkforward_core::{
    BacktestRun, BatchKind, CompletionOutcome, CycleStore, CycleTracker, InstrumentPerformance,
    Interval, OptimizationDispatcher, OptimizationRequest, PerformanceStore, PriceBar,
    PriceSource, RunMetrics, RunStatus, RunStore, Session, SessionStore, SleeveEntry, SleeveStore,
    TradeSummary,
};

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: DashMap<Uuid, Session>,
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        Ok(self.sessions.get(&id).map(|s| s.clone()))
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        self.sessions.insert(session.id, session.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryCycleStore {
    trackers: DashMap<Uuid, CycleTracker>,
}

#[async_trait]
impl CycleStore for MemoryCycleStore {
    async fn create_tracker(&self, tracker: &CycleTracker) -> Result<()> {
        self.trackers.insert(tracker.id, tracker.clone());
        Ok(())
    }

    async fn get_tracker(&self, id: Uuid) -> Result<Option<CycleTracker>> {
        Ok(self.trackers.get(&id).map(|t| t.clone()))
    }

    async fn record_completion(&self, id: Uuid, batch: BatchKind) -> Result<CompletionOutcome> {
        // get_mut holds the shard lock for the whole check-and-set, which is
        // what makes ReadyToDispatch single-winner under concurrent signals
        let Some(mut tracker) = self.trackers.get_mut(&id) else {
            return Ok(CompletionOutcome::Unknown);
        };
        match batch {
            BatchKind::Active => tracker.active_complete = true,
            BatchKind::Shadow => tracker.shadow_complete = true,
        }
        if !tracker.both_complete() {
            return Ok(CompletionOutcome::Pending);
        }
        if tracker.optimization_dispatched {
            return Ok(CompletionOutcome::AlreadyDispatched);
        }
        tracker.optimization_dispatched = true;
        Ok(CompletionOutcome::ReadyToDispatch)
    }
}

#[derive(Default)]
pub struct MemorySleeveStore {
    entries: Mutex<Vec<SleeveEntry>>,
    params: DashMap<(Uuid, String), Vec<(NaiveDate, Uuid)>>,
}

impl MemorySleeveStore {
    /// Registers an optimized parameter set, as the external optimizer's
    /// callback would.
    pub fn set_params(&self, session_id: Uuid, symbol: &str, as_of: NaiveDate, params: Uuid) {
        self.params
            .entry((session_id, symbol.to_string()))
            .or_default()
            .push((as_of, params));
    }
}

#[async_trait]
impl SleeveStore for MemorySleeveStore {
    async fn save_entries(&self, entries: &[SleeveEntry]) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .extend_from_slice(entries);
        Ok(())
    }

    async fn entries_for_period(
        &self,
        session_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Vec<SleeveEntry>> {
        Ok(self
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| e.session_id == session_id && e.period_start == period_start)
            .cloned()
            .collect())
    }

    async fn params_for(
        &self,
        session_id: Uuid,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<Uuid>> {
        Ok(self
            .params
            .get(&(session_id, symbol.to_string()))
            .and_then(|versions| {
                versions
                    .iter()
                    .filter(|(date, _)| *date <= as_of)
                    .max_by_key(|(date, _)| *date)
                    .map(|(_, params)| *params)
            }))
    }
}

#[derive(Default)]
pub struct MemoryRunStore {
    runs: DashMap<Uuid, BacktestRun>,
    trades: DashMap<Uuid, Vec<TradeSummary>>,
}

impl MemoryRunStore {
    /// All runs dispatched for a session, newest last.
    pub fn runs_for_session(&self, session_id: Uuid) -> Vec<BacktestRun> {
        let mut runs: Vec<BacktestRun> = self
            .runs
            .iter()
            .filter(|r| r.session_id == Some(session_id))
            .map(|r| r.clone())
            .collect();
        runs.sort_by_key(|r| r.created_at);
        runs
    }

    pub fn trades_for_run(&self, run_id: Uuid) -> Vec<TradeSummary> {
        self.trades
            .get(&run_id)
            .map(|t| t.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn create_run(&self, run: &BacktestRun) -> Result<()> {
        self.runs.insert(run.id, run.clone());
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<BacktestRun>> {
        Ok(self.runs.get(&id).map(|r| r.clone()))
    }

    async fn set_running(&self, id: Uuid) -> Result<()> {
        if let Some(mut run) = self.runs.get_mut(&id) {
            run.status = RunStatus::Running;
            run.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn complete_run(&self, id: Uuid, metrics: &RunMetrics) -> Result<()> {
        if let Some(mut run) = self.runs.get_mut(&id) {
            run.status = RunStatus::Completed;
            run.metrics = Some(*metrics);
            run.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn fail_run(&self, id: Uuid, error: &str) -> Result<()> {
        if let Some(mut run) = self.runs.get_mut(&id) {
            run.status = RunStatus::Failed;
            run.error_message = Some(error.to_string());
            run.updated_at = chrono::Utc::now();
        }
        Ok(())
    }

    async fn save_trades(&self, run_id: Uuid, trades: &[TradeSummary]) -> Result<()> {
        self.trades.insert(run_id, trades.to_vec());
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryPriceSource {
    bars: DashMap<(String, Interval), Vec<PriceBar>>,
}

impl MemoryPriceSource {
    pub fn insert_series(&self, symbol: &str, interval: Interval, mut bars: Vec<PriceBar>) {
        bars.sort_by_key(|b| b.timestamp);
        self.bars.insert((symbol.to_string(), interval), bars);
    }
}

#[async_trait]
impl PriceSource for MemoryPriceSource {
    async fn bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        Ok(self
            .bars
            .get(&(symbol.to_string(), interval))
            .map(|series| {
                series
                    .iter()
                    .filter(|b| {
                        let date = b.timestamp.date_naive();
                        date >= start && date <= end
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[derive(Default)]
pub struct MemoryPerformanceStore {
    records: Mutex<Vec<InstrumentPerformance>>,
}

#[async_trait]
impl PerformanceStore for MemoryPerformanceStore {
    async fn save_performance(&self, record: &InstrumentPerformance) -> Result<()> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(())
    }

    async fn performance_for_run(&self, run_id: Uuid) -> Result<Vec<InstrumentPerformance>> {
        Ok(self
            .records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.run_id == run_id)
            .cloned()
            .collect())
    }
}

/// Records submitted optimization requests instead of calling anything.
///
/// Stands in for the external optimization service in the runner and in
/// tests asserting exactly-once dispatch.
#[derive(Default)]
pub struct CountingDispatcher {
    submitted: Mutex<Vec<OptimizationRequest>>,
    count: AtomicUsize,
}

impl CountingDispatcher {
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<OptimizationRequest> {
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl OptimizationDispatcher for CountingDispatcher {
    async fn submit(&self, request: &OptimizationRequest) -> Result<()> {
        self.count.fetch_add(1, Ordering::SeqCst);
        self.submitted
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());
        Ok(())
    }
}
