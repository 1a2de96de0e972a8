//! Collaborator contracts: persistence, price history, and optimization
//! dispatch.
//!
//! The orchestration core talks to the outside world only through these
//! traits. Concrete backends (Postgres, in-memory) live in the orchestrator
//! crate; the schema itself is owned by the store, not by this crate.

use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{
    BacktestRun, BatchKind, CycleTracker, InstrumentPerformance, Interval, PriceBar, RunMetrics,
    Session, SleeveEntry, TradeSummary,
};

/// Result of atomically recording one batch-completion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// Recorded; the sibling batch is still outstanding.
    Pending,
    /// Both batches are now complete and this caller won the dispatch.
    /// Returned to exactly one caller per tracker, ever.
    ReadyToDispatch,
    /// Both batches were already complete and dispatch already fired.
    AlreadyDispatched,
    /// No tracker with that ID exists.
    Unknown,
}

/// Whether the optimizer should train from scratch or refine existing
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMode {
    Train,
    FineTune,
}

/// Batch request handed to the external optimization service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizationRequest {
    pub session_id: Uuid,
    pub strategy: String,
    pub mode: OptimizationMode,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub symbols: Vec<String>,
}

/// Session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, session: &Session) -> Result<()>;
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>>;
    async fn update_session(&self, session: &Session) -> Result<()>;
}

/// Cycle tracker persistence with an atomic fan-in signal.
#[async_trait]
pub trait CycleStore: Send + Sync {
    async fn create_tracker(&self, tracker: &CycleTracker) -> Result<()>;
    async fn get_tracker(&self, id: Uuid) -> Result<Option<CycleTracker>>;

    /// Record one batch completion and report the fan-in state.
    ///
    /// Must be computed atomically against persisted state: concurrent or
    /// duplicate signals for the same tracker see `ReadyToDispatch` at most
    /// once between them.
    async fn record_completion(&self, id: Uuid, batch: BatchKind) -> Result<CompletionOutcome>;
}

/// Append-only sleeve assignment history plus optimized-parameter lookup.
#[async_trait]
pub trait SleeveStore: Send + Sync {
    async fn save_entries(&self, entries: &[SleeveEntry]) -> Result<()>;
    async fn entries_for_period(
        &self,
        session_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Vec<SleeveEntry>>;

    /// Most recent optimized parameter set for (session, symbol) as of a
    /// date. `None` is data absence: the caller skips the instrument.
    async fn params_for(
        &self,
        session_id: Uuid,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<Uuid>>;
}

/// Backtest run lifecycle and trade history persistence.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn create_run(&self, run: &BacktestRun) -> Result<()>;
    async fn get_run(&self, id: Uuid) -> Result<Option<BacktestRun>>;
    async fn set_running(&self, id: Uuid) -> Result<()>;
    async fn complete_run(&self, id: Uuid, metrics: &RunMetrics) -> Result<()>;
    async fn fail_run(&self, id: Uuid, error: &str) -> Result<()>;
    async fn save_trades(&self, run_id: Uuid, trades: &[TradeSummary]) -> Result<()>;
}

/// Ordered historical price bars.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Bars for (symbol, interval) within [start, end], ascending by
    /// timestamp. An empty result means no history exists.
    async fn bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>>;
}

/// Per-instrument performance records keyed by run.
#[async_trait]
pub trait PerformanceStore: Send + Sync {
    async fn save_performance(&self, record: &InstrumentPerformance) -> Result<()>;
    async fn performance_for_run(&self, run_id: Uuid) -> Result<Vec<InstrumentPerformance>>;
}

/// Fire-and-forget submission to the external optimization service.
#[async_trait]
pub trait OptimizationDispatcher: Send + Sync {
    async fn submit(&self, request: &OptimizationRequest) -> Result<()>;
}
