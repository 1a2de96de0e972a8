//! Backtest run records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bar::Interval;

/// Lifecycle status of a backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(RunStatus::Queued),
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }
}

/// Configuration snapshot captured when a run is dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Strategy name (resolved through the strategy factory).
    pub strategy: String,
    /// Instruments to simulate.
    pub symbols: Vec<String>,
    /// Intervals to simulate for each instrument.
    pub intervals: Vec<Interval>,
    /// Simulation start date (inclusive).
    pub start_date: NaiveDate,
    /// Simulation end date (inclusive).
    pub end_date: NaiveDate,
    /// Initial capital for the run's ledger.
    pub initial_capital: Decimal,
    /// Maximum concurrent instrument simulations.
    pub max_parallelism: usize,
    /// Maximum fraction of capital allocated to a single position.
    pub max_alloc_fraction: Decimal,
}

/// Aggregate metrics for a completed run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Number of closed round-trips.
    pub total_trades: usize,
    /// Sum of trade net P&L.
    pub total_pnl: Decimal,
    /// Total return as a fraction of initial capital.
    pub total_return: f64,
    /// Maximum drawdown fraction of the equity curve.
    pub max_drawdown: f64,
    /// Fraction of trades that were winners.
    pub win_rate: f64,
    /// Annualized Sharpe ratio of the equity curve.
    pub sharpe_ratio: f64,
}

/// One execution of the backtest engine over a set of instruments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestRun {
    /// Run ID.
    pub id: Uuid,
    /// Owning session, if dispatched by the orchestrator.
    pub session_id: Option<Uuid>,
    /// Dispatch-time configuration.
    pub config: RunConfig,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Aggregate metrics, present once completed.
    pub metrics: Option<RunMetrics>,
    /// Trailing error message for failed runs.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl BacktestRun {
    pub fn new(session_id: Option<Uuid>, config: RunConfig) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            session_id,
            config,
            status: RunStatus::Queued,
            metrics: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }
}
