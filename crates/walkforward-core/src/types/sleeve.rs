//! Sleeve assignments and per-instrument performance records.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::bar::Interval;

/// One (session, trading period, instrument) sleeve assignment.
///
/// Entries are append-only history: a later selection for the same period
/// supersedes earlier rows rather than deleting them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SleeveEntry {
    /// Entry ID.
    pub id: Uuid,
    /// Owning session.
    pub session_id: Uuid,
    /// Start of the trading period this assignment covers.
    pub period_start: NaiveDate,
    /// Instrument symbol.
    pub symbol: String,
    /// Interval the instrument trades at.
    pub interval: Interval,
    /// Strategy name.
    pub strategy: String,
    /// Reference to the optimized parameter set, if one exists.
    pub params_ref: Option<Uuid>,
    /// In-sample Sharpe ratio that earned the assignment.
    pub in_sample_sharpe: f64,
    /// In-sample max drawdown fraction.
    pub in_sample_drawdown: f64,
    /// True for the active sleeve, false for shadow.
    pub active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl SleeveEntry {
    pub fn new(
        session_id: Uuid,
        period_start: NaiveDate,
        symbol: &str,
        interval: Interval,
        strategy: &str,
        in_sample_sharpe: f64,
        in_sample_drawdown: f64,
        active: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            period_start,
            symbol: symbol.to_string(),
            interval,
            strategy: strategy.to_string(),
            params_ref: None,
            in_sample_sharpe,
            in_sample_drawdown,
            active,
            created_at: Utc::now(),
        }
    }
}

/// Per-instrument performance for one run, persisted for ranking the next
/// cycle's universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentPerformance {
    /// Run that produced this record.
    pub run_id: Uuid,
    /// Instrument symbol.
    pub symbol: String,
    /// Interval simulated.
    pub interval: Interval,
    /// Annualized Sharpe ratio.
    pub sharpe_ratio: f64,
    /// Max drawdown fraction.
    pub max_drawdown: f64,
    /// Closed round-trips.
    pub trade_count: usize,
    /// Sum of trade net P&L.
    pub total_pnl: Decimal,
}
