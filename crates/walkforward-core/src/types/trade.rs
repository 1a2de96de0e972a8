//! Closed round-trip trade records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::position::Direction;

/// Itemized transaction costs for one fill.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TradeCosts {
    /// Half-spread cost paid to cross the book.
    pub spread: Decimal,
    /// Broker commission.
    pub commission: Decimal,
    /// Estimated market-impact slippage.
    pub slippage: Decimal,
}

impl TradeCosts {
    pub fn total(&self) -> Decimal {
        self.spread + self.commission + self.slippage
    }
}

/// One closed round-trip. Immutable once created; this is the unit persisted
/// to trade history and aggregated into run metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSummary {
    /// Trade ID.
    pub id: Uuid,
    /// Instrument symbol.
    pub symbol: String,
    /// Long or short.
    pub direction: Direction,
    /// Whole-share quantity.
    pub quantity: Decimal,
    /// Entry fill timestamp.
    pub entry_date: DateTime<Utc>,
    /// Exit fill timestamp.
    pub exit_date: DateTime<Utc>,
    /// Entry fill price.
    pub entry_price: Decimal,
    /// Exit fill price.
    pub exit_price: Decimal,
    /// Gross P&L before costs.
    pub gross_pnl: Decimal,
    /// Net P&L after entry and exit costs.
    pub net_pnl: Decimal,
    /// Costs paid at entry.
    pub entry_costs: TradeCosts,
    /// Costs paid at exit.
    pub exit_costs: TradeCosts,
    /// Bars held between entry and exit.
    pub holding_bars: u32,
    /// Maximum favorable excursion while open.
    pub max_favorable: Decimal,
    /// Maximum adverse excursion while open.
    pub max_adverse: Decimal,
    /// Why the position was opened.
    pub entry_reason: String,
    /// Why the position was closed.
    pub exit_reason: String,
}

impl TradeSummary {
    /// Total transaction costs across entry and exit.
    pub fn total_costs(&self) -> Decimal {
        self.entry_costs.total() + self.exit_costs.total()
    }

    /// Whether the round-trip made money after costs.
    pub fn is_winner(&self) -> bool {
        self.net_pnl > Decimal::ZERO
    }
}
