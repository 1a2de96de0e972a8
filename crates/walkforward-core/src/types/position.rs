//! In-memory position state owned by a run's portfolio ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::trade::TradeCosts;

/// Direction of a position or trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Long => write!(f, "Long"),
            Direction::Short => write!(f, "Short"),
        }
    }
}

/// An open position inside one simulation run.
///
/// Owned exclusively by that run's ledger; never shared across runs or
/// persisted to a store.
#[derive(Debug, Clone)]
pub struct Position {
    /// Instrument symbol.
    pub symbol: String,
    /// Long or short.
    pub direction: Direction,
    /// Whole-share quantity (always a non-negative integer value).
    pub quantity: Decimal,
    /// Fill price at entry.
    pub entry_price: Decimal,
    /// Entry bar timestamp.
    pub entry_date: DateTime<Utc>,
    /// Itemized transaction costs paid at entry.
    pub entry_costs: TradeCosts,
    /// Why the strategy entered, carried into the trade summary at close.
    pub entry_reason: String,
    /// Stop price, if the strategy set one.
    pub stop_price: Option<Decimal>,
    /// Bars held since entry.
    pub bars_held: u32,
    /// Scale-in entries recorded. The ledger enforces a single-entry policy,
    /// so this stays 1 until pyramiding is supported.
    pub pyramids: u32,
    /// Best unrealized price excursion seen since entry.
    pub max_favorable: Decimal,
    /// Worst unrealized price excursion seen since entry.
    pub max_adverse: Decimal,
}

impl Position {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: &str,
        direction: Direction,
        quantity: Decimal,
        entry_price: Decimal,
        entry_date: DateTime<Utc>,
        entry_costs: TradeCosts,
        entry_reason: &str,
        stop_price: Option<Decimal>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            direction,
            quantity,
            entry_price,
            entry_date,
            entry_costs,
            entry_reason: entry_reason.to_string(),
            stop_price,
            bars_held: 0,
            pyramids: 1,
            max_favorable: Decimal::ZERO,
            max_adverse: Decimal::ZERO,
        }
    }

    /// Total transaction cost paid at entry.
    pub fn entry_cost(&self) -> Decimal {
        self.entry_costs.total()
    }

    /// Whether the bar's range breaches the stop price.
    pub fn stop_hit(&self, high: Decimal, low: Decimal) -> bool {
        match (self.stop_price, self.direction) {
            (Some(stop), Direction::Long) => low <= stop,
            (Some(stop), Direction::Short) => high >= stop,
            (None, _) => false,
        }
    }

    /// Fold a bar's high/low into the favorable/adverse excursion tracking.
    pub fn record_excursion(&mut self, high: Decimal, low: Decimal) {
        let (favorable, adverse) = match self.direction {
            Direction::Long => (
                (high - self.entry_price) * self.quantity,
                (self.entry_price - low) * self.quantity,
            ),
            Direction::Short => (
                (self.entry_price - low) * self.quantity,
                (high - self.entry_price) * self.quantity,
            ),
        };
        self.max_favorable = self.max_favorable.max(favorable);
        self.max_adverse = self.max_adverse.max(adverse);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_position() -> Position {
        Position::new(
            "AAPL",
            Direction::Long,
            Decimal::new(10, 0),
            Decimal::new(100, 0),
            Utc::now(),
            TradeCosts::default(),
            "Test Entry",
            Some(Decimal::new(95, 0)),
        )
    }

    #[test]
    fn test_stop_hit_long() {
        let position = long_position();
        assert!(!position.stop_hit(Decimal::new(101, 0), Decimal::new(96, 0)));
        assert!(position.stop_hit(Decimal::new(101, 0), Decimal::new(95, 0)));
    }

    #[test]
    fn test_excursion_tracking() {
        let mut position = long_position();
        position.record_excursion(Decimal::new(110, 0), Decimal::new(99, 0));
        position.record_excursion(Decimal::new(104, 0), Decimal::new(90, 0));
        assert_eq!(position.max_favorable, Decimal::new(100, 0));
        assert_eq!(position.max_adverse, Decimal::new(100, 0));
    }
}
