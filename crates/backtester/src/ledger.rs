//! Shared portfolio ledger for one backtest run.
//!
//! All instrument tasks in a run draw on the same cash pool, so every
//! mutation goes through one mutex-guarded state block. Lock scope is a few
//! arithmetic ops per call; contention is negligible next to simulation work.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;
use walkforward_core::{Direction, Position, TradeCosts, TradeSummary};

/// Rejection reasons for opening a position.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },
    #[error("position already open for {0}")]
    PositionExists(String),
}

struct LedgerState {
    cash: Decimal,
    positions: HashMap<String, Position>,
    realized_pnl: Decimal,
}

/// Cash and open positions for one run.
pub struct PortfolioLedger {
    initial_capital: Decimal,
    state: Mutex<LedgerState>,
}

impl PortfolioLedger {
    pub fn new(initial_capital: Decimal) -> Self {
        Self {
            initial_capital,
            state: Mutex::new(LedgerState {
                cash: initial_capital,
                positions: HashMap::new(),
                realized_pnl: Decimal::ZERO,
            }),
        }
    }

    pub fn initial_capital(&self) -> Decimal {
        self.initial_capital
    }

    pub fn cash(&self) -> Decimal {
        self.lock().cash
    }

    /// Net P&L realized by closed trades so far.
    pub fn realized_pnl(&self) -> Decimal {
        self.lock().realized_pnl
    }

    pub fn has_position(&self, symbol: &str) -> bool {
        self.lock().positions.contains_key(symbol)
    }

    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.lock().positions.get(symbol).cloned()
    }

    /// Deducts the full outlay (notional plus entry costs) and books the
    /// position. One position per symbol: a second entry for the same symbol
    /// is rejected, never merged or overwritten.
    pub fn open_position(&self, position: Position) -> Result<(), LedgerError> {
        let mut state = self.lock();
        if state.positions.contains_key(&position.symbol) {
            return Err(LedgerError::PositionExists(position.symbol));
        }
        let required = position.entry_price * position.quantity + position.entry_cost();
        if required > state.cash {
            return Err(LedgerError::InsufficientCash {
                required,
                available: state.cash,
            });
        }
        state.cash -= required;
        state.positions.insert(position.symbol.clone(), position);
        Ok(())
    }

    /// Advances the position one bar and folds the bar range into its
    /// favorable/adverse excursion tracking. No-op when no position is open.
    pub fn touch_bar(&self, symbol: &str, high: Decimal, low: Decimal) {
        let mut state = self.lock();
        if let Some(position) = state.positions.get_mut(symbol) {
            position.bars_held += 1;
            position.record_excursion(high, low);
        }
    }

    /// Closes the position at the given price, credits the proceeds back to
    /// cash, and returns the immutable round-trip record. `None` when no
    /// position is open for the symbol.
    pub fn close_position(
        &self,
        symbol: &str,
        exit_price: Decimal,
        exit_date: DateTime<Utc>,
        exit_costs: TradeCosts,
        exit_reason: &str,
    ) -> Option<TradeSummary> {
        let mut state = self.lock();
        let position = state.positions.remove(symbol)?;

        let gross_pnl = match position.direction {
            Direction::Long => (exit_price - position.entry_price) * position.quantity,
            Direction::Short => (position.entry_price - exit_price) * position.quantity,
        };
        let net_pnl = gross_pnl - position.entry_cost() - exit_costs.total();

        // Entry deducted notional + entry costs, so crediting entry notional
        // + gross - exit costs leaves a net cash delta of exactly net_pnl.
        state.cash += position.entry_price * position.quantity + gross_pnl - exit_costs.total();
        state.realized_pnl += net_pnl;

        Some(TradeSummary {
            id: Uuid::new_v4(),
            symbol: position.symbol,
            direction: position.direction,
            quantity: position.quantity,
            entry_date: position.entry_date,
            exit_date,
            entry_price: position.entry_price,
            exit_price,
            gross_pnl,
            net_pnl,
            entry_costs: position.entry_costs,
            exit_costs,
            holding_bars: position.bars_held,
            max_favorable: position.max_favorable,
            max_adverse: position.max_adverse,
            entry_reason: position.entry_reason,
            exit_reason: exit_reason.to_string(),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        // A poisoned ledger means a panic mid-mutation; the run is already
        // lost, so propagate the panic rather than trade on bad state.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
