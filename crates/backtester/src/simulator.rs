//! Bar-by-bar simulation of one strategy over one instrument's history.

use anyhow::Result;
use rust_decimal::Decimal;
use tracing::debug;
use walkforward_core::{Direction, Position, PriceBar, TradeSummary};

use crate::costs::{CostModel, FillSide};
use crate::ledger::PortfolioLedger;
use crate::strategy::{avg_volume, Signal, SignalContext, Strategy};

/// Per-run sizing bounds shared by every instrument task.
#[derive(Debug, Clone, Copy)]
pub struct SimulatorConfig {
    /// Capital the run started with; the allocation cap is a fraction of
    /// this, not of current cash.
    pub initial_capital: Decimal,
    /// Hard cap on any single entry as a fraction of initial capital.
    pub max_alloc_fraction: Decimal,
}

/// Drives one strategy over one instrument's bars against the shared ledger.
///
/// Processing order per bar: exits before entries, stops before strategy
/// exits, and never both an exit and an entry on the same bar. Any position
/// still open after the last bar is force-closed at that bar's close.
pub struct InstrumentSimulator<'a> {
    strategy: &'a dyn Strategy,
    ledger: &'a PortfolioLedger,
    costs: &'a CostModel,
    config: SimulatorConfig,
}

impl<'a> InstrumentSimulator<'a> {
    pub fn new(
        strategy: &'a dyn Strategy,
        ledger: &'a PortfolioLedger,
        costs: &'a CostModel,
        config: SimulatorConfig,
    ) -> Self {
        Self {
            strategy,
            ledger,
            costs,
            config,
        }
    }

    /// Runs the full bar loop and returns the instrument's closed trades in
    /// exit order.
    pub fn run(&self, bars: &[PriceBar]) -> Result<Vec<TradeSummary>> {
        let mut trades = Vec::new();
        if bars.is_empty() {
            return Ok(trades);
        }
        let symbol = bars[0].symbol.as_str();
        let lookback = self.strategy.min_lookback();

        for i in 0..bars.len() {
            let bar = &bars[i];
            let history = &bars[..=i];

            if self.ledger.has_position(symbol) {
                self.ledger.touch_bar(symbol, bar.high, bar.low);
                if let Some(trade) = self.try_exit(symbol, history, bar)? {
                    trades.push(trade);
                }
                // An exit frees capital next bar at the earliest
                continue;
            }

            if i + 1 < lookback {
                continue;
            }
            if let Some(signal) = self.entry_signal(history) {
                if let Some(position) = self.try_enter(symbol, bar, history, signal)? {
                    // Cash can move under us between sizing and booking when
                    // other instrument tasks fill first; a rejection here is
                    // a skip, not a failure.
                    if let Err(e) = self.ledger.open_position(position) {
                        debug!(symbol, error = %e, "entry rejected by ledger");
                    }
                }
            }
        }

        // End-of-period force close at the final bar's close
        let last = &bars[bars.len() - 1];
        if self.ledger.has_position(symbol) {
            if let Some(trade) = self.close_at(symbol, last, last.close, "End of Period") {
                trades.push(trade);
            }
        }

        Ok(trades)
    }

    fn entry_signal(&self, history: &[PriceBar]) -> Option<Signal> {
        let ctx = SignalContext::single(history);
        match self.strategy.generate_signal(&ctx) {
            Signal::Hold => None,
            signal => Some(signal),
        }
    }

    fn try_exit(
        &self,
        symbol: &str,
        history: &[PriceBar],
        bar: &PriceBar,
    ) -> Result<Option<TradeSummary>> {
        let Some(position) = self.ledger.position(symbol) else {
            return Ok(None);
        };

        // Stop checks run against the bar range before the strategy sees it
        if position.stop_hit(bar.high, bar.low) {
            let stop = position.stop_price.unwrap_or(bar.close);
            return Ok(self.close_at(symbol, bar, stop, "Stop Loss"));
        }

        let ctx = SignalContext::single(history);
        if let Some(reason) = self.strategy.should_exit(&ctx, &position) {
            return Ok(self.close_at(symbol, bar, bar.close, &reason));
        }
        Ok(None)
    }

    fn close_at(
        &self,
        symbol: &str,
        bar: &PriceBar,
        price: Decimal,
        reason: &str,
    ) -> Option<TradeSummary> {
        let position = self.ledger.position(symbol)?;
        let exit_costs = self.costs.costs(price, position.quantity);
        let trade = self
            .ledger
            .close_position(symbol, price, bar.timestamp, exit_costs, reason)?;
        debug!(
            symbol,
            reason,
            net_pnl = %trade.net_pnl,
            bars_held = trade.holding_bars,
            "closed position"
        );
        Some(trade)
    }

    fn try_enter(
        &self,
        symbol: &str,
        bar: &PriceBar,
        history: &[PriceBar],
        signal: Signal,
    ) -> Result<Option<Position>> {
        let volume = avg_volume(history, self.strategy.volume_lookback());
        if volume < self.strategy.min_avg_volume() {
            debug!(symbol, avg_volume = %volume, "skipping entry: illiquid");
            return Ok(None);
        }

        let direction = match signal {
            Signal::EnterLong => Direction::Long,
            Signal::EnterShort => Direction::Short,
            Signal::Hold => return Ok(None),
        };

        let cap = self.config.initial_capital * self.config.max_alloc_fraction;
        let available = cap.min(self.ledger.cash());
        let amount = self.strategy.allocation_amount(available, bar.close);
        if amount <= Decimal::ZERO || bar.close <= Decimal::ZERO {
            return Ok(None);
        }

        // Size against the effective fill, not the raw close, so the
        // allocation covers the friction paid to get in. Whole shares only;
        // a floor to zero means the entry is skipped.
        let side = match direction {
            Direction::Long => FillSide::Buy,
            Direction::Short => FillSide::Sell,
        };
        let fill = self.costs.fill_price(bar.close, side);
        let quantity = (amount / fill).floor();
        if quantity <= Decimal::ZERO {
            debug!(symbol, %amount, price = %fill, "skipping entry: sizes to zero shares");
            return Ok(None);
        }

        let entry_costs = self.costs.costs(bar.close, quantity);
        let stop = self.strategy.stop_price(bar.close, direction);
        let reason = format!("{} Entry", self.strategy.name());

        debug!(
            symbol,
            %quantity,
            price = %bar.close,
            direction = %direction,
            "opening position"
        );
        Ok(Some(Position::new(
            symbol,
            direction,
            quantity,
            bar.close,
            bar.timestamp,
            entry_costs,
            &reason,
            stop,
        )))
    }
}
