//! Transaction cost model applied to every simulated fill.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walkforward_core::{config::SimulationConfig, TradeCosts};

/// Which side of the book a fill crosses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillSide {
    Buy,
    Sell,
}

/// Converts a raw bar price and order size into an effective fill price and
/// itemized costs.
///
/// Spread and slippage scale with notional value; commission is per-share
/// with a floor. The same model instance is shared by every instrument task
/// in a run so costs stay comparable across the universe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostModel {
    /// Full bid-ask spread in basis points; fills pay half.
    pub spread_bps: Decimal,
    /// Commission charged per share.
    pub commission_per_share: Decimal,
    /// Minimum commission per fill.
    pub min_commission: Decimal,
    /// Market-impact slippage in basis points.
    pub slippage_bps: Decimal,
}

impl CostModel {
    pub fn from_config(config: &SimulationConfig) -> Self {
        Self {
            spread_bps: decimal(config.spread_bps),
            commission_per_share: decimal(config.commission_per_share),
            min_commission: decimal(config.min_commission),
            slippage_bps: decimal(config.slippage_bps),
        }
    }

    /// A model that charges nothing. Used by tests that assert on raw P&L.
    pub fn free() -> Self {
        Self {
            spread_bps: Decimal::ZERO,
            commission_per_share: Decimal::ZERO,
            min_commission: Decimal::ZERO,
            slippage_bps: Decimal::ZERO,
        }
    }

    fn per_share_friction(&self, price: Decimal) -> Decimal {
        let bps = self.spread_bps / Decimal::TWO + self.slippage_bps;
        price * bps / Decimal::new(10_000, 0)
    }

    /// Effective per-share fill price: buys pay up, sells receive less.
    pub fn fill_price(&self, price: Decimal, side: FillSide) -> Decimal {
        let friction = self.per_share_friction(price);
        match side {
            FillSide::Buy => price + friction,
            FillSide::Sell => price - friction,
        }
    }

    /// Itemized costs for filling `quantity` shares at a raw price.
    pub fn costs(&self, price: Decimal, quantity: Decimal) -> TradeCosts {
        let notional = price * quantity;
        let spread = notional * self.spread_bps / Decimal::TWO / Decimal::new(10_000, 0);
        let slippage = notional * self.slippage_bps / Decimal::new(10_000, 0);
        let commission = (quantity * self.commission_per_share).max(self.min_commission);
        TradeCosts {
            spread,
            commission,
            slippage,
        }
    }

}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}
