//! Strategy contract and the built-in reference strategies.
//!
//! Strategies are pure decision functions over price history: they never
//! touch the ledger or place fills themselves. The simulator owns execution
//! and asks the strategy three questions per bar: enter? exit? how much?

use anyhow::{anyhow, Result};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use walkforward_core::{Direction, Position, PriceBar};

/// Entry decision for the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Hold,
    EnterLong,
    EnterShort,
}

/// Price history visible to a strategy at one decision point.
///
/// `bars` always ends at the current bar. `paired` carries the second leg's
/// history for spread-style strategies and is `None` for everything else.
pub struct SignalContext<'a> {
    pub bars: &'a [PriceBar],
    pub paired: Option<&'a [PriceBar]>,
}

impl<'a> SignalContext<'a> {
    pub fn single(bars: &'a [PriceBar]) -> Self {
        Self { bars, paired: None }
    }

    pub fn current(&self) -> &PriceBar {
        // Simulator never builds an empty context
        &self.bars[self.bars.len() - 1]
    }
}

/// A trading strategy evaluated bar by bar.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &str;

    /// Bars of history required before the first signal. The simulator skips
    /// earlier bars entirely.
    fn min_lookback(&self) -> usize;

    /// Entry decision given history up to and including the current bar.
    fn generate_signal(&self, ctx: &SignalContext<'_>) -> Signal;

    /// Exit decision for an open position; `Some(reason)` closes it at the
    /// current bar's close. Stops are checked by the simulator before this
    /// is consulted.
    fn should_exit(&self, ctx: &SignalContext<'_>, position: &Position) -> Option<String>;

    /// Notional to commit to a new entry given the capital available to this
    /// fill. The simulator caps `available` before calling.
    fn allocation_amount(&self, available: Decimal, price: Decimal) -> Decimal;

    /// Protective stop for a new entry, if the strategy uses one.
    fn stop_price(&self, _entry_price: Decimal, _direction: Direction) -> Option<Decimal> {
        None
    }

    /// Bars of volume history averaged for the liquidity check.
    fn volume_lookback(&self) -> usize {
        20
    }

    /// Minimum average volume needed to trade the instrument. Zero disables
    /// the check.
    fn min_avg_volume(&self) -> Decimal {
        Decimal::ZERO
    }

    /// Whether the strategy needs a paired instrument's history in its
    /// context.
    fn wants_pair(&self) -> bool {
        false
    }
}

/// Builds a strategy by name with default parameters.
pub fn create_strategy(name: &str) -> Result<Box<dyn Strategy>> {
    match name {
        "mean_reversion" => Ok(Box::new(MeanReversionStrategy::default())),
        "momentum" => Ok(Box::new(MomentumStrategy::default())),
        other => Err(anyhow!("unknown strategy: {}", other)),
    }
}

// Indicator helpers. All take the window they should look at; callers slice.

pub(crate) fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if values.len() < period || period == 0 {
        return None;
    }
    let window = &values[values.len() - period..];
    let sum: Decimal = window.iter().sum();
    Some(sum / Decimal::new(period as i64, 0))
}

pub(crate) fn std_dev(values: &[Decimal], period: usize) -> Option<f64> {
    if values.len() < period || period < 2 {
        return None;
    }
    let window = &values[values.len() - period..];
    let floats: Vec<f64> = window.iter().filter_map(|v| v.to_f64()).collect();
    if floats.len() < period {
        return None;
    }
    let mean = floats.iter().sum::<f64>() / floats.len() as f64;
    let variance =
        floats.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (floats.len() - 1) as f64;
    Some(variance.sqrt())
}

/// Wilder-smoothed RSI over the last `period` price changes.
pub(crate) fn rsi(values: &[Decimal], period: usize) -> Option<f64> {
    if values.len() < period + 1 || period == 0 {
        return None;
    }
    let window = &values[values.len() - period - 1..];
    let mut gains = 0.0_f64;
    let mut losses = 0.0_f64;
    for pair in window.windows(2) {
        let change = (pair[1] - pair[0]).to_f64()?;
        if change > 0.0 {
            gains += change;
        } else {
            losses -= change;
        }
    }
    if losses == 0.0 {
        return Some(100.0);
    }
    let rs = gains / losses;
    Some(100.0 - 100.0 / (1.0 + rs))
}

pub(crate) fn avg_volume(bars: &[PriceBar], lookback: usize) -> Decimal {
    if bars.is_empty() || lookback == 0 {
        return Decimal::ZERO;
    }
    let take = lookback.min(bars.len());
    let window = &bars[bars.len() - take..];
    let sum: Decimal = window.iter().map(|b| b.volume).sum();
    sum / Decimal::new(take as i64, 0)
}

fn closes(bars: &[PriceBar]) -> Vec<Decimal> {
    bars.iter().map(|b| b.close).collect()
}

/// Bollinger-band mean reversion filtered by RSI.
///
/// Enters long when the close drops below the lower band while RSI shows
/// oversold; exits when price reverts to the middle band or RSI flips to
/// overbought. Symmetric for shorts at the upper band.
pub struct MeanReversionStrategy {
    pub band_period: usize,
    pub band_width: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    /// Fraction of available capital committed per entry.
    pub alloc_fraction: Decimal,
    /// Protective stop distance as a fraction of entry price.
    pub stop_fraction: Decimal,
}

impl Default for MeanReversionStrategy {
    fn default() -> Self {
        Self {
            band_period: 20,
            band_width: 2.0,
            rsi_period: 14,
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            alloc_fraction: Decimal::new(25, 2),
            stop_fraction: Decimal::new(5, 2),
        }
    }
}

impl MeanReversionStrategy {
    fn bands(&self, closes: &[Decimal]) -> Option<(Decimal, Decimal, Decimal)> {
        let middle = sma(closes, self.band_period)?;
        let deviation = std_dev(closes, self.band_period)?;
        let width = Decimal::from_f64(deviation * self.band_width)?;
        Some((middle - width, middle, middle + width))
    }
}

impl Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn min_lookback(&self) -> usize {
        self.band_period.max(self.rsi_period + 1)
    }

    fn generate_signal(&self, ctx: &SignalContext<'_>) -> Signal {
        let closes = closes(ctx.bars);
        let Some((lower, _, upper)) = self.bands(&closes) else {
            return Signal::Hold;
        };
        let Some(rsi) = rsi(&closes, self.rsi_period) else {
            return Signal::Hold;
        };
        let close = ctx.current().close;

        if close < lower && rsi < self.rsi_oversold {
            Signal::EnterLong
        } else if close > upper && rsi > self.rsi_overbought {
            Signal::EnterShort
        } else {
            Signal::Hold
        }
    }

    fn should_exit(&self, ctx: &SignalContext<'_>, position: &Position) -> Option<String> {
        let closes = closes(ctx.bars);
        let (_, middle, _) = self.bands(&closes)?;
        let rsi = rsi(&closes, self.rsi_period)?;
        let close = ctx.current().close;

        match position.direction {
            Direction::Long => {
                if close >= middle {
                    Some("Mean Reversion Complete".to_string())
                } else if rsi > self.rsi_overbought {
                    Some("RSI Overbought".to_string())
                } else {
                    None
                }
            }
            Direction::Short => {
                if close <= middle {
                    Some("Mean Reversion Complete".to_string())
                } else if rsi < self.rsi_oversold {
                    Some("RSI Oversold".to_string())
                } else {
                    None
                }
            }
        }
    }

    fn allocation_amount(&self, available: Decimal, _price: Decimal) -> Decimal {
        available * self.alloc_fraction
    }

    fn stop_price(&self, entry_price: Decimal, direction: Direction) -> Option<Decimal> {
        let distance = entry_price * self.stop_fraction;
        Some(match direction {
            Direction::Long => entry_price - distance,
            Direction::Short => entry_price + distance,
        })
    }

    fn min_avg_volume(&self) -> Decimal {
        Decimal::new(100_000, 0)
    }
}

/// Rate-of-change momentum.
///
/// Enters long when the close has risen more than `entry_threshold` over the
/// lookback; exits once momentum turns negative.
pub struct MomentumStrategy {
    pub lookback: usize,
    /// Minimum fractional gain over the lookback to enter.
    pub entry_threshold: f64,
    pub alloc_fraction: Decimal,
    pub stop_fraction: Decimal,
}

impl Default for MomentumStrategy {
    fn default() -> Self {
        Self {
            lookback: 63,
            entry_threshold: 0.10,
            alloc_fraction: Decimal::new(25, 2),
            stop_fraction: Decimal::new(8, 2),
        }
    }
}

impl MomentumStrategy {
    fn rate_of_change(&self, bars: &[PriceBar]) -> Option<f64> {
        if bars.len() <= self.lookback {
            return None;
        }
        let past = bars[bars.len() - 1 - self.lookback].close;
        if past.is_zero() {
            return None;
        }
        let current = bars[bars.len() - 1].close;
        ((current - past) / past).to_f64()
    }
}

impl Strategy for MomentumStrategy {
    fn name(&self) -> &str {
        "momentum"
    }

    fn min_lookback(&self) -> usize {
        self.lookback + 1
    }

    fn generate_signal(&self, ctx: &SignalContext<'_>) -> Signal {
        match self.rate_of_change(ctx.bars) {
            Some(roc) if roc > self.entry_threshold => Signal::EnterLong,
            _ => Signal::Hold,
        }
    }

    fn should_exit(&self, ctx: &SignalContext<'_>, _position: &Position) -> Option<String> {
        match self.rate_of_change(ctx.bars) {
            Some(roc) if roc < 0.0 => Some("Momentum Faded".to_string()),
            _ => None,
        }
    }

    fn allocation_amount(&self, available: Decimal, _price: Decimal) -> Decimal {
        available * self.alloc_fraction
    }

    fn stop_price(&self, entry_price: Decimal, direction: Direction) -> Option<Decimal> {
        let distance = entry_price * self.stop_fraction;
        Some(match direction {
            Direction::Long => entry_price - distance,
            Direction::Short => entry_price + distance,
        })
    }

    fn min_avg_volume(&self) -> Decimal {
        Decimal::new(100_000, 0)
    }
}
