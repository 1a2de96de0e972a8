//! Seeded synthetic price history for demonstration runs.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use walkforward_core::{Interval, PriceBar};

/// Generates daily bars as a geometric random walk with occasional sharp
/// dips, which gives mean-reversion strategies something to trade.
pub fn random_walk_bars(
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    seed: u64,
) -> Vec<PriceBar> {
    // Derive a per-symbol seed so every instrument walks its own path
    let symbol_seed = symbol
        .bytes()
        .fold(seed, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
    let mut rng = StdRng::seed_from_u64(symbol_seed);

    let mut bars = Vec::new();
    let mut price: f64 = 50.0 + rng.gen_range(0.0..100.0);
    let mut day = start;
    while day <= end {
        let drift = rng.gen_range(-0.015..0.016);
        // Roughly one sharp selloff a month
        let shock = if rng.gen_range(0..22) == 0 {
            -rng.gen_range(0.05..0.12)
        } else {
            0.0
        };
        price = (price * (1.0 + drift + shock)).max(1.0);

        let high = price * (1.0 + rng.gen_range(0.0..0.01));
        let low = price * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0);

        let timestamp = Utc.from_utc_datetime(&day.and_hms_opt(16, 0, 0).unwrap_or_default());
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            interval: Interval::Day,
            timestamp,
            open: decimal(price),
            high: decimal(high),
            low: decimal(low),
            close: decimal(price),
            volume: decimal(volume),
        });
        day += Duration::days(1);
    }
    bars
}

fn decimal(value: f64) -> Decimal {
    Decimal::from_f64((value * 100.0).round() / 100.0).unwrap_or(Decimal::ONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_deterministic_for_same_seed() {
        let a = random_walk_bars("AAPL", date(2020, 1, 1), date(2020, 3, 1), 7);
        let b = random_walk_bars("AAPL", date(2020, 1, 1), date(2020, 3, 1), 7);
        assert_eq!(a.len(), b.len());
        assert!(a.iter().zip(&b).all(|(x, y)| x.close == y.close));
    }

    #[test]
    fn test_symbols_walk_different_paths() {
        let a = random_walk_bars("AAPL", date(2020, 1, 1), date(2020, 3, 1), 7);
        let b = random_walk_bars("MSFT", date(2020, 1, 1), date(2020, 3, 1), 7);
        assert!(a.iter().zip(&b).any(|(x, y)| x.close != y.close));
    }

    #[test]
    fn test_bars_are_ordered_and_positive() {
        let bars = random_walk_bars("NVDA", date(2020, 1, 1), date(2021, 1, 1), 42);
        assert!(PriceBar::is_ascending(&bars));
        assert!(bars.iter().all(|b| b.close > Decimal::ZERO));
        assert!(bars.iter().all(|b| b.low <= b.high));
    }
}
