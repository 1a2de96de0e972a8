//! Price bar and sampling interval types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Bar sampling interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    /// 15 minutes
    Minute15,
    /// 1 hour
    Hour,
    /// 1 trading day
    Day,
    /// 1 week
    Week,
}

impl Interval {
    /// Stable string form used for persistence.
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::Minute15 => "15m",
            Interval::Hour => "1h",
            Interval::Day => "1d",
            Interval::Week => "1w",
        }
    }

    /// Parse the persisted string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "15m" => Some(Interval::Minute15),
            "1h" => Some(Interval::Hour),
            "1d" => Some(Interval::Day),
            "1w" => Some(Interval::Week),
            _ => None,
        }
    }
}

impl std::fmt::Display for Interval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLCV bar for an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    /// Instrument symbol.
    pub symbol: String,
    /// Sampling interval.
    pub interval: Interval,
    /// Bar close timestamp.
    pub timestamp: DateTime<Utc>,
    /// Open price.
    pub open: Decimal,
    /// High price.
    pub high: Decimal,
    /// Low price.
    pub low: Decimal,
    /// Close price.
    pub close: Decimal,
    /// Traded volume.
    pub volume: Decimal,
}

impl PriceBar {
    /// Create a bar where open/high/low all equal the close (useful in tests
    /// and for sources that only publish closes).
    pub fn flat(
        symbol: &str,
        interval: Interval,
        timestamp: DateTime<Utc>,
        close: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval,
            timestamp,
            open: close,
            high: close,
            low: close,
            close,
            volume,
        }
    }

    /// Check that a series is ascending by timestamp.
    pub fn is_ascending(bars: &[PriceBar]) -> bool {
        bars.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_interval_roundtrip() {
        for interval in [
            Interval::Minute15,
            Interval::Hour,
            Interval::Day,
            Interval::Week,
        ] {
            assert_eq!(Interval::parse(interval.as_str()), Some(interval));
        }
        assert_eq!(Interval::parse("3d"), None);
    }

    #[test]
    fn test_ascending_check() {
        let t0 = Utc::now();
        let bars: Vec<PriceBar> = (0..3)
            .map(|i| {
                PriceBar::flat(
                    "AAPL",
                    Interval::Day,
                    t0 + Duration::days(i),
                    Decimal::new(100, 0),
                    Decimal::new(1000, 0),
                )
            })
            .collect();
        assert!(PriceBar::is_ascending(&bars));

        let mut reversed = bars.clone();
        reversed.reverse();
        assert!(!PriceBar::is_ascending(&reversed));
    }
}
