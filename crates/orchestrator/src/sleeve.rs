//! Sleeve selection: quality filter plus top-N ranking.

use serde::{Deserialize, Serialize};
use tracing::info;
use walkforward_core::config::WalkForwardConfig;
use walkforward_core::Interval;

/// Minimum in-sample quality an instrument must show to earn capital.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityThresholds {
    pub min_sharpe: f64,
    pub max_drawdown: f64,
    pub min_trades: usize,
}

impl QualityThresholds {
    pub fn from_config(config: &WalkForwardConfig) -> Self {
        Self {
            min_sharpe: config.min_sharpe,
            max_drawdown: config.max_drawdown,
            min_trades: config.min_trades,
        }
    }
}

/// One instrument's in-sample scorecard going into selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub symbol: String,
    pub interval: Interval,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub trades: usize,
}

impl CandidateScore {
    /// A candidate with no recorded history, used for the first cycle.
    pub fn unscored(symbol: &str, interval: Interval) -> Self {
        Self {
            symbol: symbol.to_string(),
            interval,
            sharpe: 0.0,
            max_drawdown: 0.0,
            trades: 0,
        }
    }

    fn qualifies(&self, thresholds: &QualityThresholds) -> bool {
        self.sharpe >= thresholds.min_sharpe
            && self.max_drawdown <= thresholds.max_drawdown
            && self.trades >= thresholds.min_trades
    }
}

/// Disjoint split of the universe for one trading period.
#[derive(Debug, Clone)]
pub struct SleevePartition {
    /// Capital-allocated instruments, at most `active_size`.
    pub active: Vec<CandidateScore>,
    /// Everything else in the universe, tracked without capital.
    pub shadow: Vec<CandidateScore>,
}

/// Partitions the universe into active and shadow sleeves.
///
/// Qualifiers are ranked by Sharpe descending and the top `active_size`
/// become the active sleeve. The shadow sleeve is the entire remainder,
/// non-qualifying names included: they keep trading on paper so a recovery
/// shows up in the next selection. Zero qualifiers is a valid outcome with
/// an empty active sleeve.
pub fn select_sleeves(
    candidates: Vec<CandidateScore>,
    thresholds: &QualityThresholds,
    active_size: usize,
) -> SleevePartition {
    let universe = candidates.len();
    let mut qualified: Vec<CandidateScore> = candidates
        .iter()
        .filter(|c| c.qualifies(thresholds))
        .cloned()
        .collect();
    qualified.sort_by(|a, b| b.sharpe.total_cmp(&a.sharpe));
    qualified.truncate(active_size);

    let active = qualified;
    let shadow: Vec<CandidateScore> = candidates
        .into_iter()
        .filter(|c| !active.iter().any(|a| a.symbol == c.symbol))
        .collect();

    info!(
        universe,
        active = active.len(),
        shadow = shadow.len(),
        "selected sleeves"
    );
    SleevePartition { active, shadow }
}

/// First-cycle partition with no performance history: the first
/// `active_size` symbols in configured order take the active sleeve.
pub fn select_initial(universe: &[String], interval: Interval, active_size: usize) -> SleevePartition {
    let active: Vec<CandidateScore> = universe
        .iter()
        .take(active_size)
        .map(|s| CandidateScore::unscored(s, interval))
        .collect();
    let shadow: Vec<CandidateScore> = universe
        .iter()
        .skip(active_size)
        .map(|s| CandidateScore::unscored(s, interval))
        .collect();
    SleevePartition { active, shadow }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> QualityThresholds {
        QualityThresholds {
            min_sharpe: 0.5,
            max_drawdown: 0.3,
            min_trades: 5,
        }
    }

    fn candidate(symbol: &str, sharpe: f64, max_drawdown: f64, trades: usize) -> CandidateScore {
        CandidateScore {
            symbol: symbol.to_string(),
            interval: Interval::Day,
            sharpe,
            max_drawdown,
            trades,
        }
    }

    #[test]
    fn test_partition_is_disjoint_and_covers_universe() {
        let candidates = vec![
            candidate("A", 2.0, 0.1, 20),
            candidate("B", 1.5, 0.1, 20),
            candidate("C", 1.0, 0.1, 20),
            candidate("D", 0.8, 0.1, 20),
            candidate("E", 0.1, 0.1, 20),
        ];
        let partition = select_sleeves(candidates, &thresholds(), 2);

        assert_eq!(partition.active.len(), 2);
        assert_eq!(partition.shadow.len(), 3);
        for active in &partition.active {
            assert!(!partition.shadow.iter().any(|s| s.symbol == active.symbol));
        }
    }

    #[test]
    fn test_active_ranked_by_sharpe_descending() {
        let candidates = vec![
            candidate("LOW", 0.9, 0.1, 20),
            candidate("HIGH", 2.5, 0.1, 20),
            candidate("MID", 1.4, 0.1, 20),
        ];
        let partition = select_sleeves(candidates, &thresholds(), 2);

        assert_eq!(partition.active[0].symbol, "HIGH");
        assert_eq!(partition.active[1].symbol, "MID");
        assert_eq!(partition.shadow[0].symbol, "LOW");
    }

    #[test]
    fn test_disqualified_names_stay_in_shadow() {
        let candidates = vec![
            candidate("GOOD", 1.2, 0.1, 20),
            candidate("DEEP_DD", 2.0, 0.5, 20),
            candidate("THIN", 2.0, 0.1, 2),
            candidate("FLAT", 0.2, 0.1, 20),
        ];
        let partition = select_sleeves(candidates, &thresholds(), 3);

        assert_eq!(partition.active.len(), 1);
        assert_eq!(partition.active[0].symbol, "GOOD");
        assert_eq!(partition.shadow.len(), 3);
    }

    #[test]
    fn test_zero_qualifiers_yields_empty_active() {
        let candidates = vec![candidate("A", 0.1, 0.9, 1), candidate("B", -1.0, 0.2, 0)];
        let partition = select_sleeves(candidates, &thresholds(), 5);

        assert!(partition.active.is_empty());
        assert_eq!(partition.shadow.len(), 2);
    }

    #[test]
    fn test_initial_partition_uses_configured_order() {
        let universe: Vec<String> = ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect();
        let partition = select_initial(&universe, Interval::Day, 2);

        assert_eq!(partition.active.len(), 2);
        assert_eq!(partition.active[0].symbol, "A");
        assert_eq!(partition.active[1].symbol, "B");
        assert_eq!(partition.shadow.len(), 2);
    }

    #[test]
    fn test_active_size_larger_than_universe() {
        let candidates = vec![candidate("A", 1.0, 0.1, 20)];
        let partition = select_sleeves(candidates, &thresholds(), 10);
        assert_eq!(partition.active.len(), 1);
        assert!(partition.shadow.is_empty());
    }
}
