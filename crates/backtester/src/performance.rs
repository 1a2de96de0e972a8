//! Performance metrics derived from closed trades.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use walkforward_core::TradeSummary;

/// One point on the realized equity curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
}

/// Aggregate performance for a set of closed trades.
///
/// Built purely from trade records; the calculator never touches the ledger
/// or price history, so the same code scores a single instrument's trades
/// and a whole run's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceSummary {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    /// Sum of net P&L across all trades.
    pub total_pnl: Decimal,
    /// Total net P&L over initial capital.
    pub total_return: f64,
    /// Largest peak-to-trough equity drop as a fraction of the peak.
    pub max_drawdown: f64,
    /// Winners over total, 0.0 with no trades.
    pub win_rate: f64,
    /// Mean net P&L of winning trades.
    pub avg_win: Decimal,
    /// Mean net P&L of losing trades (negative).
    pub avg_loss: Decimal,
    /// Full Kelly fraction from win rate and payoff ratio, clamped to >= 0.
    pub kelly_fraction: f64,
    /// Half Kelly, the sizing hint actually surfaced to callers.
    pub half_kelly: f64,
    /// Annualized Sharpe ratio over per-trade equity returns.
    pub sharpe_ratio: f64,
    /// Realized equity sampled at each trade exit, starting from initial
    /// capital.
    pub equity_curve: Vec<EquityPoint>,
}

impl PerformanceSummary {
    /// Scores `trades` against `initial_capital`.
    ///
    /// Trades must be in exit-date order; the equity curve walks them in the
    /// order given. An empty slice yields zeroed metrics and a single curve
    /// point at initial capital.
    pub fn from_trades(trades: &[TradeSummary], initial_capital: Decimal) -> Self {
        if trades.is_empty() {
            return Self {
                total_trades: 0,
                winning_trades: 0,
                losing_trades: 0,
                total_pnl: Decimal::ZERO,
                total_return: 0.0,
                max_drawdown: 0.0,
                win_rate: 0.0,
                avg_win: Decimal::ZERO,
                avg_loss: Decimal::ZERO,
                kelly_fraction: 0.0,
                half_kelly: 0.0,
                sharpe_ratio: 0.0,
                equity_curve: vec![EquityPoint {
                    timestamp: Utc::now(),
                    equity: initial_capital,
                }],
            };
        }

        let mut equity_curve = Vec::with_capacity(trades.len() + 1);
        let mut equity = initial_capital;
        equity_curve.push(EquityPoint {
            timestamp: trades[0].entry_date,
            equity,
        });
        for trade in trades {
            equity += trade.net_pnl;
            equity_curve.push(EquityPoint {
                timestamp: trade.exit_date,
                equity,
            });
        }

        let total_pnl: Decimal = trades.iter().map(|t| t.net_pnl).sum();
        let winners: Vec<&TradeSummary> = trades.iter().filter(|t| t.is_winner()).collect();
        let losers: Vec<&TradeSummary> = trades.iter().filter(|t| !t.is_winner()).collect();

        let win_rate = winners.len() as f64 / trades.len() as f64;
        let avg_win = mean_pnl(&winners);
        let avg_loss = mean_pnl(&losers);

        let kelly_fraction = kelly(win_rate, avg_win, avg_loss);

        Self {
            total_trades: trades.len(),
            winning_trades: winners.len(),
            losing_trades: losers.len(),
            total_pnl,
            total_return: decimal_ratio(total_pnl, initial_capital),
            max_drawdown: max_drawdown(&equity_curve),
            win_rate,
            avg_win,
            avg_loss,
            kelly_fraction,
            half_kelly: kelly_fraction / 2.0,
            sharpe_ratio: sharpe_ratio(&equity_curve),
            equity_curve,
        }
    }
}

fn mean_pnl(trades: &[&TradeSummary]) -> Decimal {
    if trades.is_empty() {
        return Decimal::ZERO;
    }
    let total: Decimal = trades.iter().map(|t| t.net_pnl).sum();
    total / Decimal::new(trades.len() as i64, 0)
}

fn decimal_ratio(numerator: Decimal, denominator: Decimal) -> f64 {
    if denominator.is_zero() {
        return 0.0;
    }
    (numerator / denominator).to_f64().unwrap_or(0.0)
}

/// Kelly criterion `W - (1 - W) / R` where `R` is the win/loss payoff ratio.
///
/// No losing trades degenerates to the win rate itself (R -> infinity); no
/// winning trades clamps to zero.
fn kelly(win_rate: f64, avg_win: Decimal, avg_loss: Decimal) -> f64 {
    if win_rate <= 0.0 {
        return 0.0;
    }
    if avg_loss.is_zero() {
        return win_rate;
    }
    let payoff = decimal_ratio(avg_win, avg_loss.abs());
    if payoff <= 0.0 {
        return 0.0;
    }
    (win_rate - (1.0 - win_rate) / payoff).max(0.0)
}

/// Largest peak-to-trough decline as a fraction of the running peak.
/// Always within [0, 1] for non-negative equity.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = Decimal::MIN;
    let mut worst = 0.0_f64;
    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        if peak > Decimal::ZERO {
            let drawdown = decimal_ratio(peak - point.equity, peak);
            if drawdown > worst {
                worst = drawdown;
            }
        }
    }
    worst
}

/// Annualized Sharpe over successive equity-curve returns, assuming roughly
/// daily trade exits. Zero when fewer than two returns or zero variance.
fn sharpe_ratio(curve: &[EquityPoint]) -> f64 {
    let returns: Vec<f64> = curve
        .windows(2)
        .filter(|w| !w[0].equity.is_zero())
        .map(|w| decimal_ratio(w[1].equity - w[0].equity, w[0].equity))
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance =
        returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (returns.len() - 1) as f64;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    mean / std_dev * 252.0_f64.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use uuid::Uuid;
    use walkforward_core::{Direction, TradeCosts};

    fn trade(day: u32, net_pnl: i64) -> TradeSummary {
        let exit_date = Utc.with_ymd_and_hms(2021, 1, day, 16, 0, 0).unwrap();
        TradeSummary {
            id: Uuid::new_v4(),
            symbol: "AAPL".to_string(),
            direction: Direction::Long,
            quantity: Decimal::new(10, 0),
            entry_date: exit_date - chrono::Duration::days(1),
            exit_date,
            entry_price: Decimal::new(100, 0),
            exit_price: Decimal::new(100, 0) + Decimal::new(net_pnl, 0) / Decimal::new(10, 0),
            gross_pnl: Decimal::new(net_pnl, 0),
            net_pnl: Decimal::new(net_pnl, 0),
            entry_costs: TradeCosts::default(),
            exit_costs: TradeCosts::default(),
            holding_bars: 1,
            max_favorable: Decimal::ZERO,
            max_adverse: Decimal::ZERO,
            entry_reason: "Test Entry".to_string(),
            exit_reason: "Test Exit".to_string(),
        }
    }

    #[test]
    fn test_empty_trades_yield_flat_summary() {
        let summary = PerformanceSummary::from_trades(&[], Decimal::new(100_000, 0));
        assert_eq!(summary.total_trades, 0);
        assert_eq!(summary.total_pnl, Decimal::ZERO);
        assert_eq!(summary.win_rate, 0.0);
        assert_eq!(summary.max_drawdown, 0.0);
        assert_eq!(summary.sharpe_ratio, 0.0);
        assert_eq!(summary.kelly_fraction, 0.0);
        assert_eq!(summary.equity_curve.len(), 1);
        assert_eq!(summary.equity_curve[0].equity, Decimal::new(100_000, 0));
    }

    #[test]
    fn test_pnl_conservation() {
        let trades = vec![trade(4, 500), trade(5, -200), trade(6, 300), trade(7, -50)];
        let initial = Decimal::new(100_000, 0);
        let summary = PerformanceSummary::from_trades(&trades, initial);

        assert_eq!(summary.total_pnl, Decimal::new(550, 0));
        let final_equity = summary.equity_curve.last().unwrap().equity;
        assert_eq!(final_equity - initial, summary.total_pnl);
    }

    #[test]
    fn test_win_rate_and_averages() {
        let trades = vec![trade(4, 400), trade(5, -100), trade(6, 200), trade(7, -300)];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));

        assert_eq!(summary.winning_trades, 2);
        assert_eq!(summary.losing_trades, 2);
        assert_eq!(summary.win_rate, 0.5);
        assert_eq!(summary.avg_win, Decimal::new(300, 0));
        assert_eq!(summary.avg_loss, Decimal::new(-200, 0));
    }

    #[test]
    fn test_max_drawdown_bounds() {
        // Peak at 100_500, trough at 99_800: drawdown = 700 / 100_500
        let trades = vec![trade(4, 500), trade(5, -400), trade(6, -300), trade(7, 600)];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));

        let expected = 700.0 / 100_500.0;
        assert!((summary.max_drawdown - expected).abs() < 1e-12);
        assert!(summary.max_drawdown >= 0.0 && summary.max_drawdown <= 1.0);
    }

    #[test]
    fn test_monotonic_equity_has_zero_drawdown() {
        let trades = vec![trade(4, 100), trade(5, 200), trade(6, 50)];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));
        assert_eq!(summary.max_drawdown, 0.0);
    }

    #[test]
    fn test_kelly_formula() {
        // W = 0.5, R = 300/200 = 1.5 -> kelly = 0.5 - 0.5/1.5
        let trades = vec![trade(4, 400), trade(5, -100), trade(6, 200), trade(7, -300)];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));

        let expected = 0.5 - 0.5 / 1.5;
        assert!((summary.kelly_fraction - expected).abs() < 1e-12);
        assert!((summary.half_kelly - expected / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_kelly_clamps_at_zero() {
        // Losing system: W = 0.25, R = 100/200 = 0.5 -> raw kelly negative
        let trades = vec![
            trade(4, 100),
            trade(5, -200),
            trade(6, -200),
            trade(7, -200),
        ];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));
        assert_eq!(summary.kelly_fraction, 0.0);
    }

    #[test]
    fn test_kelly_with_no_losses_is_win_rate() {
        let trades = vec![trade(4, 100), trade(5, 200)];
        let summary = PerformanceSummary::from_trades(&trades, Decimal::new(100_000, 0));
        assert_eq!(summary.kelly_fraction, 1.0);
    }

    #[test]
    fn test_sharpe_sign_tracks_profitability() {
        let winners = vec![trade(4, 300), trade(5, 250), trade(6, 350), trade(7, 280)];
        let summary = PerformanceSummary::from_trades(&winners, Decimal::new(100_000, 0));
        assert!(summary.sharpe_ratio > 0.0);

        let losers = vec![trade(4, -300), trade(5, -250), trade(6, -350), trade(7, -280)];
        let summary = PerformanceSummary::from_trades(&losers, Decimal::new(100_000, 0));
        assert!(summary.sharpe_ratio < 0.0);
    }
}
