//! Backtesting engine for the walk-forward validation system.
//!
//! Simulates trading strategies bar by bar over historical price data, with
//! every instrument in a run drawing on one shared capital pool.
//!
//! # Features
//!
//! - **Parallel simulation**: each (symbol, interval) pair runs as its own
//!   task under a concurrency bound
//! - **Shared ledger**: one cash pool per run; entries are sized against
//!   remaining cash and capped per position
//! - **Transaction costs**: spread, per-share commission with a floor, and
//!   slippage on every fill
//! - **Performance metrics**: equity curve, max drawdown, win rate, Kelly
//!   sizing, annualized Sharpe
//!
//! # Example
//!
//! ```rust,ignore
//! use backtester::{BacktestEngine, CostModel};
//!
//! let engine = BacktestEngine::new(price_source, run_store, performance_store, CostModel::free());
//! let metrics = engine.execute(run_id).await?;
//! println!("{} trades, net {}", metrics.total_trades, metrics.total_pnl);
//! ```

pub mod costs;
pub mod engine;
pub mod ledger;
pub mod performance;
pub mod simulator;
pub mod strategy;

pub use costs::{CostModel, FillSide};
pub use engine::BacktestEngine;
pub use ledger::{LedgerError, PortfolioLedger};
pub use performance::{EquityPoint, PerformanceSummary};
pub use simulator::{InstrumentSimulator, SimulatorConfig};
pub use strategy::{
    create_strategy, MeanReversionStrategy, MomentumStrategy, Signal, SignalContext, Strategy,
};
