//! Domain types for walk-forward validation.

pub mod bar;
pub mod cycle;
pub mod position;
pub mod run;
pub mod session;
pub mod sleeve;
pub mod trade;

pub use bar::{Interval, PriceBar};
pub use cycle::{BatchKind, CycleTracker};
pub use position::{Direction, Position};
pub use run::{BacktestRun, RunConfig, RunMetrics, RunStatus};
pub use session::{Session, SessionStatus};
pub use sleeve::{InstrumentPerformance, SleeveEntry};
pub use trade::{TradeCosts, TradeSummary};
