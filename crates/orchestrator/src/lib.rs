//! Walk-forward orchestration: the durable state machine that turns a
//! session into a sequence of cycles, each fanning out an active and a
//! shadow backtest and fanning back in to dispatch re-optimization.
//!
//! # Components
//!
//! - [`sleeve`]: quality filter and top-N Sharpe ranking into active/shadow
//!   sleeves
//! - [`cycle`]: the fan-in barrier; exactly one optimization dispatch per
//!   cycle no matter how completion signals arrive
//! - [`orchestrator`]: the session loop; resume-safe via persisted cycle
//!   state
//! - [`memory`] / [`postgres`]: store backends

pub mod cycle;
pub mod memory;
pub mod orchestrator;
pub mod postgres;
pub mod sleeve;
pub mod window;

pub use cycle::{CycleCoordinator, DispatchDecision};
pub use orchestrator::WalkForwardOrchestrator;
pub use sleeve::{
    select_initial, select_sleeves, CandidateScore, QualityThresholds, SleevePartition,
};
