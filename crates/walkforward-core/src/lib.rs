//! Shared domain types, configuration, and store contracts for the
//! walk-forward validation system.
//!
//! This crate carries no business logic of its own: the simulation engine
//! lives in `backtester`, the session state machine in `orchestrator`. What
//! lives here is everything both of them speak:
//!
//! - Domain model: sessions, cycle trackers, sleeve entries, backtest runs,
//!   price bars, positions, and trade summaries
//! - Collaborator contracts: stores, price source, optimization dispatcher
//! - Configuration loaded from the environment
//! - The workspace error type

pub mod config;
pub mod error;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use store::*;
pub use types::*;
