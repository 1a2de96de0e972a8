//! Configuration management for the walk-forward validation system.

use crate::{Error, Result};
use serde::Deserialize;
use std::env;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub simulation: SimulationConfig,
    pub walkforward: WalkForwardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Defaults applied to newly dispatched backtest runs.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulationConfig {
    /// Default initial capital for a run.
    pub initial_capital: f64,
    /// Round-trip spread in basis points.
    pub spread_bps: f64,
    /// Commission per share.
    pub commission_per_share: f64,
    /// Minimum commission per fill.
    pub min_commission: f64,
    /// Slippage in basis points.
    pub slippage_bps: f64,
    /// Maximum concurrent instrument simulations per run.
    pub max_parallelism: usize,
    /// Maximum fraction of capital allocated to a single position.
    pub max_alloc_fraction: f64,
}

/// Walk-forward cycle clock settings.
#[derive(Debug, Clone, Deserialize)]
pub struct WalkForwardConfig {
    /// In-sample optimization window length in years.
    pub optimization_window_years: u32,
    /// Out-of-sample trading window length in years.
    pub trading_window_years: u32,
    /// Number of instruments in the active sleeve.
    pub active_sleeve_size: usize,
    /// Minimum in-sample Sharpe ratio for sleeve qualification.
    pub min_sharpe: f64,
    /// Maximum in-sample drawdown (fraction) for sleeve qualification.
    pub max_drawdown: f64,
    /// Minimum in-sample trade count for sleeve qualification.
    pub min_trades: usize,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| Error::Config {
                    message: "DATABASE_URL environment variable not set".to_string(),
                })?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 5),
            },
            simulation: SimulationConfig {
                initial_capital: env_or("SIM_INITIAL_CAPITAL", 100_000.0),
                spread_bps: env_or("SIM_SPREAD_BPS", 2.0),
                commission_per_share: env_or("SIM_COMMISSION_PER_SHARE", 0.005),
                min_commission: env_or("SIM_MIN_COMMISSION", 1.0),
                slippage_bps: env_or("SIM_SLIPPAGE_BPS", 1.0),
                max_parallelism: env_or("SIM_MAX_PARALLELISM", 8),
                max_alloc_fraction: env_or("SIM_MAX_ALLOC_FRACTION", 0.1),
            },
            walkforward: WalkForwardConfig {
                optimization_window_years: env_or("WF_OPTIMIZATION_WINDOW_YEARS", 2),
                trading_window_years: env_or("WF_TRADING_WINDOW_YEARS", 1),
                active_sleeve_size: env_or("WF_ACTIVE_SLEEVE_SIZE", 10),
                min_sharpe: env_or("WF_MIN_SHARPE", 0.5),
                max_drawdown: env_or("WF_MAX_DRAWDOWN", 0.3),
                min_trades: env_or("WF_MIN_TRADES", 5),
            },
        })
    }

    /// Load configuration for testing (with defaults).
    pub fn test_config() -> Self {
        Self {
            database: DatabaseConfig {
                url: "postgres://localhost/walkforward_test".to_string(),
                max_connections: 2,
            },
            simulation: SimulationConfig {
                initial_capital: 100_000.0,
                spread_bps: 0.0,
                commission_per_share: 0.0,
                min_commission: 0.0,
                slippage_bps: 0.0,
                max_parallelism: 2,
                max_alloc_fraction: 0.1,
            },
            walkforward: WalkForwardConfig {
                optimization_window_years: 2,
                trading_window_years: 1,
                active_sleeve_size: 3,
                min_sharpe: 0.0,
                max_drawdown: 1.0,
                min_trades: 0,
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::test_config();
        assert_eq!(config.walkforward.trading_window_years, 1);
        assert_eq!(config.simulation.max_parallelism, 2);
    }

    #[test]
    fn test_env_or_parses() {
        std::env::set_var("WF_TEST_ENV_OR", "42");
        let value: u32 = env_or("WF_TEST_ENV_OR", 7);
        assert_eq!(value, 42);

        let missing: u32 = env_or("WF_TEST_ENV_OR_MISSING", 7);
        assert_eq!(missing, 7);
    }
}
