//! Parallel backtest engine: fans a run's universe out across bounded
//! concurrent instrument simulations and aggregates the results.

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Semaphore;
use tracing::{info, warn};
use uuid::Uuid;
use walkforward_core::{
    BacktestRun, InstrumentPerformance, Interval, PerformanceStore, PriceSource, RunMetrics,
    RunStore, TradeSummary,
};

use crate::costs::CostModel;
use crate::ledger::PortfolioLedger;
use crate::performance::PerformanceSummary;
use crate::simulator::{InstrumentSimulator, SimulatorConfig};
use crate::strategy::create_strategy;

/// Executes backtest runs end to end: load, simulate, persist, finalize.
///
/// One engine is shared by all runs; each `execute` call owns its run's
/// ledger and task set and leaves the run in a terminal status.
pub struct BacktestEngine {
    price_source: Arc<dyn PriceSource>,
    run_store: Arc<dyn RunStore>,
    performance_store: Arc<dyn PerformanceStore>,
    cost_model: CostModel,
}

impl BacktestEngine {
    pub fn new(
        price_source: Arc<dyn PriceSource>,
        run_store: Arc<dyn RunStore>,
        performance_store: Arc<dyn PerformanceStore>,
        cost_model: CostModel,
    ) -> Self {
        Self {
            price_source,
            run_store,
            performance_store,
            cost_model,
        }
    }

    /// Executes a queued run to a terminal status.
    ///
    /// Simulation problems on a single instrument (no price history, too few
    /// bars) are logged and skipped; store failures and unknown strategies
    /// fail the whole run.
    pub async fn execute(&self, run_id: Uuid) -> Result<RunMetrics> {
        let run = self
            .run_store
            .get_run(run_id)
            .await?
            .ok_or_else(|| anyhow!("run {} not found", run_id))?;

        self.run_store.set_running(run_id).await?;
        info!(
            run_id = %run_id,
            strategy = %run.config.strategy,
            symbols = run.config.symbols.len(),
            intervals = run.config.intervals.len(),
            "starting backtest run"
        );

        match self.execute_inner(&run).await {
            Ok(metrics) => {
                self.run_store.complete_run(run_id, &metrics).await?;
                info!(
                    run_id = %run_id,
                    total_trades = metrics.total_trades,
                    total_pnl = %metrics.total_pnl,
                    "backtest run completed"
                );
                Ok(metrics)
            }
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "backtest run failed");
                self.run_store.fail_run(run_id, &e.to_string()).await?;
                Err(e)
            }
        }
    }

    async fn execute_inner(&self, run: &BacktestRun) -> Result<RunMetrics> {
        let config = &run.config;
        // Fail fast on a strategy the factory cannot build
        create_strategy(&config.strategy)?;

        let ledger = Arc::new(PortfolioLedger::new(config.initial_capital));
        let semaphore = Arc::new(Semaphore::new(config.max_parallelism.max(1)));
        let simulator_config = SimulatorConfig {
            initial_capital: config.initial_capital,
            max_alloc_fraction: config.max_alloc_fraction,
        };

        let mut handles = Vec::new();
        for symbol in &config.symbols {
            for interval in &config.intervals {
                handles.push(self.spawn_instrument(
                    run,
                    symbol.clone(),
                    *interval,
                    Arc::clone(&ledger),
                    Arc::clone(&semaphore),
                    simulator_config,
                ));
            }
        }

        let mut trades: Vec<TradeSummary> = Vec::new();
        for handle in handles {
            let instrument_trades = handle.await.context("instrument task panicked")??;
            trades.extend(instrument_trades);
        }
        trades.sort_by_key(|t| t.exit_date);

        self.run_store.save_trades(run.id, &trades).await?;

        let summary = PerformanceSummary::from_trades(&trades, config.initial_capital);
        Ok(RunMetrics {
            total_trades: summary.total_trades,
            total_pnl: summary.total_pnl,
            total_return: summary.total_return,
            max_drawdown: summary.max_drawdown,
            win_rate: summary.win_rate,
            sharpe_ratio: summary.sharpe_ratio,
        })
    }

    fn spawn_instrument(
        &self,
        run: &BacktestRun,
        symbol: String,
        interval: Interval,
        ledger: Arc<PortfolioLedger>,
        semaphore: Arc<Semaphore>,
        simulator_config: SimulatorConfig,
    ) -> tokio::task::JoinHandle<Result<Vec<TradeSummary>>> {
        let price_source = Arc::clone(&self.price_source);
        let performance_store = Arc::clone(&self.performance_store);
        let cost_model = self.cost_model.clone();
        let strategy_name = run.config.strategy.clone();
        let start = run.config.start_date;
        let end = run.config.end_date;
        let run_id = run.id;
        let initial_capital = run.config.initial_capital;

        tokio::spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .context("simulation semaphore closed")?;

            let bars = price_source.bars(&symbol, interval, start, end).await?;
            if bars.is_empty() {
                warn!(symbol, interval = %interval, "no price history, skipping instrument");
                return Ok(Vec::new());
            }

            let strategy = create_strategy(&strategy_name)?;
            let simulator =
                InstrumentSimulator::new(strategy.as_ref(), &ledger, &cost_model, simulator_config);
            let trades = match simulator.run(&bars) {
                Ok(trades) => trades,
                Err(e) => {
                    warn!(symbol, interval = %interval, error = %e, "simulation failed, skipping instrument");
                    return Ok(Vec::new());
                }
            };

            let summary = PerformanceSummary::from_trades(&trades, initial_capital);
            performance_store
                .save_performance(&InstrumentPerformance {
                    run_id,
                    symbol: symbol.clone(),
                    interval,
                    sharpe_ratio: summary.sharpe_ratio,
                    max_drawdown: summary.max_drawdown,
                    trade_count: summary.total_trades,
                    total_pnl: summary.total_pnl,
                })
                .await?;

            info!(
                symbol,
                interval = %interval,
                trades = trades.len(),
                pnl = %summary.total_pnl,
                "instrument simulation complete"
            );
            Ok(trades)
        })
    }
}
