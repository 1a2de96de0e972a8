//! Walk-Forward Runner
//!
//! Runs a complete walk-forward validation session over synthetic price
//! data with in-memory stores. A demonstration harness for the orchestrator
//! and backtest engine; production deployments wire the Postgres stores in
//! instead.

mod synthetic;

use std::sync::Arc;

use anyhow::Result;
use backtester::{BacktestEngine, CostModel};
use chrono::NaiveDate;
use clap::Parser;
use orchestrator::cycle::CycleCoordinator;
use orchestrator::memory::{
    CountingDispatcher, MemoryCycleStore, MemoryPerformanceStore, MemoryPriceSource,
    MemoryRunStore, MemorySessionStore, MemorySleeveStore,
};
use orchestrator::WalkForwardOrchestrator;
use rust_decimal::Decimal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use walkforward_core::{Config, Interval, OptimizationDispatcher, Session, SessionStore};

#[derive(Parser, Debug)]
#[command(name = "wf-runner", about = "Walk-forward validation over synthetic data")]
struct Args {
    /// Comma-separated instrument universe
    #[arg(long, default_value = "AAPL,MSFT,NVDA,AMZN,GOOG,META,TSLA,AMD")]
    symbols: String,

    /// Strategy to validate
    #[arg(long, default_value = "mean_reversion")]
    strategy: String,

    /// First out-of-sample year
    #[arg(long, default_value_t = 2018)]
    start_year: i32,

    /// Number of out-of-sample years to walk
    #[arg(long, default_value_t = 3)]
    years: u32,

    /// Initial capital
    #[arg(long, default_value_t = 100_000)]
    capital: i64,

    /// Seed for the synthetic price walk
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wf_runner=info,orchestrator=info,backtester=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let symbols: Vec<String> = args
        .symbols
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    // Memory-backed demo run; the database section of the config is unused
    let config = Config::from_env().unwrap_or_else(|_| Config::test_config());

    let start = NaiveDate::from_ymd_opt(args.start_year, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid start year {}", args.start_year))?;
    let end = NaiveDate::from_ymd_opt(args.start_year + args.years as i32, 1, 1)
        .ok_or_else(|| anyhow::anyhow!("invalid horizon"))?;
    // History must reach back through the first in-sample window
    let history_start = NaiveDate::from_ymd_opt(
        args.start_year - config.walkforward.optimization_window_years as i32 - 1,
        1,
        1,
    )
    .ok_or_else(|| anyhow::anyhow!("invalid history start"))?;

    info!(
        universe = symbols.len(),
        strategy = %args.strategy,
        start = %start,
        end = %end,
        seed = args.seed,
        "starting walk-forward runner"
    );

    let session_store = Arc::new(MemorySessionStore::default());
    let cycle_store = Arc::new(MemoryCycleStore::default());
    let sleeve_store = Arc::new(MemorySleeveStore::default());
    let run_store = Arc::new(MemoryRunStore::default());
    let performance_store = Arc::new(MemoryPerformanceStore::default());
    let price_source = Arc::new(MemoryPriceSource::default());
    let dispatcher = Arc::new(CountingDispatcher::default());

    for symbol in &symbols {
        let bars = synthetic::random_walk_bars(symbol, history_start, end, args.seed);
        info!(symbol, bars = bars.len(), "generated synthetic history");
        price_source.insert_series(symbol, Interval::Day, bars);
    }

    let engine = Arc::new(BacktestEngine::new(
        price_source,
        Arc::clone(&run_store) as _,
        Arc::clone(&performance_store) as _,
        CostModel::from_config(&config.simulation),
    ));
    let coordinator = Arc::new(CycleCoordinator::new(
        Arc::clone(&cycle_store) as _,
        Arc::clone(&session_store) as _,
        Arc::clone(&dispatcher) as Arc<dyn OptimizationDispatcher>,
    ));
    let orchestrator = WalkForwardOrchestrator::new(
        Arc::clone(&session_store) as _,
        cycle_store,
        Arc::clone(&sleeve_store) as _,
        Arc::clone(&run_store) as _,
        performance_store,
        engine,
        coordinator,
        &config,
    );

    let session = Session::new(
        &args.strategy,
        symbols,
        start,
        end,
        Decimal::new(args.capital, 0),
        config.walkforward.optimization_window_years,
        config.walkforward.trading_window_years,
    );
    session_store.create_session(&session).await?;

    let finished = orchestrator.run_session(session.id).await?;

    for run in run_store.runs_for_session(session.id) {
        if let Some(metrics) = run.metrics {
            info!(
                run_id = %run.id,
                symbols = run.config.symbols.len(),
                trades = metrics.total_trades,
                pnl = %metrics.total_pnl,
                max_drawdown = format!("{:.2}%", metrics.max_drawdown * 100.0),
                win_rate = format!("{:.1}%", metrics.win_rate * 100.0),
                sharpe = format!("{:.2}", metrics.sharpe_ratio),
                "run summary"
            );
        }
    }
    for request in dispatcher.requests() {
        info!(
            mode = ?request.mode,
            window = %format!("{}..{}", request.window_start, request.window_end),
            "optimization dispatched during run"
        );
    }
    info!(
        status = finished.status.as_str(),
        initial_capital = %finished.initial_capital,
        final_capital = %finished.current_capital,
        net = %(finished.current_capital - finished.initial_capital),
        cycles_dispatched = dispatcher.count(),
        "walk-forward session finished"
    );
    Ok(())
}
