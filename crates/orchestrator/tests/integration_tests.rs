//! End-to-end walk-forward sessions over synthetic price data and the
//! in-memory stores.

use std::sync::Arc;

use backtester::{BacktestEngine, CostModel};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use orchestrator::cycle::CycleCoordinator;
use orchestrator::memory::{
    CountingDispatcher, MemoryCycleStore, MemoryPerformanceStore, MemoryPriceSource,
    MemoryRunStore, MemorySessionStore, MemorySleeveStore,
};
use orchestrator::WalkForwardOrchestrator;
use rust_decimal::Decimal;
use walkforward_core::{
    Config, Interval, OptimizationDispatcher, PriceBar, Session, SessionStatus, SessionStore,
    SleeveStore,
};

struct World {
    session_store: Arc<MemorySessionStore>,
    sleeve_store: Arc<MemorySleeveStore>,
    run_store: Arc<MemoryRunStore>,
    dispatcher: Arc<CountingDispatcher>,
    orchestrator: WalkForwardOrchestrator,
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Daily closes cycling through a flat stretch, a sharp dip, and a recovery,
/// so a mean-reversion strategy keeps finding profitable entries.
fn dip_cycle_bars(symbol: &str, start: NaiveDate, end: NaiveDate) -> Vec<PriceBar> {
    let pattern: Vec<i64> = {
        let mut p = vec![100_i64; 30];
        p.push(85);
        p.push(100);
        p
    };
    let mut bars = Vec::new();
    let mut day = start;
    let mut i = 0usize;
    while day <= end {
        let close = Decimal::new(pattern[i % pattern.len()], 0);
        let timestamp = Utc
            .from_utc_datetime(&day.and_hms_opt(16, 0, 0).unwrap());
        bars.push(PriceBar {
            symbol: symbol.to_string(),
            interval: Interval::Day,
            timestamp,
            open: close,
            high: close + Decimal::ONE,
            low: close - Decimal::ONE,
            close,
            volume: Decimal::new(1_000_000, 0),
        });
        day += Duration::days(1);
        i += 1;
    }
    bars
}

fn build_world(universe: &[&str]) -> World {
    let mut config = Config::test_config();
    config.walkforward.active_sleeve_size = 2;

    let session_store = Arc::new(MemorySessionStore::default());
    let cycle_store = Arc::new(MemoryCycleStore::default());
    let sleeve_store = Arc::new(MemorySleeveStore::default());
    let run_store = Arc::new(MemoryRunStore::default());
    let performance_store = Arc::new(MemoryPerformanceStore::default());
    let price_source = Arc::new(MemoryPriceSource::default());
    let dispatcher = Arc::new(CountingDispatcher::default());

    for symbol in universe {
        price_source.insert_series(
            symbol,
            Interval::Day,
            dip_cycle_bars(symbol, date(2014, 1, 1), date(2021, 1, 1)),
        );
    }

    let engine = Arc::new(BacktestEngine::new(
        price_source,
        Arc::clone(&run_store) as _,
        Arc::clone(&performance_store) as _,
        CostModel::free(),
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

    World {
        session_store,
        sleeve_store,
        run_store,
        dispatcher,
        orchestrator,
    }
}

fn session(universe: &[&str], start: NaiveDate, end: NaiveDate) -> Session {
    Session::new(
        "mean_reversion",
        universe.iter().map(|s| s.to_string()).collect(),
        start,
        end,
        Decimal::new(100_000, 0),
        2,
        1,
    )
}

#[tokio::test]
async fn test_two_year_session_runs_two_cycles() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    world.session_store.create_session(&session).await.unwrap();

    let finished = world.orchestrator.run_session(session.id).await.unwrap();

    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(finished.current_cycle_start, date(2019, 1, 1));
    // One optimization dispatch per cycle, never more
    assert_eq!(world.dispatcher.count(), 2);
}

#[tokio::test]
async fn test_sleeves_are_disjoint_and_cover_universe() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    world.session_store.create_session(&session).await.unwrap();
    world.orchestrator.run_session(session.id).await.unwrap();

    for period in [date(2017, 1, 1), date(2018, 1, 1)] {
        let entries = world
            .sleeve_store
            .entries_for_period(session.id, period)
            .await
            .unwrap();
        assert_eq!(entries.len(), universe.len(), "period {}", period);

        let active: Vec<&str> = entries
            .iter()
            .filter(|e| e.active)
            .map(|e| e.symbol.as_str())
            .collect();
        let shadow: Vec<&str> = entries
            .iter()
            .filter(|e| !e.active)
            .map(|e| e.symbol.as_str())
            .collect();
        assert_eq!(active.len(), 2);
        assert_eq!(shadow.len(), 1);
        for symbol in &active {
            assert!(!shadow.contains(symbol));
        }
    }
}

#[tokio::test]
async fn test_second_cycle_ranks_on_recorded_performance() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    world.session_store.create_session(&session).await.unwrap();
    world.orchestrator.run_session(session.id).await.unwrap();

    // First period has no history, so scores are flat zeros
    let first = world
        .sleeve_store
        .entries_for_period(session.id, date(2017, 1, 1))
        .await
        .unwrap();
    assert!(first.iter().all(|e| e.in_sample_sharpe == 0.0));

    // Second period is ranked from the first cycle's runs
    let second = world
        .sleeve_store
        .entries_for_period(session.id, date(2018, 1, 1))
        .await
        .unwrap();
    assert!(second.iter().any(|e| e.in_sample_sharpe > 0.0));
}

#[tokio::test]
async fn test_runs_and_trades_persisted_per_cycle() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    world.session_store.create_session(&session).await.unwrap();
    let finished = world.orchestrator.run_session(session.id).await.unwrap();

    // Two cycles, each with an active and a shadow run
    let runs = world.run_store.runs_for_session(session.id);
    assert_eq!(runs.len(), 4);
    assert!(runs.iter().all(|r| r.status.is_terminal()));
    assert!(runs.iter().all(|r| r.metrics.is_some()));

    // The dip pattern trades in every window, and trade history survives
    for run in &runs {
        if !run.config.symbols.is_empty() {
            assert!(!world.run_store.trades_for_run(run.id).is_empty());
        }
    }

    // Capital delta equals the sum of active-run pnl. Active runs carry the
    // two-symbol sleeve; shadow runs get the one leftover
    let active_pnl: Decimal = runs
        .iter()
        .filter(|r| r.config.symbols.len() == 2)
        .filter_map(|r| r.metrics.map(|m| m.total_pnl))
        .sum();
    assert_eq!(finished.current_capital - finished.initial_capital, active_pnl);
}

#[tokio::test]
async fn test_capital_compounds_across_cycles() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    world.session_store.create_session(&session).await.unwrap();

    let finished = world.orchestrator.run_session(session.id).await.unwrap();

    // The dip pattern is profitable for mean reversion, and the active
    // sleeve's net pnl rolls into the next cycle's capital
    assert!(finished.current_capital > finished.initial_capital);
}

#[tokio::test]
async fn test_resume_from_persisted_cycle_start() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    let mut session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    // As if the first cycle finished before a crash
    session.current_cycle_start = date(2018, 1, 1);
    world.session_store.create_session(&session).await.unwrap();

    let finished = world.orchestrator.run_session(session.id).await.unwrap();

    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(world.dispatcher.count(), 1);
    // Only the remaining period got sleeve entries
    let first = world
        .sleeve_store
        .entries_for_period(session.id, date(2017, 1, 1))
        .await
        .unwrap();
    assert!(first.is_empty());
}

#[tokio::test]
async fn test_terminal_session_is_untouched() {
    let universe = ["AAPL"];
    let world = build_world(&universe);

    let mut session = session(&universe, date(2017, 1, 1), date(2019, 1, 1));
    session.status = SessionStatus::Completed;
    world.session_store.create_session(&session).await.unwrap();

    let finished = world.orchestrator.run_session(session.id).await.unwrap();
    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(world.dispatcher.count(), 0);
}

#[tokio::test]
async fn test_final_partial_cycle_is_truncated() {
    let universe = ["AAPL", "MSFT", "NVDA"];
    let world = build_world(&universe);

    // 18 months of study with 1-year trading windows: the second cycle is a
    // half-year stub ending exactly at the session end
    let session = session(&universe, date(2017, 1, 1), date(2018, 7, 1));
    world.session_store.create_session(&session).await.unwrap();

    let finished = world.orchestrator.run_session(session.id).await.unwrap();

    assert_eq!(finished.status, SessionStatus::Completed);
    assert_eq!(finished.current_cycle_start, date(2018, 7, 1));
    assert_eq!(world.dispatcher.count(), 2);

    let requests = world.dispatcher.requests();
    assert_eq!(requests[1].window_end, date(2018, 7, 1));
}
