//! Walk-forward session state machine.
//!
//! Drives a session cycle by cycle: select sleeves, fan out the active and
//! shadow backtests, wait for the fan-in barrier to fire optimization, then
//! advance the cycle clock. All progress state lives in the stores, so a
//! crashed session resumes from its persisted `current_cycle_start`.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use backtester::BacktestEngine;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;
use walkforward_core::{
    BacktestRun, BatchKind, Config, CycleStore, CycleTracker, Interval, PerformanceStore,
    RunConfig, RunMetrics, RunStore, Session, SessionStatus, SessionStore, SleeveEntry,
    SleeveStore,
};

use crate::cycle::{CycleCoordinator, DispatchDecision};
use crate::sleeve::{select_initial, select_sleeves, CandidateScore, QualityThresholds};
use crate::window::{optimization_window, trading_window};

pub struct WalkForwardOrchestrator {
    session_store: Arc<dyn SessionStore>,
    cycle_store: Arc<dyn CycleStore>,
    sleeve_store: Arc<dyn SleeveStore>,
    run_store: Arc<dyn RunStore>,
    performance_store: Arc<dyn PerformanceStore>,
    engine: Arc<BacktestEngine>,
    coordinator: Arc<CycleCoordinator>,
    thresholds: QualityThresholds,
    active_sleeve_size: usize,
    max_parallelism: usize,
    max_alloc_fraction: Decimal,
}

impl WalkForwardOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_store: Arc<dyn SessionStore>,
        cycle_store: Arc<dyn CycleStore>,
        sleeve_store: Arc<dyn SleeveStore>,
        run_store: Arc<dyn RunStore>,
        performance_store: Arc<dyn PerformanceStore>,
        engine: Arc<BacktestEngine>,
        coordinator: Arc<CycleCoordinator>,
        config: &Config,
    ) -> Self {
        Self {
            session_store,
            cycle_store,
            sleeve_store,
            run_store,
            performance_store,
            engine,
            coordinator,
            thresholds: QualityThresholds::from_config(&config.walkforward),
            active_sleeve_size: config.walkforward.active_sleeve_size,
            max_parallelism: config.simulation.max_parallelism,
            max_alloc_fraction: Decimal::from_f64(config.simulation.max_alloc_fraction)
                .unwrap_or(Decimal::ONE),
        }
    }

    /// Runs a session from its persisted cycle position to completion.
    ///
    /// Terminal sessions are returned untouched. Store failures mark the
    /// session `Failed` and propagate.
    pub async fn run_session(&self, session_id: Uuid) -> Result<Session> {
        let mut session = self
            .session_store
            .get_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("session {} not found", session_id))?;
        if session.is_terminal() {
            info!(session_id = %session_id, status = session.status.as_str(), "session already terminal");
            return Ok(session);
        }

        info!(
            session_id = %session_id,
            strategy = %session.strategy,
            universe = session.universe.len(),
            start = %session.current_cycle_start,
            end = %session.end_date,
            "starting walk-forward session"
        );

        // Ranking feeds on the previous cycle's runs; a fresh start (or a
        // resume) begins from the configured universe order.
        let mut prior_runs: Option<(Uuid, Uuid)> = None;
        while session.current_cycle_start < session.end_date {
            match self.run_cycle(&mut session, prior_runs).await {
                Ok(runs) => prior_runs = Some(runs),
                Err(e) => {
                    session.status = SessionStatus::Failed;
                    session.error_message = Some(e.to_string());
                    session.touch();
                    self.session_store.update_session(&session).await?;
                    return Err(e);
                }
            }
        }

        session.status = SessionStatus::Completed;
        session.touch();
        self.session_store.update_session(&session).await?;
        info!(
            session_id = %session_id,
            final_capital = %session.current_capital,
            "walk-forward session completed"
        );
        Ok(session)
    }

    /// One full cycle: sleeves, runs, barrier, clock advance. Returns the
    /// (active, shadow) run ids for the next cycle's ranking.
    async fn run_cycle(
        &self,
        session: &mut Session,
        prior_runs: Option<(Uuid, Uuid)>,
    ) -> Result<(Uuid, Uuid)> {
        let cycle_start = session.current_cycle_start;
        session.status = SessionStatus::Running;
        session.touch();
        self.session_store.update_session(session).await?;

        let (in_sample_start, in_sample_end) =
            optimization_window(cycle_start, session.optimization_window_years);
        let (oos_start, oos_end) =
            trading_window(cycle_start, session.trading_window_years, session.end_date);
        info!(
            session_id = %session.id,
            cycle_start = %cycle_start,
            in_sample = %format!("{}..{}", in_sample_start, in_sample_end),
            out_of_sample = %format!("{}..{}", oos_start, oos_end),
            "starting cycle"
        );

        let partition = match prior_runs {
            None => select_initial(&session.universe, Interval::Day, self.active_sleeve_size),
            Some((active_id, shadow_id)) => {
                let candidates = self.rank_universe(session, active_id, shadow_id).await?;
                select_sleeves(candidates, &self.thresholds, self.active_sleeve_size)
            }
        };

        self.persist_sleeves(session, oos_start, &partition.active, &partition.shadow)
            .await?;

        let active_run = BacktestRun::new(
            Some(session.id),
            self.run_config(session, &partition.active, oos_start, oos_end, session.current_capital),
        );
        let shadow_run = BacktestRun::new(
            Some(session.id),
            self.run_config(session, &partition.shadow, oos_start, oos_end, session.initial_capital),
        );
        self.run_store.create_run(&active_run).await?;
        self.run_store.create_run(&shadow_run).await?;

        let tracker = CycleTracker::new(
            session.id,
            cycle_start,
            oos_start,
            oos_end,
            active_run.id,
            shadow_run.id,
        );
        self.cycle_store.create_tracker(&tracker).await?;

        let active_handle = self.spawn_batch(tracker.id, BatchKind::Active, active_run.id);
        let shadow_handle = self.spawn_batch(tracker.id, BatchKind::Shadow, shadow_run.id);
        let (active_metrics, active_decision) = active_handle.await??;
        let (_, shadow_decision) = shadow_handle.await??;

        if active_decision != DispatchDecision::Fired && shadow_decision != DispatchDecision::Fired
        {
            warn!(tracker_id = %tracker.id, "cycle barrier closed without a dispatch");
        }

        // Capital compounds from the active sleeve only; the shadow sleeve
        // is paper trading. A failed active run leaves capital unchanged.
        if let Some(metrics) = active_metrics {
            session.current_capital += metrics.total_pnl;
        }
        session.current_cycle_start = oos_end;
        session.status = SessionStatus::Optimizing;
        session.touch();
        self.session_store.update_session(session).await?;

        info!(
            session_id = %session.id,
            cycle_start = %cycle_start,
            next_cycle = %oos_end,
            capital = %session.current_capital,
            "cycle complete"
        );
        Ok((active_run.id, shadow_run.id))
    }

    /// Scores the universe from the prior cycle's recorded performance.
    /// Symbols with no record (no data last cycle) come back unscored so the
    /// universe never shrinks.
    async fn rank_universe(
        &self,
        session: &Session,
        active_id: Uuid,
        shadow_id: Uuid,
    ) -> Result<Vec<CandidateScore>> {
        let mut candidates = Vec::new();
        for run_id in [active_id, shadow_id] {
            for perf in self.performance_store.performance_for_run(run_id).await? {
                candidates.push(CandidateScore {
                    symbol: perf.symbol,
                    interval: perf.interval,
                    sharpe: perf.sharpe_ratio,
                    max_drawdown: perf.max_drawdown,
                    trades: perf.trade_count,
                });
            }
        }
        for symbol in &session.universe {
            if !candidates.iter().any(|c| &c.symbol == symbol) {
                candidates.push(CandidateScore::unscored(symbol, Interval::Day));
            }
        }
        Ok(candidates)
    }

    async fn persist_sleeves(
        &self,
        session: &Session,
        period_start: chrono::NaiveDate,
        active: &[CandidateScore],
        shadow: &[CandidateScore],
    ) -> Result<()> {
        let mut entries = Vec::with_capacity(active.len() + shadow.len());
        for (sleeve, is_active) in [(active, true), (shadow, false)] {
            for candidate in sleeve {
                let mut entry = SleeveEntry::new(
                    session.id,
                    period_start,
                    &candidate.symbol,
                    candidate.interval,
                    &session.strategy,
                    candidate.sharpe,
                    candidate.max_drawdown,
                    is_active,
                );
                entry.params_ref = self
                    .sleeve_store
                    .params_for(session.id, &candidate.symbol, period_start)
                    .await?;
                entries.push(entry);
            }
        }
        self.sleeve_store.save_entries(&entries).await
    }

    fn run_config(
        &self,
        session: &Session,
        sleeve: &[CandidateScore],
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
        capital: Decimal,
    ) -> RunConfig {
        RunConfig {
            strategy: session.strategy.clone(),
            symbols: sleeve.iter().map(|c| c.symbol.clone()).collect(),
            intervals: vec![Interval::Day],
            start_date: start,
            end_date: end,
            initial_capital: capital,
            max_parallelism: self.max_parallelism,
            max_alloc_fraction: self.max_alloc_fraction,
        }
    }

    /// Runs one batch and signals the barrier regardless of the run's fate:
    /// a failed run still completes its side of the cycle.
    fn spawn_batch(
        &self,
        tracker_id: Uuid,
        batch: BatchKind,
        run_id: Uuid,
    ) -> JoinHandle<Result<(Option<RunMetrics>, DispatchDecision)>> {
        let engine = Arc::clone(&self.engine);
        let coordinator = Arc::clone(&self.coordinator);
        tokio::spawn(async move {
            let metrics = match engine.execute(run_id).await {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    warn!(run_id = %run_id, batch = %batch, error = %e, "batch run failed");
                    None
                }
            };
            let decision = coordinator.handle_batch_completion(tracker_id, batch).await?;
            Ok((metrics, decision))
        })
    }
}
