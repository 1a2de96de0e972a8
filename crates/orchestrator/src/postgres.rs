//! Postgres-backed store implementations.
//!
//! Schema lives with the deployment's migration tooling; this module ships
//! the query layer only. Enum columns persist the `as_str` forms and parse
//! back on read; run configs ride in a JSONB column.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;
use walkforward_core::{
    BacktestRun, BatchKind, CompletionOutcome, CycleStore, CycleTracker, Direction,
    InstrumentPerformance, Interval, PerformanceStore, PriceBar, PriceSource, RunMetrics,
    RunStatus, RunStore, Session, SessionStatus, SessionStore, SleeveEntry, SleeveStore,
    TradeSummary,
};

fn parse_interval(s: &str) -> Result<Interval> {
    Interval::parse(s).ok_or_else(|| anyhow!("unknown interval in database: {}", s))
}

pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn create_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO wf_sessions (
                id, strategy, universe, start_date, end_date, status,
                initial_capital, current_capital, optimization_window_years,
                trading_window_years, current_cycle_start, error_message,
                created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(session.id)
        .bind(&session.strategy)
        .bind(&session.universe)
        .bind(session.start_date)
        .bind(session.end_date)
        .bind(session.status.as_str())
        .bind(session.initial_capital)
        .bind(session.current_capital)
        .bind(session.optimization_window_years as i32)
        .bind(session.trading_window_years as i32)
        .bind(session.current_cycle_start)
        .bind(&session.error_message)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>> {
        let row = sqlx::query(
            r#"
            SELECT id, strategy, universe, start_date, end_date, status,
                   initial_capital, current_capital, optimization_window_years,
                   trading_window_years, current_cycle_start, error_message,
                   created_at, updated_at
            FROM wf_sessions
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let status_str: String = r.get("status");
            let status = SessionStatus::parse(&status_str)
                .ok_or_else(|| anyhow!("unknown session status: {}", status_str))?;
            Ok(Session {
                id: r.get("id"),
                strategy: r.get("strategy"),
                universe: r.get("universe"),
                start_date: r.get("start_date"),
                end_date: r.get("end_date"),
                status,
                initial_capital: r.get("initial_capital"),
                current_capital: r.get("current_capital"),
                optimization_window_years: r.get::<i32, _>("optimization_window_years") as u32,
                trading_window_years: r.get::<i32, _>("trading_window_years") as u32,
                current_cycle_start: r.get("current_cycle_start"),
                error_message: r.get("error_message"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn update_session(&self, session: &Session) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE wf_sessions SET
                status = $2,
                current_capital = $3,
                current_cycle_start = $4,
                error_message = $5,
                updated_at = $6
            WHERE id = $1
            "#,
        )
        .bind(session.id)
        .bind(session.status.as_str())
        .bind(session.current_capital)
        .bind(session.current_cycle_start)
        .bind(&session.error_message)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct PgCycleStore {
    pool: PgPool,
}

impl PgCycleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CycleStore for PgCycleStore {
    async fn create_tracker(&self, tracker: &CycleTracker) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO cycle_trackers (
                id, session_id, cycle_start, oos_start, oos_end,
                active_run_id, shadow_run_id, active_complete, shadow_complete,
                optimization_dispatched, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(tracker.id)
        .bind(tracker.session_id)
        .bind(tracker.cycle_start)
        .bind(tracker.oos_start)
        .bind(tracker.oos_end)
        .bind(tracker.active_run_id)
        .bind(tracker.shadow_run_id)
        .bind(tracker.active_complete)
        .bind(tracker.shadow_complete)
        .bind(tracker.optimization_dispatched)
        .bind(tracker.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_tracker(&self, id: Uuid) -> Result<Option<CycleTracker>> {
        let row = sqlx::query(
            r#"
            SELECT id, session_id, cycle_start, oos_start, oos_end,
                   active_run_id, shadow_run_id, active_complete, shadow_complete,
                   optimization_dispatched, created_at
            FROM cycle_trackers
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| CycleTracker {
            id: r.get("id"),
            session_id: r.get("session_id"),
            cycle_start: r.get("cycle_start"),
            oos_start: r.get("oos_start"),
            oos_end: r.get("oos_end"),
            active_run_id: r.get("active_run_id"),
            shadow_run_id: r.get("shadow_run_id"),
            active_complete: r.get("active_complete"),
            shadow_complete: r.get("shadow_complete"),
            optimization_dispatched: r.get("optimization_dispatched"),
            created_at: r.get("created_at"),
        }))
    }

    async fn record_completion(&self, id: Uuid, batch: BatchKind) -> Result<CompletionOutcome> {
        // Flag flip and barrier state read in one statement
        let query = match batch {
            BatchKind::Active => {
                r#"
                UPDATE cycle_trackers SET active_complete = TRUE
                WHERE id = $1
                RETURNING active_complete, shadow_complete, optimization_dispatched
                "#
            }
            BatchKind::Shadow => {
                r#"
                UPDATE cycle_trackers SET shadow_complete = TRUE
                WHERE id = $1
                RETURNING active_complete, shadow_complete, optimization_dispatched
                "#
            }
        };
        let Some(row) = sqlx::query(query).bind(id).fetch_optional(&self.pool).await? else {
            return Ok(CompletionOutcome::Unknown);
        };

        let both: bool = row.get::<bool, _>("active_complete") && row.get::<bool, _>("shadow_complete");
        if !both {
            return Ok(CompletionOutcome::Pending);
        }

        // The dispatch award: the conditional update succeeds for exactly
        // one caller per tracker, ever.
        let result = sqlx::query(
            r#"
            UPDATE cycle_trackers SET optimization_dispatched = TRUE
            WHERE id = $1
              AND active_complete AND shadow_complete
              AND NOT optimization_dispatched
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            debug!(tracker_id = %id, "won optimization dispatch");
            Ok(CompletionOutcome::ReadyToDispatch)
        } else {
            Ok(CompletionOutcome::AlreadyDispatched)
        }
    }
}

pub struct PgSleeveStore {
    pool: PgPool,
}

impl PgSleeveStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SleeveStore for PgSleeveStore {
    async fn save_entries(&self, entries: &[SleeveEntry]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for entry in entries {
            sqlx::query(
                r#"
                INSERT INTO sleeve_entries (
                    id, session_id, period_start, symbol, interval, strategy,
                    params_ref, in_sample_sharpe, in_sample_drawdown, active,
                    created_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(entry.id)
            .bind(entry.session_id)
            .bind(entry.period_start)
            .bind(&entry.symbol)
            .bind(entry.interval.as_str())
            .bind(&entry.strategy)
            .bind(entry.params_ref)
            .bind(entry.in_sample_sharpe)
            .bind(entry.in_sample_drawdown)
            .bind(entry.active)
            .bind(entry.created_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn entries_for_period(
        &self,
        session_id: Uuid,
        period_start: NaiveDate,
    ) -> Result<Vec<SleeveEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, session_id, period_start, symbol, interval, strategy,
                   params_ref, in_sample_sharpe, in_sample_drawdown, active,
                   created_at
            FROM sleeve_entries
            WHERE session_id = $1 AND period_start = $2
            ORDER BY active DESC, in_sample_sharpe DESC
            "#,
        )
        .bind(session_id)
        .bind(period_start)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let interval_str: String = r.get("interval");
                Ok(SleeveEntry {
                    id: r.get("id"),
                    session_id: r.get("session_id"),
                    period_start: r.get("period_start"),
                    symbol: r.get("symbol"),
                    interval: parse_interval(&interval_str)?,
                    strategy: r.get("strategy"),
                    params_ref: r.get("params_ref"),
                    in_sample_sharpe: r.get("in_sample_sharpe"),
                    in_sample_drawdown: r.get("in_sample_drawdown"),
                    active: r.get("active"),
                    created_at: r.get("created_at"),
                })
            })
            .collect()
    }

    async fn params_for(
        &self,
        session_id: Uuid,
        symbol: &str,
        as_of: NaiveDate,
    ) -> Result<Option<Uuid>> {
        let row = sqlx::query(
            r#"
            SELECT params_id
            FROM optimized_params
            WHERE session_id = $1 AND symbol = $2 AND as_of <= $3
            ORDER BY as_of DESC
            LIMIT 1
            "#,
        )
        .bind(session_id)
        .bind(symbol)
        .bind(as_of)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|r| r.get("params_id")))
    }
}

pub struct PgRunStore {
    pool: PgPool,
}

impl PgRunStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunStore for PgRunStore {
    async fn create_run(&self, run: &BacktestRun) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO backtest_runs (
                id, session_id, config, status, error_message, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.id)
        .bind(run.session_id)
        .bind(serde_json::to_value(&run.config)?)
        .bind(run.status.as_str())
        .bind(&run.error_message)
        .bind(run.created_at)
        .bind(run.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_run(&self, id: Uuid) -> Result<Option<BacktestRun>> {
        let row = sqlx::query(
            r#"
            SELECT id, session_id, config, status, error_message,
                   total_trades, total_pnl, total_return, max_drawdown,
                   win_rate, sharpe_ratio, created_at, updated_at
            FROM backtest_runs
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            let status_str: String = r.get("status");
            let status = RunStatus::parse(&status_str)
                .ok_or_else(|| anyhow!("unknown run status: {}", status_str))?;
            let metrics = r
                .get::<Option<i32>, _>("total_trades")
                .map(|total_trades| RunMetrics {
                    total_trades: total_trades as usize,
                    total_pnl: r.get("total_pnl"),
                    total_return: r.get("total_return"),
                    max_drawdown: r.get("max_drawdown"),
                    win_rate: r.get("win_rate"),
                    sharpe_ratio: r.get("sharpe_ratio"),
                });
            Ok(BacktestRun {
                id: r.get("id"),
                session_id: r.get("session_id"),
                config: serde_json::from_value(r.get("config"))?,
                status,
                metrics,
                error_message: r.get("error_message"),
                created_at: r.get("created_at"),
                updated_at: r.get("updated_at"),
            })
        })
        .transpose()
    }

    async fn set_running(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE backtest_runs SET status = 'running', updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn complete_run(&self, id: Uuid, metrics: &RunMetrics) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE backtest_runs SET
                status = 'completed',
                total_trades = $2,
                total_pnl = $3,
                total_return = $4,
                max_drawdown = $5,
                win_rate = $6,
                sharpe_ratio = $7,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(metrics.total_trades as i32)
        .bind(metrics.total_pnl)
        .bind(metrics.total_return)
        .bind(metrics.max_drawdown)
        .bind(metrics.win_rate)
        .bind(metrics.sharpe_ratio)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_run(&self, id: Uuid, error: &str) -> Result<()> {
        sqlx::query(
            "UPDATE backtest_runs SET status = 'failed', error_message = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_trades(&self, run_id: Uuid, trades: &[TradeSummary]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for trade in trades {
            sqlx::query(
                r#"
                INSERT INTO trades (
                    id, run_id, symbol, direction, quantity,
                    entry_date, exit_date, entry_price, exit_price,
                    gross_pnl, net_pnl, total_costs, holding_bars,
                    max_favorable, max_adverse, entry_reason, exit_reason
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
                "#,
            )
            .bind(trade.id)
            .bind(run_id)
            .bind(&trade.symbol)
            .bind(match trade.direction {
                Direction::Long => "long",
                Direction::Short => "short",
            })
            .bind(trade.quantity)
            .bind(trade.entry_date)
            .bind(trade.exit_date)
            .bind(trade.entry_price)
            .bind(trade.exit_price)
            .bind(trade.gross_pnl)
            .bind(trade.net_pnl)
            .bind(trade.total_costs())
            .bind(trade.holding_bars as i32)
            .bind(trade.max_favorable)
            .bind(trade.max_adverse)
            .bind(&trade.entry_reason)
            .bind(&trade.exit_reason)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(run_id = %run_id, trades = trades.len(), "saved trade history");
        Ok(())
    }
}

pub struct PgPerformanceStore {
    pool: PgPool,
}

impl PgPerformanceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PerformanceStore for PgPerformanceStore {
    async fn save_performance(&self, record: &InstrumentPerformance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO instrument_performance (
                run_id, symbol, interval, sharpe_ratio, max_drawdown,
                trade_count, total_pnl
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(record.run_id)
        .bind(&record.symbol)
        .bind(record.interval.as_str())
        .bind(record.sharpe_ratio)
        .bind(record.max_drawdown)
        .bind(record.trade_count as i32)
        .bind(record.total_pnl)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn performance_for_run(&self, run_id: Uuid) -> Result<Vec<InstrumentPerformance>> {
        let rows = sqlx::query(
            r#"
            SELECT run_id, symbol, interval, sharpe_ratio, max_drawdown,
                   trade_count, total_pnl
            FROM instrument_performance
            WHERE run_id = $1
            ORDER BY sharpe_ratio DESC
            "#,
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let interval_str: String = r.get("interval");
                Ok(InstrumentPerformance {
                    run_id: r.get("run_id"),
                    symbol: r.get("symbol"),
                    interval: parse_interval(&interval_str)?,
                    sharpe_ratio: r.get("sharpe_ratio"),
                    max_drawdown: r.get("max_drawdown"),
                    trade_count: r.get::<i32, _>("trade_count") as usize,
                    total_pnl: r.get("total_pnl"),
                })
            })
            .collect()
    }
}

pub struct PgPriceSource {
    pool: PgPool,
}

impl PgPriceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceSource for PgPriceSource {
    async fn bars(
        &self,
        symbol: &str,
        interval: Interval,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let rows = sqlx::query(
            r#"
            SELECT symbol, interval, timestamp, open, high, low, close, volume
            FROM price_bars
            WHERE symbol = $1
              AND interval = $2
              AND timestamp::date >= $3
              AND timestamp::date <= $4
            ORDER BY timestamp ASC
            "#,
        )
        .bind(symbol)
        .bind(interval.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|r| {
                let interval_str: String = r.get("interval");
                Ok(PriceBar {
                    symbol: r.get("symbol"),
                    interval: parse_interval(&interval_str)?,
                    timestamp: r.get("timestamp"),
                    open: r.get("open"),
                    high: r.get("high"),
                    low: r.get("low"),
                    close: r.get("close"),
                    volume: r.get("volume"),
                })
            })
            .collect()
    }
}
