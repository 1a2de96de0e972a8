//! Cycle coordinator: turns batch-completion signals into exactly one
//! optimization dispatch per cycle.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::Datelike;
use tracing::{info, warn};
use uuid::Uuid;
use walkforward_core::{
    BatchKind, CompletionOutcome, CycleStore, CycleTracker, OptimizationDispatcher,
    OptimizationMode, OptimizationRequest, Session, SessionStore,
};

use crate::window::shift_years;

/// What a completion signal resulted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchDecision {
    /// This signal closed the barrier and fired the optimization request.
    Fired,
    /// Recorded; the sibling batch is still outstanding.
    Pending,
    /// Duplicate, late, or unknown signal; ignored.
    Dropped,
}

/// Fan-in barrier logic over the durable tracker state.
///
/// The atomicity lives in `CycleStore::record_completion`; the coordinator
/// only acts on the outcome, so any number of concurrent or duplicate
/// signals for one tracker produce exactly one dispatch.
pub struct CycleCoordinator {
    cycle_store: Arc<dyn CycleStore>,
    session_store: Arc<dyn SessionStore>,
    dispatcher: Arc<dyn OptimizationDispatcher>,
}

impl CycleCoordinator {
    pub fn new(
        cycle_store: Arc<dyn CycleStore>,
        session_store: Arc<dyn SessionStore>,
        dispatcher: Arc<dyn OptimizationDispatcher>,
    ) -> Self {
        Self {
            cycle_store,
            session_store,
            dispatcher,
        }
    }

    pub async fn handle_batch_completion(
        &self,
        tracker_id: Uuid,
        batch: BatchKind,
    ) -> Result<DispatchDecision> {
        match self.cycle_store.record_completion(tracker_id, batch).await? {
            CompletionOutcome::Pending => {
                info!(tracker_id = %tracker_id, batch = %batch, "batch complete, sibling outstanding");
                Ok(DispatchDecision::Pending)
            }
            CompletionOutcome::ReadyToDispatch => {
                self.dispatch(tracker_id).await?;
                Ok(DispatchDecision::Fired)
            }
            CompletionOutcome::AlreadyDispatched => {
                warn!(tracker_id = %tracker_id, batch = %batch, "duplicate completion signal, dropping");
                Ok(DispatchDecision::Dropped)
            }
            CompletionOutcome::Unknown => {
                warn!(tracker_id = %tracker_id, batch = %batch, "signal for unknown tracker, dropping");
                Ok(DispatchDecision::Dropped)
            }
        }
    }

    async fn dispatch(&self, tracker_id: Uuid) -> Result<()> {
        let tracker = self
            .cycle_store
            .get_tracker(tracker_id)
            .await?
            .ok_or_else(|| anyhow!("tracker {} vanished after completion", tracker_id))?;
        let session = self
            .session_store
            .get_session(tracker.session_id)
            .await?
            .ok_or_else(|| anyhow!("session {} not found for tracker", tracker.session_id))?;

        let request = build_request(&session, &tracker);
        info!(
            session_id = %session.id,
            mode = ?request.mode,
            window_start = %request.window_start,
            window_end = %request.window_end,
            "dispatching optimization"
        );
        self.dispatcher.submit(&request).await
    }
}

/// Optimization request for the window feeding the next cycle.
///
/// A cycle that rolls into a new calendar year retrains from scratch (annual
/// re-selection); intra-year cycles fine-tune the existing parameters.
fn build_request(session: &Session, tracker: &CycleTracker) -> OptimizationRequest {
    let mode = if tracker.oos_end.year() > tracker.cycle_start.year() {
        OptimizationMode::Train
    } else {
        OptimizationMode::FineTune
    };
    OptimizationRequest {
        session_id: session.id,
        strategy: session.strategy.clone(),
        mode,
        window_start: shift_years(tracker.oos_end, -(session.optimization_window_years as i32)),
        window_end: tracker.oos_end,
        symbols: session.universe.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{CountingDispatcher, MemoryCycleStore, MemorySessionStore};
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn setup() -> (Arc<CycleCoordinator>, Arc<CountingDispatcher>, CycleTracker) {
        let cycle_store = Arc::new(MemoryCycleStore::default());
        let session_store = Arc::new(MemorySessionStore::default());
        let dispatcher = Arc::new(CountingDispatcher::default());

        let session = Session::new(
            "mean_reversion",
            vec!["AAPL".to_string(), "MSFT".to_string()],
            date(2015, 1, 1),
            date(2020, 1, 1),
            Decimal::new(100_000, 0),
            2,
            1,
        );
        session_store.create_session(&session).await.unwrap();

        let tracker = CycleTracker::new(
            session.id,
            date(2017, 1, 1),
            date(2017, 1, 1),
            date(2018, 1, 1),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        cycle_store.create_tracker(&tracker).await.unwrap();

        let coordinator = Arc::new(CycleCoordinator::new(
            cycle_store,
            session_store,
            Arc::clone(&dispatcher) as Arc<dyn OptimizationDispatcher>,
        ));
        (coordinator, dispatcher, tracker)
    }

    #[tokio::test]
    async fn test_first_signal_pends_second_fires() {
        let (coordinator, dispatcher, tracker) = setup().await;

        let first = coordinator
            .handle_batch_completion(tracker.id, BatchKind::Active)
            .await
            .unwrap();
        assert_eq!(first, DispatchDecision::Pending);
        assert_eq!(dispatcher.count(), 0);

        let second = coordinator
            .handle_batch_completion(tracker.id, BatchKind::Shadow)
            .await
            .unwrap();
        assert_eq!(second, DispatchDecision::Fired);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_signal_order_is_commutative() {
        let (coordinator, dispatcher, tracker) = setup().await;

        coordinator
            .handle_batch_completion(tracker.id, BatchKind::Shadow)
            .await
            .unwrap();
        let second = coordinator
            .handle_batch_completion(tracker.id, BatchKind::Active)
            .await
            .unwrap();

        assert_eq!(second, DispatchDecision::Fired);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_signals_never_double_dispatch() {
        let (coordinator, dispatcher, tracker) = setup().await;

        for batch in [
            BatchKind::Active,
            BatchKind::Shadow,
            BatchKind::Active,
            BatchKind::Shadow,
        ] {
            coordinator
                .handle_batch_completion(tracker.id, batch)
                .await
                .unwrap();
        }
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_signals_dispatch_exactly_once() {
        let (coordinator, dispatcher, tracker) = setup().await;
        let tracker_id = tracker.id;

        let mut handles = Vec::new();
        for i in 0..20 {
            let coordinator = Arc::clone(&coordinator);
            let batch = if i % 2 == 0 {
                BatchKind::Active
            } else {
                BatchKind::Shadow
            };
            handles.push(tokio::spawn(async move {
                coordinator
                    .handle_batch_completion(tracker_id, batch)
                    .await
                    .unwrap()
            }));
        }

        let mut fired = 0;
        for handle in handles {
            if handle.await.unwrap() == DispatchDecision::Fired {
                fired += 1;
            }
        }
        assert_eq!(fired, 1);
        assert_eq!(dispatcher.count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_tracker_dropped() {
        let (coordinator, dispatcher, _tracker) = setup().await;

        let decision = coordinator
            .handle_batch_completion(Uuid::new_v4(), BatchKind::Active)
            .await
            .unwrap();
        assert_eq!(decision, DispatchDecision::Dropped);
        assert_eq!(dispatcher.count(), 0);
    }

    #[tokio::test]
    async fn test_year_boundary_selects_train_mode() {
        let (coordinator, dispatcher, tracker) = setup().await;

        coordinator
            .handle_batch_completion(tracker.id, BatchKind::Active)
            .await
            .unwrap();
        coordinator
            .handle_batch_completion(tracker.id, BatchKind::Shadow)
            .await
            .unwrap();

        let requests = dispatcher.requests();
        assert_eq!(requests.len(), 1);
        // 2017 cycle rolling into 2018: annual re-selection retrains
        assert_eq!(requests[0].mode, OptimizationMode::Train);
        assert_eq!(requests[0].window_start, date(2016, 1, 1));
        assert_eq!(requests[0].window_end, date(2018, 1, 1));
    }
}
