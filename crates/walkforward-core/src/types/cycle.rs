//! Cycle tracker: the durable fan-in barrier for one walk-forward cycle.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of a cycle's two parallel batches completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchKind {
    /// The capital-allocated sleeve.
    Active,
    /// The tracked-only remainder of the universe.
    Shadow,
}

impl std::fmt::Display for BatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BatchKind::Active => write!(f, "active"),
            BatchKind::Shadow => write!(f, "shadow"),
        }
    }
}

/// Durable record of one walk-forward cycle's fan-in state.
///
/// Created when a cycle begins; mutated only by completion signals; dead once
/// `optimization_dispatched` flips — the one-shot flag guards against any
/// further mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleTracker {
    /// Tracker ID.
    pub id: Uuid,
    /// Owning session.
    pub session_id: Uuid,
    /// Start date of this cycle.
    pub cycle_start: NaiveDate,
    /// Out-of-sample window start.
    pub oos_start: NaiveDate,
    /// Out-of-sample window end.
    pub oos_end: NaiveDate,
    /// Run the active sleeve is waiting on.
    pub active_run_id: Uuid,
    /// Run the shadow sleeve is waiting on.
    pub shadow_run_id: Uuid,
    /// Active batch completion flag.
    pub active_complete: bool,
    /// Shadow batch completion flag.
    pub shadow_complete: bool,
    /// One-shot dispatch flag; set exactly once, never cleared.
    pub optimization_dispatched: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CycleTracker {
    pub fn new(
        session_id: Uuid,
        cycle_start: NaiveDate,
        oos_start: NaiveDate,
        oos_end: NaiveDate,
        active_run_id: Uuid,
        shadow_run_id: Uuid,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            cycle_start,
            oos_start,
            oos_end,
            active_run_id,
            shadow_run_id,
            active_complete: false,
            shadow_complete: false,
            optimization_dispatched: false,
            created_at: Utc::now(),
        }
    }

    /// Whether both batches have signaled completion.
    pub fn both_complete(&self) -> bool {
        self.active_complete && self.shadow_complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_tracker_is_incomplete() {
        let tracker = CycleTracker::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );

        assert!(!tracker.both_complete());
        assert!(!tracker.optimization_dispatched);
    }

    #[test]
    fn test_both_complete_requires_both_flags() {
        let mut tracker = CycleTracker::new(
            Uuid::new_v4(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            Uuid::new_v4(),
            Uuid::new_v4(),
        );

        tracker.active_complete = true;
        assert!(!tracker.both_complete());
        tracker.shadow_complete = true;
        assert!(tracker.both_complete());
    }
}
