//! Walk-forward study sessions.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a walk-forward session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Queued,
    Optimizing,
    Running,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Queued => "queued",
            SessionStatus::Optimizing => "optimizing",
            SessionStatus::Running => "running",
            SessionStatus::Completed => "completed",
            SessionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(SessionStatus::Queued),
            "optimizing" => Some(SessionStatus::Optimizing),
            "running" => Some(SessionStatus::Running),
            "completed" => Some(SessionStatus::Completed),
            "failed" => Some(SessionStatus::Failed),
            _ => None,
        }
    }
}

/// One multi-year walk-forward study.
///
/// Created once by an external trigger; mutated by the orchestrator as the
/// cycle clock advances; terminal once `Completed` or `Failed`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session ID.
    pub id: Uuid,
    /// Strategy under study.
    pub strategy: String,
    /// Instrument universe, in ranking order for the first cycle.
    pub universe: Vec<String>,
    /// Overall study start date.
    pub start_date: NaiveDate,
    /// Overall study end date.
    pub end_date: NaiveDate,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Capital at the study start.
    pub initial_capital: Decimal,
    /// Capital after the most recent completed cycle.
    pub current_capital: Decimal,
    /// In-sample optimization window length (years).
    pub optimization_window_years: u32,
    /// Out-of-sample trading window length (years).
    pub trading_window_years: u32,
    /// Start of the cycle currently in flight (resume point).
    pub current_cycle_start: NaiveDate,
    /// Trailing error message for failed sessions.
    pub error_message: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        strategy: &str,
        universe: Vec<String>,
        start_date: NaiveDate,
        end_date: NaiveDate,
        initial_capital: Decimal,
        optimization_window_years: u32,
        trading_window_years: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            strategy: strategy.to_string(),
            universe,
            start_date,
            end_date,
            status: SessionStatus::Queued,
            initial_capital,
            current_capital: initial_capital,
            optimization_window_years,
            trading_window_years,
            current_cycle_start: start_date,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the session has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            SessionStatus::Completed | SessionStatus::Failed
        )
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SessionStatus::Queued,
            SessionStatus::Optimizing,
            SessionStatus::Running,
            SessionStatus::Completed,
            SessionStatus::Failed,
        ] {
            assert_eq!(SessionStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SessionStatus::parse("paused"), None);
    }

    #[test]
    fn test_new_session_starts_at_cycle_zero() {
        let session = Session::new(
            "mean_reversion",
            vec!["AAPL".to_string()],
            date(2015, 1, 1),
            date(2020, 1, 1),
            Decimal::new(100_000, 0),
            2,
            1,
        );

        assert_eq!(session.status, SessionStatus::Queued);
        assert_eq!(session.current_cycle_start, session.start_date);
        assert_eq!(session.current_capital, session.initial_capital);
        assert!(!session.is_terminal());
    }
}
