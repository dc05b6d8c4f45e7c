//! ## gemini-core::evaluator
//! **Verdict and notification seams**
//!
//! Evaluators decide whether a just-closed interval is exceptional; listeners
//! are told about exceptional intervals. Both are registered with the monitor
//! at startup and invoked without the monitor lock held.

use crate::percentage::PercentageInterval;
use crate::probe::ThreadProbe;
use crate::snapshot::HealthSnapshot;

/// Judges closed health snapshots.
pub trait HealthEvaluator: Send + Sync {
    /// Returns a reason when the snapshot is exceptional.
    fn is_exceptional(&self, snapshot: &HealthSnapshot) -> Option<String>;
}

/// Judges completed CPU percentage intervals.
pub trait PercentageEvaluator: Send + Sync {
    /// Returns a report when the interval is exceptional. `probe` gives access
    /// to thread stack text for the report.
    fn is_exceptional(&self, interval: &PercentageInterval, probe: &dyn ThreadProbe)
        -> Option<String>;
}

/// Receives exceptional-interval notifications.
pub trait MonitorListener: Send + Sync {
    fn health_snapshot_exceptional(&self, _snapshot: &HealthSnapshot) {}

    fn cpu_utilization_interval_exceptional(&self, _interval: &PercentageInterval) {}
}

impl<F> HealthEvaluator for F
where
    F: Fn(&HealthSnapshot) -> Option<String> + Send + Sync,
{
    fn is_exceptional(&self, snapshot: &HealthSnapshot) -> Option<String> {
        self(snapshot)
    }
}
