//! Listener that keeps every exceptional verdict it hears about.

use parking_lot::Mutex;

use gemini_core::evaluator::MonitorListener;
use gemini_core::percentage::PercentageInterval;
use gemini_core::snapshot::HealthSnapshot;

#[derive(Default)]
pub struct VerdictCollector {
    health: Mutex<Vec<String>>,
    spikes: Mutex<Vec<String>>,
}

impl VerdictCollector {
    pub fn health(&self) -> Vec<String> {
        self.health.lock().clone()
    }

    pub fn spikes(&self) -> Vec<String> {
        self.spikes.lock().clone()
    }
}

impl MonitorListener for VerdictCollector {
    fn health_snapshot_exceptional(&self, snapshot: &HealthSnapshot) {
        if let Some(reason) = snapshot.exceptional() {
            self.health.lock().push(reason.to_string());
        }
    }

    fn cpu_utilization_interval_exceptional(&self, interval: &PercentageInterval) {
        if let Some(report) = interval.exceptional() {
            self.spikes.lock().push(report.to_string());
        }
    }
}
