//! ## gemini-core::command
//! **Per-command performance aggregation**
//!
//! Every command the dispatcher routes to gets a `MonitoredCommand` holding
//! the statistics of the current performance interval, a rolling history of
//! completed intervals, and the number of requests currently executing it.

use serde::Serialize;

use crate::buffer::RollingBuffer;
use crate::sample::Sample;

/// Statistics of one command over one performance interval.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PerformanceInterval {
    start_ms: u64,
    end_ms: u64,
    invocations: u64,
    total_ms: u64,
    min_ms: Option<u64>,
    max_ms: u64,
    logic_ms: u64,
    render_ms: u64,
    query_ms: u64,
    special_ms: u64,
    cpu_ms: u64,
    queries: u64,
    query_exceptions: u64,
    dispatches: u64,
    renders: u64,
}

impl PerformanceInterval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            ..Self::default()
        }
    }

    /// Folds a completed sample into the interval.
    pub fn record(&mut self, sample: &Sample) {
        let total = sample.total_ms();
        self.invocations += 1;
        self.total_ms += total;
        self.min_ms = Some(self.min_ms.map_or(total, |min| min.min(total)));
        self.max_ms = self.max_ms.max(total);
        self.logic_ms += sample.logic_ms();
        self.render_ms += sample.render_ms();
        self.query_ms += sample.query_ms();
        self.special_ms += sample.special_ms();
        self.cpu_ms += sample.cpu_ms();
        self.queries += u64::from(sample.query_count());
        self.query_exceptions += u64::from(sample.query_exceptions());
        self.dispatches += u64::from(sample.dispatch_count());
        if sample.is_rendered() {
            self.renders += 1;
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    pub fn invocations(&self) -> u64 {
        self.invocations
    }

    pub fn total_ms(&self) -> u64 {
        self.total_ms
    }

    pub fn min_ms(&self) -> u64 {
        self.min_ms.unwrap_or(0)
    }

    pub fn max_ms(&self) -> u64 {
        self.max_ms
    }

    pub fn average_ms(&self) -> f64 {
        if self.invocations == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.invocations as f64
        }
    }

    pub fn logic_ms(&self) -> u64 {
        self.logic_ms
    }

    pub fn render_ms(&self) -> u64 {
        self.render_ms
    }

    pub fn query_ms(&self) -> u64 {
        self.query_ms
    }

    pub fn special_ms(&self) -> u64 {
        self.special_ms
    }

    pub fn cpu_ms(&self) -> u64 {
        self.cpu_ms
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub fn query_exceptions(&self) -> u64 {
        self.query_exceptions
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }
}

/// Aggregate for a single named command.
#[derive(Debug, Clone, Serialize)]
pub struct MonitoredCommand {
    name: String,
    load: u32,
    lifetime_invocations: u64,
    current: PerformanceInterval,
    history: RollingBuffer<PerformanceInterval>,
}

impl MonitoredCommand {
    pub fn new(name: impl Into<String>, start_ms: u64, end_ms: u64, history: usize) -> Self {
        Self {
            name: name.into(),
            load: 0,
            lifetime_invocations: 0,
            current: PerformanceInterval::new(start_ms, end_ms),
            history: RollingBuffer::new(history.max(1)),
        }
    }

    /// Applies a load delta, saturating at zero.
    pub fn adjust_load(&mut self, delta: i64) {
        let next = i64::from(self.load).saturating_add(delta);
        self.load = next.clamp(0, i64::from(u32::MAX)) as u32;
    }

    pub fn process(&mut self, sample: &Sample) {
        self.lifetime_invocations += 1;
        self.current.record(sample);
    }

    /// Retires the current interval into history and opens `[start, end)`.
    pub fn push(&mut self, start_ms: u64, end_ms: u64) {
        let closed = std::mem::replace(
            &mut self.current,
            PerformanceInterval::new(start_ms, end_ms),
        );
        self.history.push(closed);
    }

    pub fn resize_history(&mut self, capacity: usize) {
        self.history.resize(capacity);
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn load(&self) -> u32 {
        self.load
    }

    pub fn lifetime_invocations(&self) -> u64 {
        self.lifetime_invocations
    }

    pub fn current(&self) -> &PerformanceInterval {
        &self.current
    }

    /// Completed intervals, most-recent-first.
    pub fn history(&self) -> Vec<PerformanceInterval> {
        self.history.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn completed(total: u64, queries: u32, failed: bool) -> Sample {
        let mut sample = Sample::new(1, 1, "GET /", 0, 0);
        sample.dispatch_starting("home");
        for _ in 0..queries {
            sample.query_starting(0);
            sample.query_completing(1);
        }
        if failed {
            sample.query_exception();
        }
        sample.complete(total, 0);
        sample
    }

    #[test]
    fn test_interval_statistics() {
        let mut interval = PerformanceInterval::new(0, 3_600_000);
        interval.record(&completed(10, 2, false));
        interval.record(&completed(30, 1, true));
        interval.record(&completed(20, 0, false));
        assert_eq!(interval.invocations(), 3);
        assert_eq!(interval.min_ms(), 10);
        assert_eq!(interval.max_ms(), 30);
        assert_eq!(interval.average_ms(), 20.0);
        assert_eq!(interval.queries(), 3);
        assert_eq!(interval.query_exceptions(), 1);
        assert_eq!(interval.dispatches(), 3);
    }

    #[test]
    fn test_empty_interval_average() {
        let interval = PerformanceInterval::new(0, 1);
        assert_eq!(interval.average_ms(), 0.0);
        assert_eq!(interval.min_ms(), 0);
    }

    #[test]
    fn test_push_rotates_history() {
        let mut command = MonitoredCommand::new("home", 0, 1_000, 2);
        command.process(&completed(5, 0, false));
        command.push(1_000, 2_000);
        command.process(&completed(7, 0, false));
        command.push(2_000, 3_000);
        command.push(3_000, 4_000);

        let history = command.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].start_ms(), 2_000);
        assert_eq!(history[1].start_ms(), 1_000);
        assert_eq!(history[1].total_ms(), 7);
        assert_eq!(command.current().start_ms(), 3_000);
        assert_eq!(command.lifetime_invocations(), 2);
    }

    #[test]
    fn test_load_never_negative() {
        let mut command = MonitoredCommand::new("home", 0, 1, 1);
        command.adjust_load(-1);
        assert_eq!(command.load(), 0);
        command.adjust_load(2);
        command.adjust_load(-5);
        assert_eq!(command.load(), 0);
    }

    proptest! {
        #[test]
        fn balanced_load_returns_to_start(initial in 0u32..50, pairs in 0usize..200) {
            let mut command = MonitoredCommand::new("home", 0, 1, 1);
            command.adjust_load(i64::from(initial));
            for _ in 0..pairs {
                command.adjust_load(1);
                prop_assert!(command.load() >= 1);
            }
            for _ in 0..pairs {
                command.adjust_load(-1);
            }
            prop_assert_eq!(command.load(), initial);
        }
    }
}
