//! ## gemini-detection::spike
//! **Sustained per-thread CPU spike detection**
//!
//! The detector keeps the last `N + 1` sets of hot thread ids. A thread is
//! reported on the rising edge only: absent from the oldest set and present in
//! each of the `N` newer ones. A thread that stays hot is not reported again
//! until it cools down for at least one interval.

use std::collections::HashSet;
use std::fmt::Write;

use gemini_config::SpikeConfig;
use gemini_core::buffer::RollingBuffer;
use gemini_core::evaluator::PercentageEvaluator;
use gemini_core::percentage::PercentageInterval;
use gemini_core::probe::ThreadProbe;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::stacks::{DetectionError, StackFilter};

pub struct SpikeDetector {
    threshold_percent: f64,
    intervals: usize,
    window: Mutex<RollingBuffer<HashSet<u64>>>,
    ignore_threads: HashSet<String>,
    ignore_stacks: StackFilter,
}

impl SpikeDetector {
    /// Detector reporting threads at or above `threshold_percent` for
    /// `intervals` consecutive samples.
    pub fn new(threshold_percent: f64, intervals: usize) -> Self {
        let intervals = intervals.max(1);
        let mut window = RollingBuffer::new(intervals + 1);
        for _ in 0..=intervals {
            window.push(HashSet::new());
        }
        Self {
            threshold_percent,
            intervals,
            window: Mutex::new(window),
            ignore_threads: HashSet::new(),
            ignore_stacks: StackFilter::new(),
        }
    }

    pub fn from_config(config: &SpikeConfig) -> Result<Self, DetectionError> {
        let mut detector = Self::new(config.threshold_percent, config.intervals);
        detector.ignore_threads = config.ignore_threads.iter().cloned().collect();
        detector.ignore_stacks = StackFilter::with_patterns(config.ignore_stacks.iter().cloned())?;
        Ok(detector)
    }

    pub fn ignore_thread(&mut self, name: impl Into<String>) {
        self.ignore_threads.insert(name.into());
    }

    pub fn ignore_stack(&self, substring: &str) -> Result<(), DetectionError> {
        self.ignore_stacks.pattern_add(substring)
    }

    pub fn threshold_percent(&self) -> f64 {
        self.threshold_percent
    }

    pub fn intervals(&self) -> usize {
        self.intervals
    }

    /// Records the interval's hot threads and returns those on a rising edge,
    /// in thread id order.
    fn rising_edges(&self, interval: &PercentageInterval) -> Vec<u64> {
        let hot = interval.over_threshold(self.threshold_percent);
        let mut window = self.window.lock();
        window.push(hot);

        let oldest = window.get(self.intervals);
        let Some(newest) = window.get(0) else {
            return Vec::new();
        };
        let mut edges: Vec<u64> = newest
            .iter()
            .copied()
            .filter(|id| oldest.map_or(true, |set| !set.contains(id)))
            .filter(|id| (1..self.intervals).all(|i| window.get(i).is_some_and(|s| s.contains(id))))
            .collect();
        edges.sort_unstable();
        edges
    }
}

impl PercentageEvaluator for SpikeDetector {
    fn is_exceptional(
        &self,
        interval: &PercentageInterval,
        probe: &dyn ThreadProbe,
    ) -> Option<String> {
        let edges = self.rising_edges(interval);
        if edges.is_empty() {
            return None;
        }

        let mut report = String::new();
        for thread_id in edges {
            let Some(sample) = interval.get(thread_id) else {
                continue;
            };
            if self.ignore_threads.contains(sample.name()) {
                trace!(thread_id, name = sample.name(), "Spike on ignored thread");
                continue;
            }
            let stack = probe.stack_trace(thread_id).unwrap_or_default();
            if let Some(pattern) = self.ignore_stacks.suppressed_by(&stack) {
                debug!(thread_id, name = sample.name(), pattern = %pattern, "Spike on ignored stack");
                continue;
            }

            let _ = writeln!(
                report,
                "Thread \"{}\" (id {}) at {:.1}% CPU for {} intervals",
                sample.name(),
                thread_id,
                sample.usage(),
                self.intervals
            );
            for line in stack.lines() {
                let _ = writeln!(report, "    {}", line);
            }
        }

        if report.is_empty() {
            None
        } else {
            debug!(report = %report, "CPU spike detected");
            Some(report)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_core::probe::{StaticThreadProbe, ThreadCpuReading};
    use tracing_test::traced_test;

    const SECOND_NANOS: u64 = 1_000_000_000;

    /// Scripted threads sampled once per simulated second.
    struct Harness {
        probe: StaticThreadProbe,
        previous: Option<PercentageInterval>,
        now_ms: u64,
    }

    impl Harness {
        fn new(names: &[&str]) -> Self {
            let probe = StaticThreadProbe::new();
            for (i, name) in names.iter().enumerate() {
                probe.set_thread(i as u64 + 1, *name, 0);
            }
            let mut harness = Self {
                probe,
                previous: None,
                now_ms: 0,
            };
            harness.previous = Some(harness.capture());
            harness
        }

        fn capture(&self) -> PercentageInterval {
            let readings: Vec<ThreadCpuReading> = self.probe.threads();
            PercentageInterval::capture(&readings, self.now_ms, self.previous.as_ref())
        }

        /// Advances one second with each thread burning `percent[i]` of a core.
        fn tick(&mut self, detector: &SpikeDetector, percent: &[u64]) -> Option<String> {
            self.now_ms += 1_000;
            for (i, p) in percent.iter().enumerate() {
                self.probe.advance_cpu(i as u64 + 1, SECOND_NANOS * p / 100);
            }
            let interval = self.capture();
            let verdict = detector.is_exceptional(&interval, &self.probe);
            self.previous = Some(interval);
            verdict
        }
    }

    #[test]
    fn test_fires_once_on_rising_edge() {
        let detector = SpikeDetector::new(90.0, 3);
        let mut harness = Harness::new(&["worker"]);

        assert!(harness.tick(&detector, &[10]).is_none());
        assert!(harness.tick(&detector, &[95]).is_none());
        assert!(harness.tick(&detector, &[95]).is_none());
        let report = harness.tick(&detector, &[95]).expect("third hot interval reports");
        assert!(report.contains("\"worker\" (id 1)"));

        // continuing spike reads 1,1,1,1 and stays quiet
        assert!(harness.tick(&detector, &[95]).is_none());
        assert!(harness.tick(&detector, &[95]).is_none());
    }

    #[test]
    fn test_refires_after_cooling_down() {
        let detector = SpikeDetector::new(90.0, 2);
        let mut harness = Harness::new(&["worker"]);

        assert!(harness.tick(&detector, &[100]).is_none());
        assert!(harness.tick(&detector, &[100]).is_some());
        assert!(harness.tick(&detector, &[0]).is_none());
        assert!(harness.tick(&detector, &[100]).is_none());
        assert!(harness.tick(&detector, &[100]).is_some());
    }

    #[traced_test]
    #[test]
    fn test_interrupted_spike_does_not_fire() {
        let detector = SpikeDetector::new(90.0, 3);
        let mut harness = Harness::new(&["worker"]);

        assert!(harness.tick(&detector, &[100]).is_none());
        assert!(harness.tick(&detector, &[20]).is_none());
        assert!(harness.tick(&detector, &[100]).is_none());
        assert!(harness.tick(&detector, &[100]).is_none());
        assert!(logs_contain("pattern=ep_poll"));
    }

    #[test]
    fn test_ignored_thread_name_is_suppressed() {
        let mut detector = SpikeDetector::new(90.0, 1);
        detector.ignore_thread("GC Thread");
        let mut harness = Harness::new(&["GC Thread", "worker"]);

        let report = harness.tick(&detector, &[100, 100]).unwrap();
        assert!(!report.contains("GC Thread"));
        assert!(report.contains("worker"));
    }

    #[traced_test]
    #[test]
    fn test_ignored_stack_is_suppressed() {
        let detector = SpikeDetector::new(90.0, 1);
        detector.ignore_stack("ep_poll").unwrap();
        let mut harness = Harness::new(&["poller"]);
        harness.probe.set_stack(1, "[<0>] ep_poll+0x1f\n[<0>] do_syscall_64");

        assert!(harness.tick(&detector, &[100]).is_none());
    }

    #[test]
    fn test_multiple_threads_share_one_report() {
        let detector = SpikeDetector::from_config(&SpikeConfig {
            intervals: 1,
            ..SpikeConfig::default()
        })
        .unwrap();
        let mut harness = Harness::new(&["alpha", "beta", "idle"]);
        harness.probe.set_stack(2, "compute\nloop");

        let report = harness.tick(&detector, &[100, 98, 0]).unwrap();
        assert!(report.contains("\"alpha\" (id 1)"));
        assert!(report.contains("\"beta\" (id 2)"));
        assert!(report.contains("    compute\n    loop"));
        assert!(!report.contains("idle"));
    }

    #[test]
    fn test_below_threshold_never_fires() {
        let detector = SpikeDetector::new(90.0, 1);
        let mut harness = Harness::new(&["worker"]);
        for _ in 0..5 {
            assert!(harness.tick(&detector, &[89]).is_none());
        }
    }
}
