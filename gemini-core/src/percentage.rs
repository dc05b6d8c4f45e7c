//! ## gemini-core::percentage
//! **Per-thread CPU utilisation intervals**
//!
//! Each interval records the cumulative CPU time of every live thread at one
//! instant. Usage is the CPU delta against the previous interval divided by
//! the wall time between the two captures. A machine with `C` cores can show
//! a total of up to `C * 100` percent across all threads.

use std::collections::{BTreeMap, HashSet};

use serde::Serialize;

use crate::probe::ThreadCpuReading;

/// Usage above 100 but at or below this value is measurement slop and is
/// reported as exactly 100.
pub const SLOP_CEILING_PERCENT: f64 = 105.0;

/// Computes the usage percentage for one thread.
///
/// Returns zero unless both deltas are strictly positive. Values in
/// `(100, 105]` clamp to 100; larger values are returned unclamped.
pub fn usage_percent(cpu_delta_ms: i64, wall_delta_ms: i64) -> f64 {
    if cpu_delta_ms <= 0 || wall_delta_ms <= 0 {
        return 0.0;
    }
    let usage = 100.0 * cpu_delta_ms as f64 / wall_delta_ms as f64;
    if usage > 100.0 && usage <= SLOP_CEILING_PERCENT {
        100.0
    } else {
        usage
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PercentageSample {
    thread_id: u64,
    name: String,
    cpu_ms: u64,
    usage: f64,
}

impl PercentageSample {
    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cpu_ms(&self) -> u64 {
        self.cpu_ms
    }

    pub fn usage(&self) -> f64 {
        self.usage
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PercentageInterval {
    timestamp_ms: u64,
    samples: BTreeMap<u64, PercentageSample>,
    exceptional: Option<String>,
}

impl PercentageInterval {
    /// Builds an interval from fresh readings, diffing against `previous`.
    pub fn capture(
        readings: &[ThreadCpuReading],
        timestamp_ms: u64,
        previous: Option<&PercentageInterval>,
    ) -> Self {
        let samples = readings
            .iter()
            .map(|reading| {
                let cpu_ms = reading.cpu_nanos / 1_000_000;
                let usage = previous
                    .and_then(|prev| {
                        prev.get(reading.thread_id).map(|before| {
                            usage_percent(
                                cpu_ms as i64 - before.cpu_ms as i64,
                                timestamp_ms as i64 - prev.timestamp_ms as i64,
                            )
                        })
                    })
                    .unwrap_or(0.0);
                (
                    reading.thread_id,
                    PercentageSample {
                        thread_id: reading.thread_id,
                        name: reading.name.clone(),
                        cpu_ms,
                        usage,
                    },
                )
            })
            .collect();

        Self {
            timestamp_ms,
            samples,
            exceptional: None,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn get(&self, thread_id: u64) -> Option<&PercentageSample> {
        self.samples.get(&thread_id)
    }

    /// Samples ordered by thread id.
    pub fn samples(&self) -> impl Iterator<Item = &PercentageSample> {
        self.samples.values()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sum of every thread's usage.
    pub fn total_usage(&self) -> f64 {
        self.samples.values().map(|s| s.usage).sum()
    }

    /// Thread ids whose usage is at or above `threshold`.
    pub fn over_threshold(&self, threshold: f64) -> HashSet<u64> {
        self.samples
            .values()
            .filter(|s| s.usage >= threshold)
            .map(|s| s.thread_id)
            .collect()
    }

    pub fn set_exceptional(&mut self, report: impl Into<String>) {
        self.exceptional = Some(report.into());
    }

    pub fn exceptional(&self) -> Option<&str> {
        self.exceptional.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn reading(thread_id: u64, cpu_ms: u64) -> ThreadCpuReading {
        ThreadCpuReading {
            thread_id,
            name: format!("worker-{thread_id}"),
            cpu_nanos: cpu_ms * 1_000_000,
        }
    }

    #[test]
    fn test_full_core_is_one_hundred_percent() {
        let first = PercentageInterval::capture(&[reading(7, 500)], 10_000, None);
        let second = PercentageInterval::capture(&[reading(7, 1_500)], 11_000, Some(&first));
        assert_eq!(second.get(7).map(|s| s.usage()), Some(100.0));
    }

    #[test]
    fn test_first_interval_has_no_usage() {
        let first = PercentageInterval::capture(&[reading(1, 900)], 1_000, None);
        assert_eq!(first.get(1).map(|s| s.usage()), Some(0.0));
    }

    #[test]
    fn test_new_thread_has_no_usage() {
        let first = PercentageInterval::capture(&[reading(1, 100)], 1_000, None);
        let second =
            PercentageInterval::capture(&[reading(1, 600), reading(2, 900)], 2_000, Some(&first));
        assert_eq!(second.get(1).map(|s| s.usage()), Some(50.0));
        assert_eq!(second.get(2).map(|s| s.usage()), Some(0.0));
        assert_eq!(second.total_usage(), 50.0);
    }

    #[test]
    fn test_slop_band_clamps_to_one_hundred() {
        assert_eq!(usage_percent(1_030, 1_000), 100.0);
        assert_eq!(usage_percent(1_050, 1_000), 100.0);
    }

    // Usage above the slop band is left as measured.
    #[test]
    fn test_above_slop_band_is_preserved() {
        assert_eq!(usage_percent(1_060, 1_000), 106.0);
        assert_eq!(usage_percent(2_000, 1_000), 200.0);
    }

    #[test]
    fn test_over_threshold() {
        let first = PercentageInterval::capture(&[reading(1, 0), reading(2, 0)], 0, None);
        let second =
            PercentageInterval::capture(&[reading(1, 950), reading(2, 100)], 1_000, Some(&first));
        let hot = second.over_threshold(90.0);
        assert!(hot.contains(&1));
        assert!(!hot.contains(&2));
    }

    proptest! {
        #[test]
        fn non_positive_deltas_are_zero(cpu in -10_000i64..=0, wall in -10_000i64..10_000) {
            prop_assert_eq!(usage_percent(cpu, wall), 0.0);
            prop_assert_eq!(usage_percent(wall.abs() + 1, -wall.abs()), 0.0);
        }

        #[test]
        fn slop_band_is_exactly_one_hundred(wall in 1_000i64..100_000, extra in 1i64..=50) {
            // cpu = wall * (1 + extra/1000) lands in (100, 105].
            let cpu = wall + wall * extra / 1_000;
            prop_assert_eq!(usage_percent(cpu, wall), 100.0);
        }
    }
}
