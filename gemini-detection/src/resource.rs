//! ## gemini-detection::resource
//! **Threshold checks on closed health snapshots**

use gemini_config::ResourceHealthConfig;
use gemini_core::evaluator::HealthEvaluator;
use gemini_core::snapshot::HealthSnapshot;

/// Flags a snapshot when memory runs low, the process holds too many threads
/// or queries failed too often. Each tripped threshold adds one line.
#[derive(Debug, Clone, Default)]
pub struct ResourceHealthEvaluator {
    config: ResourceHealthConfig,
}

impl ResourceHealthEvaluator {
    pub fn new(config: ResourceHealthConfig) -> Self {
        Self { config }
    }
}

impl HealthEvaluator for ResourceHealthEvaluator {
    fn is_exceptional(&self, snapshot: &HealthSnapshot) -> Option<String> {
        let mut reasons = Vec::new();

        if let Some(readings) = snapshot.readings() {
            if let Some(min_ratio) = self.config.min_free_memory_ratio {
                if readings.total_memory > 0 {
                    let ratio = readings.free_memory as f64 / readings.total_memory as f64;
                    if ratio < min_ratio {
                        reasons.push(format!(
                            "free memory {:.1}% below {:.1}%",
                            ratio * 100.0,
                            min_ratio * 100.0
                        ));
                    }
                }
            }
            if let Some(max_threads) = self.config.max_threads {
                if readings.thread_count > max_threads {
                    reasons.push(format!(
                        "{} threads exceeds {}",
                        readings.thread_count, max_threads
                    ));
                }
            }
        }

        if let Some(max_exceptions) = self.config.max_query_exceptions {
            if snapshot.query_exceptions() > max_exceptions {
                reasons.push(format!(
                    "{} query exceptions exceeds {}",
                    snapshot.query_exceptions(),
                    max_exceptions
                ));
            }
        }

        if reasons.is_empty() {
            None
        } else {
            Some(reasons.join("\n"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gemini_core::probe::SystemReadings;

    fn closed(free: u64, total: u64, threads: usize, exceptions: u64) -> HealthSnapshot {
        let mut snapshot = HealthSnapshot::new(0, 300_000);
        snapshot.add_queries(exceptions * 2, exceptions);
        snapshot.complete(
            SystemReadings {
                free_memory: free,
                total_memory: total,
                thread_count: threads,
            },
            0,
        );
        snapshot
    }

    fn evaluator() -> ResourceHealthEvaluator {
        ResourceHealthEvaluator::new(ResourceHealthConfig {
            min_free_memory_ratio: Some(0.1),
            max_threads: Some(200),
            max_query_exceptions: Some(5),
        })
    }

    #[test]
    fn test_healthy_snapshot_passes() {
        assert!(evaluator().is_exceptional(&closed(512, 1024, 50, 0)).is_none());
    }

    #[test]
    fn test_each_threshold_adds_a_line() {
        let verdict = evaluator()
            .is_exceptional(&closed(50, 1024, 300, 9))
            .unwrap();
        let lines: Vec<&str> = verdict.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("free memory"));
        assert_eq!(lines[1], "300 threads exceeds 200");
        assert_eq!(lines[2], "9 query exceptions exceeds 5");
    }

    #[test]
    fn test_unconfigured_never_fires() {
        let evaluator = ResourceHealthEvaluator::default();
        assert!(evaluator.is_exceptional(&closed(0, 1024, 10_000, 100)).is_none());
    }

    #[test]
    fn test_zero_total_memory_is_ignored() {
        assert!(evaluator().is_exceptional(&closed(0, 0, 10, 0)).is_none());
    }
}
