//! Interval rotation, CPU sampling and verdict handling.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crossbeam::channel::TrySendError;
use opentelemetry::KeyValue;
use tracing::{debug, error, instrument, warn};

use gemini_core::percentage::PercentageInterval;
use gemini_core::probe::SystemReadings;
use gemini_core::snapshot::HealthSnapshot;
use gemini_telemetry::EventLogger;

use super::{Inner, Monitor};

/// Runs `f`, turning a panic into `None` after logging it.
pub(crate) fn guarded<T>(what: &str, f: impl FnOnce() -> Option<T>) -> Option<T> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            error!(component = what, panic = %panic_message(payload.as_ref()), "Caught panic");
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

impl Monitor {
    /// Closes every interval whose end lies before now and opens its
    /// successor. Called after each completed request and by the rotation
    /// worker, so intervals advance even with no traffic.
    pub fn evaluate_intervals(&self) {
        self.inner.evaluate_intervals();
    }

    /// Takes one CPU percentage sample across all live threads and runs the
    /// percentage evaluators over it. Returns the (possibly judged) interval.
    pub fn sample_cpu(&self) -> PercentageInterval {
        self.inner.sample_cpu()
    }
}

impl Inner {
    #[instrument(level = "trace", skip(self))]
    pub(crate) fn evaluate_intervals(&self) {
        if !self.config.enabled {
            return;
        }
        let now = self.clock.now_ms();

        // Probe reads stay outside the lock.
        let readings = if self.state.lock().health_due(now) {
            Some(self.system_readings())
        } else {
            None
        };

        let rotation = self.state.lock().rotate(now, readings);
        if rotation.is_empty() {
            return;
        }

        if let Some((start, end)) = rotation.performance {
            debug!(start, end, "Performance interval rotated");
            self.count_rotation("performance");
        }
        if let Some(session) = rotation.session {
            debug!(
                start = session.start_ms(),
                created = session.created(),
                destroyed = session.destroyed(),
                "Session interval rotated"
            );
            self.count_rotation("session");
        }
        if let Some(health) = rotation.health {
            debug!(
                start = health.start_ms(),
                dispatches = health.dispatches(),
                "Health interval rotated"
            );
            self.count_rotation("health");
            self.judge_health(health);
        }
    }

    fn system_readings(&self) -> SystemReadings {
        let memory = self.system_probe.memory();
        SystemReadings {
            free_memory: memory.free,
            total_memory: memory.total,
            thread_count: self.thread_probe.threads().len(),
        }
    }

    fn count_rotation(&self, dimension: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.interval_rotated(dimension);
        }
    }

    fn judge_health(&self, mut snapshot: HealthSnapshot) {
        let evaluators = self.health_evaluators.read().clone();
        let verdicts: Vec<String> = evaluators
            .iter()
            .filter_map(|evaluator| {
                guarded("health evaluator", || evaluator.is_exceptional(&snapshot))
            })
            .collect();
        if verdicts.is_empty() {
            return;
        }

        let reason = verdicts.join("\n");
        snapshot.set_exceptional(reason.as_str());
        self.state
            .lock()
            .mark_health_exceptional(snapshot.start_ms(), &reason);

        if let Some(metrics) = &self.metrics {
            metrics.exceptional_health_snapshots.inc();
        }
        EventLogger::log_exceptional(
            "health_snapshot",
            &reason,
            vec![
                KeyValue::new("start_ms", snapshot.start_ms() as i64),
                KeyValue::new("end_ms", snapshot.end_ms() as i64),
            ],
        );

        let listeners = self.listeners.read().clone();
        for listener in listeners.iter() {
            guarded("health listener", || {
                listener.health_snapshot_exceptional(&snapshot);
                Some(())
            });
        }
    }

    #[instrument(level = "trace", skip(self))]
    pub(crate) fn sample_cpu(&self) -> PercentageInterval {
        let readings = self.thread_probe.threads();
        let now = self.clock.now_ms();

        let mut interval = {
            let mut state = self.state.lock();
            let interval =
                PercentageInterval::capture(&readings, now, state.percentage.as_ref());
            state.percentage = Some(interval.clone());
            interval
        };

        let evaluators = self.percentage_evaluators.read().clone();
        let verdicts: Vec<String> = evaluators
            .iter()
            .filter_map(|evaluator| {
                guarded("percentage evaluator", || {
                    evaluator.is_exceptional(&interval, self.thread_probe.as_ref())
                })
            })
            .collect();
        if verdicts.is_empty() {
            return interval;
        }

        let report = verdicts.join("\n");
        interval.set_exceptional(report.as_str());
        {
            let mut state = self.state.lock();
            if let Some(current) = state.percentage.as_mut() {
                if current.timestamp_ms() == now {
                    current.set_exceptional(report.as_str());
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.cpu_spikes.inc();
        }
        EventLogger::log_exceptional(
            "cpu_utilization",
            &report,
            vec![
                KeyValue::new("timestamp_ms", now as i64),
                KeyValue::new("threads", interval.len() as i64),
            ],
        );

        // Queue to the notifier when running, deliver inline otherwise.
        let sender = self.notifier.lock().clone();
        match sender.map(|tx| tx.try_send(interval.clone())) {
            Some(Ok(())) => {}
            Some(Err(TrySendError::Full(_))) => {
                warn!(timestamp_ms = now, "Notifier queue full, dropping CPU notification");
            }
            Some(Err(TrySendError::Disconnected(_))) | None => self.notify_cpu(&interval),
        }
        interval
    }

    pub(crate) fn notify_cpu(&self, interval: &PercentageInterval) {
        let listeners = self.listeners.read().clone();
        for listener in listeners.iter() {
            guarded("cpu listener", || {
                listener.cpu_utilization_interval_exceptional(interval);
                Some(())
            });
        }
    }
}
