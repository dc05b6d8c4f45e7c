//! Background workers: interval rotation, CPU sampling and listener
//! notification. Each runs on its own named OS thread and polls the run flag
//! between short sleep slices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use opentelemetry::KeyValue;
use tracing::{debug, info, instrument};

use gemini_core::percentage::PercentageInterval;
use gemini_core::MonitorError;
use gemini_telemetry::EventLogger;

use super::{Inner, Monitor};

const SLEEP_SLICE: Duration = Duration::from_millis(50);
const NOTIFIER_QUEUE: usize = 64;

#[derive(Default)]
pub(crate) struct Workers {
    handles: Vec<JoinHandle<()>>,
}

/// Sleeps up to `total`, returning early once `running` clears.
fn sleep_while_running(running: &AtomicBool, total: Duration) {
    let mut remaining = total;
    while !remaining.is_zero() && running.load(Ordering::Acquire) {
        let slice = remaining.min(SLEEP_SLICE);
        thread::sleep(slice);
        remaining -= slice;
    }
}

#[instrument(level = "info", name = "rotation_worker", skip(inner))]
fn rotation_loop(inner: Arc<Inner>, period: Duration) {
    while inner.running.load(Ordering::Acquire) {
        inner.evaluate_intervals();
        sleep_while_running(&inner.running, period);
    }
    debug!("Rotation worker exiting");
}

#[instrument(level = "info", name = "cpu_sampler", skip(inner))]
fn sampler_loop(inner: Arc<Inner>, period: Duration) {
    while inner.running.load(Ordering::Acquire) {
        inner.sample_cpu();
        sleep_while_running(&inner.running, period);
    }
    debug!("CPU sampler exiting");
}

#[instrument(level = "info", name = "notifier", skip(inner, rx))]
fn notifier_loop(inner: Arc<Inner>, rx: Receiver<PercentageInterval>) {
    // Ends once every sender is dropped and the queue is drained.
    for interval in rx.iter() {
        inner.notify_cpu(&interval);
    }
    debug!("Notifier exiting");
}

fn spawn(name: &str, f: impl FnOnce() + Send + 'static) -> Result<JoinHandle<()>, MonitorError> {
    thread::Builder::new()
        .name(name.to_string())
        .spawn(f)
        .map_err(MonitorError::from)
}

impl Monitor {
    /// Starts the rotation worker, and the CPU sampler with its notifier when
    /// CPU sampling is enabled.
    pub fn start(&self) -> Result<(), MonitorError> {
        if self.inner.running.swap(true, Ordering::AcqRel) {
            return Err(MonitorError::AlreadyRunning);
        }
        let config = &self.inner.config;
        let mut workers = self.workers.lock();

        let result = (|| -> Result<(), MonitorError> {
            let inner = self.inner.clone();
            let period = Duration::from_millis(config.rotation_interval_ms);
            workers
                .handles
                .push(spawn("gemini-rotation", move || rotation_loop(inner, period))?);

            if config.enabled && config.cpu.enabled {
                let (tx, rx) = channel::bounded(NOTIFIER_QUEUE);
                *self.inner.notifier.lock() = Some(tx);

                let inner = self.inner.clone();
                workers
                    .handles
                    .push(spawn("gemini-notifier", move || notifier_loop(inner, rx))?);

                let inner = self.inner.clone();
                let period = Duration::from_millis(config.cpu.sample_interval_ms);
                workers
                    .handles
                    .push(spawn("gemini-cpu-sampler", move || sampler_loop(inner, period))?);
            }
            Ok(())
        })();

        if let Err(e) = result {
            drop(workers);
            self.stop();
            return Err(e);
        }

        info!(workers = workers.handles.len(), "Monitor started");
        EventLogger::log_event(
            "monitor_started",
            vec![
                KeyValue::new("cpu_sampling", config.cpu.enabled),
                KeyValue::new("cpu_time", self.inner.thread_probe.supports_cpu_time()),
            ],
        );
        Ok(())
    }

    /// Stops and joins every worker. Pending CPU notifications are delivered
    /// before the notifier exits.
    pub fn stop(&self) {
        self.inner.running.store(false, Ordering::Release);
        let handles = std::mem::take(&mut self.workers.lock().handles);

        // Sampler first so nothing is queued after the sender is dropped.
        let (notifier, others): (Vec<_>, Vec<_>) = handles
            .into_iter()
            .partition(|h| h.thread().name() == Some("gemini-notifier"));
        for handle in others {
            let _ = handle.join();
        }
        self.inner.notifier.lock().take();
        for handle in notifier {
            let _ = handle.join();
        }

        info!("Monitor stopped");
        EventLogger::log_event("monitor_stopped", vec![]);
    }

    pub fn is_running(&self) -> bool {
        self.inner.running.load(Ordering::Acquire)
    }
}
