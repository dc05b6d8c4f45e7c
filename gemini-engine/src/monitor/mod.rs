//! ## gemini-engine::monitor
//! **Process-wide application monitor**
//!
//! A [`Monitor`] receives request lifecycle events from the dispatcher,
//! aggregates them into health, session and per-command performance
//! intervals, and samples per-thread CPU utilisation. Closed intervals are
//! handed to registered evaluators and exceptional ones to listeners.
//!
//! All aggregate state lives behind one mutex. Evaluators and listeners are
//! always called after that lock is released.

mod context;
mod events;
mod rotation;
mod state;
mod workers;

use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::Arc;

use crossbeam::channel::Sender;
use parking_lot::{Mutex, RwLock};
use tracing::info;

use gemini_config::{validation, MonitorConfig};
use gemini_core::command::MonitoredCommand;
use gemini_core::evaluator::{HealthEvaluator, MonitorListener, PercentageEvaluator};
use gemini_core::percentage::PercentageInterval;
use gemini_core::probe::{platform_thread_probe, SysinfoProbe, SystemProbe, ThreadProbe};
use gemini_core::sample::Sample;
use gemini_core::snapshot::{HealthSnapshot, SessionSnapshot};
use gemini_core::time::{Clock, SystemClock};
use gemini_telemetry::MetricsRecorder;

pub use self::context::RequestContext;
use self::state::MonitorState;
use self::workers::Workers;

pub mod prelude {
    pub use super::{Monitor, MonitorBuilder, RequestContext};
}

pub(crate) struct Inner {
    config: MonitorConfig,
    clock: Arc<dyn Clock>,
    thread_probe: Arc<dyn ThreadProbe>,
    system_probe: Arc<dyn SystemProbe>,
    metrics: Option<MetricsRecorder>,
    state: Mutex<MonitorState>,
    health_evaluators: RwLock<Vec<Arc<dyn HealthEvaluator>>>,
    percentage_evaluators: RwLock<Vec<Arc<dyn PercentageEvaluator>>>,
    listeners: RwLock<Vec<Arc<dyn MonitorListener>>>,
    notifier: Mutex<Option<Sender<PercentageInterval>>>,
    next_request: AtomicU64,
    running: AtomicBool,
}

/// The application monitor. Cheap to share behind an `Arc`; every method
/// takes `&self`.
pub struct Monitor {
    inner: Arc<Inner>,
    workers: Mutex<Workers>,
}

/// Assembles a [`Monitor`] with substitutable clock, probes and metrics.
pub struct MonitorBuilder {
    config: MonitorConfig,
    clock: Option<Arc<dyn Clock>>,
    thread_probe: Option<Arc<dyn ThreadProbe>>,
    system_probe: Option<Arc<dyn SystemProbe>>,
    metrics: Option<MetricsRecorder>,
}

impl MonitorBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn thread_probe(mut self, probe: Arc<dyn ThreadProbe>) -> Self {
        self.thread_probe = Some(probe);
        self
    }

    pub fn system_probe(mut self, probe: Arc<dyn SystemProbe>) -> Self {
        self.system_probe = Some(probe);
        self
    }

    pub fn metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Monitor {
        let config = self.config.clamped();
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock) as Arc<dyn Clock>);
        let thread_probe = self
            .thread_probe
            .unwrap_or_else(|| Arc::from(platform_thread_probe()));
        let system_probe = self
            .system_probe
            .unwrap_or_else(|| Arc::new(SysinfoProbe::new()) as Arc<dyn SystemProbe>);

        let state = MonitorState::new(&config, clock.now_ms());
        info!(
            health_interval_ms = config.health.interval_ms,
            performance_interval_ms = config.performance.interval_ms,
            cpu_time = thread_probe.supports_cpu_time(),
            "Initializing monitor"
        );

        Monitor {
            inner: Arc::new(Inner {
                config,
                clock,
                thread_probe,
                system_probe,
                metrics: self.metrics,
                state: Mutex::new(state),
                health_evaluators: RwLock::new(Vec::new()),
                percentage_evaluators: RwLock::new(Vec::new()),
                listeners: RwLock::new(Vec::new()),
                notifier: Mutex::new(None),
                next_request: AtomicU64::new(1),
                running: AtomicBool::new(false),
            }),
            workers: Mutex::new(Workers::default()),
        }
    }
}

impl Monitor {
    pub fn builder(config: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder {
            config,
            clock: None,
            thread_probe: None,
            system_probe: None,
            metrics: None,
        }
    }

    /// Monitor over the system clock and platform probes.
    pub fn new(config: MonitorConfig) -> Self {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.inner.config
    }

    pub fn metrics(&self) -> Option<&MetricsRecorder> {
        self.inner.metrics.as_ref()
    }

    pub fn thread_probe(&self) -> &Arc<dyn ThreadProbe> {
        &self.inner.thread_probe
    }

    // Registration

    pub fn add_health_evaluator<E: HealthEvaluator + 'static>(&self, evaluator: E) {
        self.inner.health_evaluators.write().push(Arc::new(evaluator));
    }

    pub fn add_percentage_evaluator<E: PercentageEvaluator + 'static>(&self, evaluator: E) {
        self.inner
            .percentage_evaluators
            .write()
            .push(Arc::new(evaluator));
    }

    pub fn add_listener(&self, listener: Arc<dyn MonitorListener>) {
        self.inner.listeners.write().push(listener);
    }

    // Reads. Every read returns a copy.

    /// Samples of every request currently in flight, oldest first.
    pub fn in_flight_requests(&self) -> Vec<Sample> {
        let state = self.inner.state.lock();
        state.in_flight.values().map(RequestContext::sample).collect()
    }

    pub fn in_flight_request(&self, request_number: u64) -> Option<Sample> {
        let state = self.inner.state.lock();
        state.in_flight.get(&request_number).map(RequestContext::sample)
    }

    /// The request currently running on `thread_id`, if any.
    pub fn in_flight_for_thread(&self, thread_id: u64) -> Option<Sample> {
        let state = self.inner.state.lock();
        state
            .in_flight
            .values()
            .map(RequestContext::sample)
            .find(|sample| sample.thread_id() == thread_id)
    }

    /// Closed health snapshots, most recent first.
    pub fn health_snapshots(&self) -> Vec<HealthSnapshot> {
        self.inner.state.lock().health.history.to_vec()
    }

    pub fn current_health_snapshot(&self) -> HealthSnapshot {
        self.inner.state.lock().health.current.clone()
    }

    /// Closed session snapshots, most recent first.
    pub fn session_snapshots(&self) -> Vec<SessionSnapshot> {
        self.inner.state.lock().session.history.to_vec()
    }

    pub fn current_session_snapshot(&self) -> SessionSnapshot {
        self.inner.state.lock().session.current.clone()
    }

    pub fn active_sessions(&self) -> u64 {
        self.inner.state.lock().active_sessions
    }

    /// Monitored commands ordered case-insensitively by name.
    pub fn commands(&self) -> Vec<MonitoredCommand> {
        self.inner.state.lock().sorted_commands()
    }

    pub fn command(&self, name: &str) -> Option<MonitoredCommand> {
        self.inner.state.lock().commands.get(name).cloned()
    }

    /// The most recent CPU percentage interval.
    pub fn percentage_interval(&self) -> Option<PercentageInterval> {
        self.inner.state.lock().percentage.clone()
    }

    // Runtime reconfiguration. Out-of-range values are clamped.

    pub fn set_health_snapshot_count(&self, count: usize) {
        let count = validation::clamp_snapshot_count(count);
        self.inner.state.lock().health.history.resize(count);
    }

    pub fn set_health_snapshot_interval(&self, interval_ms: u64) {
        self.inner.state.lock().health.interval_ms =
            validation::clamp_snapshot_interval(interval_ms);
    }

    pub fn set_session_snapshot_count(&self, count: usize) {
        let count = validation::clamp_snapshot_count(count);
        self.inner.state.lock().session.history.resize(count);
    }

    pub fn set_session_snapshot_interval(&self, interval_ms: u64) {
        self.inner.state.lock().session.interval_ms =
            validation::clamp_snapshot_interval(interval_ms);
    }

    pub fn health_snapshot_count(&self) -> usize {
        self.inner.state.lock().health.history.capacity()
    }

    pub fn health_snapshot_interval(&self) -> u64 {
        self.inner.state.lock().health.interval_ms
    }

    pub fn session_snapshot_count(&self) -> usize {
        self.inner.state.lock().session.history.capacity()
    }

    pub fn session_snapshot_interval(&self) -> u64 {
        self.inner.state.lock().session.interval_ms
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if self.is_running() {
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests;
