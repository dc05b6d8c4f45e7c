//! # Gemini Simulator
//!
//! Deterministic synthetic traffic for the application monitor.
//!
//! A seeded generator drives request lifecycles through a real [`Monitor`]
//! on a manual clock, while a scripted thread probe plays the part of the
//! process's worker threads. With `spike` enabled one extra thread burns a
//! full core for the whole run so the spike detector has something to find.
//! The same seed and configuration always yield the same report.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, instrument};
use validator::Validate;

use gemini_config::MonitorConfig;
use gemini_core::probe::{StaticSystemProbe, StaticThreadProbe};
use gemini_core::time::{to_datetime, Clock, ManualClock};
use gemini_detection::{DetectionError, ResourceHealthEvaluator, SpikeDetector};
use gemini_engine::{Monitor, RequestContext};

pub mod config;
mod listener;
pub mod report;

pub use config::{load_traffic_config, TrafficConfig, TrafficConfigError};
pub use listener::VerdictCollector;
pub use report::{CommandSummary, SimulationReport};

/// Simulation epoch: 2023-11-14T22:13:20Z.
pub const SIMULATION_START_MS: u64 = 1_700_000_000_000;

const NANOS_PER_MILLI: u64 = 1_000_000;
const CPU_SAMPLE_MS: u64 = 1_000;
const FIRST_WORKER_ID: u64 = 100;
const HOT_THREAD_ID: u64 = 99;
const HOT_THREAD_STACK: &str = "report::aggregate\nreport::render_loop\nworker::run";
const SIMULATED_MEMORY: u64 = 8 * 1024 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid traffic configuration: {0}")]
    Config(#[from] validator::ValidationErrors),

    #[error("Detector setup failed: {0}")]
    Detection(#[from] DetectionError),
}

/// Drives synthetic traffic through a monitor.
pub struct TrafficSimulator {
    traffic: TrafficConfig,
    rng: StdRng,
    clock: ManualClock,
    threads: Arc<StaticThreadProbe>,
    memory: Arc<StaticSystemProbe>,
    monitor: Monitor,
    verdicts: Arc<VerdictCollector>,
    last_cpu_sample_ms: u64,
    cpu_samples: usize,
}

impl TrafficSimulator {
    pub fn new(traffic: TrafficConfig, monitor_config: MonitorConfig) -> Result<Self, SimulationError> {
        traffic.validate()?;

        let clock = ManualClock::new(SIMULATION_START_MS);
        let threads = Arc::new(StaticThreadProbe::new());
        for i in 0..traffic.worker_threads as u64 {
            threads.set_thread(FIRST_WORKER_ID + i, format!("http-worker-{i}"), 0);
        }
        if traffic.spike {
            threads.set_thread(HOT_THREAD_ID, "report-generator", 0);
            threads.set_stack(HOT_THREAD_ID, HOT_THREAD_STACK);
        }
        let memory = Arc::new(StaticSystemProbe::new(SIMULATED_MEMORY / 2, SIMULATED_MEMORY));

        let spike = monitor_config.spike.clone();
        let resource_health = monitor_config.resource_health.clone();
        let monitor = Monitor::builder(monitor_config)
            .clock(Arc::new(clock.clone()))
            .thread_probe(threads.clone())
            .system_probe(memory.clone())
            .build();

        if spike.enabled {
            monitor.add_percentage_evaluator(SpikeDetector::from_config(&spike)?);
        }
        if resource_health.is_configured() {
            monitor.add_health_evaluator(ResourceHealthEvaluator::new(resource_health));
        }
        let verdicts = Arc::new(VerdictCollector::default());
        monitor.add_listener(verdicts.clone());

        Ok(Self {
            rng: StdRng::seed_from_u64(traffic.seed),
            traffic,
            clock,
            threads,
            memory,
            monitor,
            verdicts,
            last_cpu_sample_ms: SIMULATION_START_MS,
            cpu_samples: 0,
        })
    }

    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Generates every configured request and collects the outcome.
    #[instrument(level = "info", skip(self), fields(seed = self.traffic.seed))]
    pub fn run(&mut self) -> SimulationReport {
        info!(requests = self.traffic.requests, "Starting traffic simulation");
        self.monitor.sample_cpu();
        self.cpu_samples += 1;

        for _ in 0..self.traffic.requests {
            let gap = self.rng.random_range(1..=self.traffic.max_gap_ms);
            self.advance(gap, None);
            self.session_churn();
            self.simulate_request();
        }
        self.monitor.evaluate_intervals();

        let report = self.report();
        info!(
            spikes = report.spikes.len(),
            health_snapshots = report.health_snapshots.len(),
            "Traffic simulation complete"
        );
        report
    }

    fn session_churn(&mut self) {
        if self.rng.random_bool(self.traffic.session_probability) {
            self.monitor.session_created();
        }
        if self.rng.random_bool(self.traffic.session_probability / 2.0) {
            self.monitor.session_destroyed();
        }
    }

    fn pick_command(&mut self) -> String {
        let index = self.rng.random_range(0..self.traffic.commands.len());
        self.traffic.commands[index].clone()
    }

    /// Random processing time for one phase of a request.
    fn phase_ms(&mut self) -> u64 {
        self.rng.random_range(1..=self.traffic.max_phase_ms)
    }

    fn simulate_request(&mut self) {
        let worker = FIRST_WORKER_ID + self.rng.random_range(0..self.traffic.worker_threads as u64);
        let command = self.pick_command();
        let ctx = self.monitor.request_starting(&format!("GET /{command}"));
        self.monitor.dispatch_starting(&ctx, &command);

        let phase = self.phase_ms();
        self.advance(phase, Some(worker));

        let mut command = command;
        if self.rng.random_bool(self.traffic.redispatch_probability) {
            let next = self.pick_command();
            if next != command {
                debug!(from = %command, to = %next, "Redispatch");
                self.monitor.redispatch_occurring(&ctx, &command, &next);
                command = next;
            }
        }

        self.simulate_queries(&ctx, worker);

        if self.rng.random_bool(self.traffic.render_probability) {
            self.monitor.render_starting(&ctx, &format!("{command}.html"));
            let phase = self.phase_ms();
            self.advance(phase, Some(worker));
            self.monitor.render_complete(&ctx);
        }

        self.monitor.dispatch_complete(&ctx);
        self.monitor.request_completing(&ctx);
    }

    fn simulate_queries(&mut self, ctx: &RequestContext, worker: u64) {
        let queries = self.rng.random_range(0..=self.traffic.max_queries);
        for _ in 0..queries {
            self.monitor.query_starting(ctx);
            let phase = self.phase_ms();
            self.advance(phase, Some(worker));
            if self.rng.random_bool(self.traffic.query_exception_probability) {
                self.monitor.query_exception(ctx);
            }
            self.monitor.query_completing(ctx);
        }
    }

    /// Moves simulated time forward, charging CPU to the busy worker and the
    /// hot thread, and takes a CPU sample at every whole sampling period.
    fn advance(&mut self, ms: u64, busy_worker: Option<u64>) {
        self.clock.advance(ms);
        if let Some(worker) = busy_worker {
            self.threads.advance_cpu(worker, ms * NANOS_PER_MILLI);
        }
        if self.traffic.spike {
            self.threads.advance_cpu(HOT_THREAD_ID, ms * NANOS_PER_MILLI);
        }

        let now = self.clock.now_ms();
        if now - self.last_cpu_sample_ms >= CPU_SAMPLE_MS {
            self.last_cpu_sample_ms = now;
            self.monitor.sample_cpu();
            self.cpu_samples += 1;
            self.monitor.evaluate_intervals();
        }
    }

    fn report(&self) -> SimulationReport {
        SimulationReport {
            seed: self.traffic.seed,
            requests: self.traffic.requests,
            started_at: to_datetime(SIMULATION_START_MS),
            finished_at: to_datetime(self.clock.now_ms()),
            simulated_ms: self.clock.now_ms() - SIMULATION_START_MS,
            cpu_samples: self.cpu_samples,
            commands: self
                .monitor
                .commands()
                .iter()
                .map(CommandSummary::from)
                .collect(),
            current_health: self.monitor.current_health_snapshot(),
            health_snapshots: self.monitor.health_snapshots(),
            session_snapshots: self.monitor.session_snapshots(),
            exceptional_health: self.verdicts.health(),
            spikes: self.verdicts.spikes(),
        }
    }

    /// Memory probe the monitor reads at health rotation.
    pub fn memory_probe(&self) -> &StaticSystemProbe {
        &self.memory
    }
}
