//! Shared aggregates guarded by the monitor mutex.
//!
//! Nothing in here blocks or calls out: every method is arithmetic, map
//! updates and buffer swaps.

use std::collections::{BTreeMap, HashMap};

use gemini_config::MonitorConfig;
use gemini_core::buffer::RollingBuffer;
use gemini_core::command::MonitoredCommand;
use gemini_core::percentage::PercentageInterval;
use gemini_core::probe::SystemReadings;
use gemini_core::sample::Sample;
use gemini_core::snapshot::{HealthSnapshot, SessionSnapshot};

use super::context::RequestContext;

/// One rolling dimension: the open interval plus closed history.
#[derive(Debug)]
pub(crate) struct Dimension<S> {
    pub enabled: bool,
    pub interval_ms: u64,
    pub current: S,
    pub history: RollingBuffer<S>,
}

impl<S> Dimension<S> {
    fn new(enabled: bool, interval_ms: u64, count: usize, current: S) -> Self {
        Self {
            enabled,
            interval_ms,
            current,
            history: RollingBuffer::new(count.max(1)),
        }
    }
}

/// Epoch-aligned performance window shared by every command.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PerformanceWindow {
    pub interval_ms: u64,
    pub start_ms: u64,
    pub end_ms: u64,
}

impl PerformanceWindow {
    /// Window containing `now_ms`: `[(now / len) * len, start + len)`.
    pub fn aligned(now_ms: u64, interval_ms: u64) -> Self {
        let interval_ms = interval_ms.max(1);
        let start_ms = (now_ms / interval_ms) * interval_ms;
        Self {
            interval_ms,
            start_ms,
            end_ms: start_ms + interval_ms,
        }
    }
}

/// Intervals closed by one call to [`MonitorState::rotate`].
#[derive(Debug, Default)]
pub(crate) struct Rotation {
    pub health: Option<HealthSnapshot>,
    pub session: Option<SessionSnapshot>,
    pub performance: Option<(u64, u64)>,
}

impl Rotation {
    pub fn is_empty(&self) -> bool {
        self.health.is_none() && self.session.is_none() && self.performance.is_none()
    }
}

#[derive(Debug)]
pub(crate) struct MonitorState {
    pub health: Dimension<HealthSnapshot>,
    pub session: Dimension<SessionSnapshot>,
    pub performance: PerformanceWindow,
    pub history_count: usize,
    pub commands: HashMap<String, MonitoredCommand>,
    pub in_flight: BTreeMap<u64, RequestContext>,
    pub active_sessions: u64,
    pub percentage: Option<PercentageInterval>,
}

impl MonitorState {
    pub fn new(config: &MonitorConfig, now_ms: u64) -> Self {
        let health_len = config.health.interval_ms;
        let session_len = config.session.interval_ms;
        Self {
            health: Dimension::new(
                config.health.enabled,
                health_len,
                config.health.snapshot_count,
                HealthSnapshot::new(now_ms, now_ms + health_len),
            ),
            session: Dimension::new(
                config.session.enabled,
                session_len,
                config.session.snapshot_count,
                SessionSnapshot::new(now_ms, now_ms + session_len),
            ),
            performance: PerformanceWindow::aligned(now_ms, config.performance.interval_ms),
            history_count: config.performance.history_count.max(1),
            commands: HashMap::new(),
            in_flight: BTreeMap::new(),
            active_sessions: 0,
            percentage: None,
        }
    }

    /// Applies the dispatch-start load rule: a command already known gets one
    /// more unit of load and the request carries load 1, an unknown command is
    /// left alone and the request carries load 0.
    pub fn apply_dispatch_load(&mut self, sample: &mut Sample, command: &str) {
        match self.commands.get_mut(command) {
            Some(monitored) => {
                monitored.adjust_load(1);
                sample.set_request_load(1);
            }
            None => sample.set_request_load(0),
        }
    }

    pub fn release_load(&mut self, command: &str, load: u32) {
        if let Some(monitored) = self.commands.get_mut(command) {
            monitored.adjust_load(-i64::from(load));
        }
    }

    /// Folds a completed sample into its command and the health counters.
    pub fn record_completion(&mut self, sample: &Sample) {
        if let Some(name) = sample.command() {
            let window = self.performance;
            let history = self.history_count;
            let monitored = self
                .commands
                .entry(name.to_string())
                .or_insert_with(|| MonitoredCommand::new(name, window.start_ms, window.end_ms, history));
            monitored.process(sample);
            monitored.adjust_load(-i64::from(sample.request_load()));
        }
        if self.health.enabled {
            self.health.current.add_queries(
                u64::from(sample.query_count()),
                u64::from(sample.query_exceptions()),
            );
        }
    }

    pub fn health_due(&self, now_ms: u64) -> bool {
        self.health.enabled && now_ms > self.health.current.end_ms()
    }

    /// Closes every dimension whose interval ended before `now_ms`.
    /// `readings` is attached to a closing health snapshot.
    pub fn rotate(&mut self, now_ms: u64, readings: Option<SystemReadings>) -> Rotation {
        let mut rotation = Rotation::default();

        if now_ms > self.performance.end_ms {
            self.performance = PerformanceWindow::aligned(now_ms, self.performance.interval_ms);
            let PerformanceWindow { start_ms, end_ms, .. } = self.performance;
            for monitored in self.commands.values_mut() {
                monitored.push(start_ms, end_ms);
            }
            rotation.performance = Some((start_ms, end_ms));
        }

        if self.health_due(now_ms) {
            let next = HealthSnapshot::new(now_ms, now_ms + self.health.interval_ms);
            let mut closed = std::mem::replace(&mut self.health.current, next);
            closed.complete(readings.unwrap_or_default(), self.in_flight.len() as u32);
            self.health.history.push(closed.clone());
            rotation.health = Some(closed);
        }

        if self.session.enabled && now_ms > self.session.current.end_ms() {
            let next = SessionSnapshot::new(now_ms, now_ms + self.session.interval_ms);
            let mut closed = std::mem::replace(&mut self.session.current, next);
            closed.complete(self.active_sessions);
            self.session.history.push(closed.clone());
            rotation.session = Some(closed);
        }

        rotation
    }

    /// Attaches a verdict to a health snapshot still held in history.
    pub fn mark_health_exceptional(&mut self, start_ms: u64, reason: &str) {
        let found = (0..self.health.history.len())
            .find(|&i| self.health.history.get(i).is_some_and(|s| s.start_ms() == start_ms));
        if let Some(snapshot) = found.and_then(|i| self.health.history.get_mut(i)) {
            snapshot.set_exceptional(reason);
        }
    }

    /// Commands ordered case-insensitively by name.
    pub fn sorted_commands(&self) -> Vec<MonitoredCommand> {
        let mut commands: Vec<MonitoredCommand> = self.commands.values().cloned().collect();
        commands.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then_with(|| a.name().cmp(b.name()))
        });
        commands
    }
}
