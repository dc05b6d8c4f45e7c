use serde::Serialize;

use super::SnapshotState;
use crate::probe::SystemReadings;

/// Process-wide counters for one health interval.
#[derive(Debug, Clone, Serialize)]
pub struct HealthSnapshot {
    start_ms: u64,
    end_ms: u64,
    dispatches: u64,
    page_renders: u64,
    queries: u64,
    query_exceptions: u64,
    current_load: u32,
    readings: Option<SystemReadings>,
    state: SnapshotState,
    exceptional: Option<String>,
}

impl HealthSnapshot {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            dispatches: 0,
            page_renders: 0,
            queries: 0,
            query_exceptions: 0,
            current_load: 0,
            readings: None,
            state: SnapshotState::Open,
            exceptional: None,
        }
    }

    #[inline]
    pub fn increment_dispatches(&mut self) {
        self.dispatches += 1;
    }

    #[inline]
    pub fn increment_page_renders(&mut self) {
        self.page_renders += 1;
    }

    pub fn add_queries(&mut self, queries: u64, exceptions: u64) {
        self.queries += queries;
        self.query_exceptions += exceptions;
    }

    /// Closes the snapshot with the system readings taken at close. Only the
    /// first call has any effect.
    pub fn complete(&mut self, readings: SystemReadings, current_load: u32) {
        if self.state == SnapshotState::Closed {
            return;
        }
        self.readings = Some(readings);
        self.current_load = current_load;
        self.state = SnapshotState::Closed;
    }

    /// Attaches an evaluator verdict. Open snapshots cannot be judged.
    pub fn set_exceptional(&mut self, reason: impl Into<String>) -> bool {
        if self.state != SnapshotState::Closed {
            return false;
        }
        self.exceptional = Some(reason.into());
        true
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    pub fn dispatches(&self) -> u64 {
        self.dispatches
    }

    pub fn page_renders(&self) -> u64 {
        self.page_renders
    }

    pub fn queries(&self) -> u64 {
        self.queries
    }

    pub fn query_exceptions(&self) -> u64 {
        self.query_exceptions
    }

    pub fn current_load(&self) -> u32 {
        self.current_load
    }

    pub fn readings(&self) -> Option<&SystemReadings> {
        self.readings.as_ref()
    }

    pub fn is_closed(&self) -> bool {
        self.state == SnapshotState::Closed
    }

    pub fn exceptional(&self) -> Option<&str> {
        self.exceptional.as_deref()
    }
}
