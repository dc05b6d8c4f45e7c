use serde::Serialize;

use super::SnapshotState;

/// Session churn for one session interval.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    start_ms: u64,
    end_ms: u64,
    created: u64,
    destroyed: u64,
    active_at_close: u64,
    state: SnapshotState,
}

impl SessionSnapshot {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self {
            start_ms,
            end_ms,
            created: 0,
            destroyed: 0,
            active_at_close: 0,
            state: SnapshotState::Open,
        }
    }

    pub fn session_created(&mut self) {
        self.created += 1;
    }

    pub fn session_destroyed(&mut self) {
        self.destroyed += 1;
    }

    pub fn complete(&mut self, active: u64) {
        if self.state == SnapshotState::Open {
            self.active_at_close = active;
            self.state = SnapshotState::Closed;
        }
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> u64 {
        self.end_ms
    }

    pub fn created(&self) -> u64 {
        self.created
    }

    pub fn destroyed(&self) -> u64 {
        self.destroyed
    }

    pub fn active_at_close(&self) -> u64 {
        self.active_at_close
    }

    pub fn is_closed(&self) -> bool {
        self.state == SnapshotState::Closed
    }
}
