//! Serialisable outcome of a simulation run.

use chrono::{DateTime, Utc};
use serde::Serialize;

use gemini_core::command::MonitoredCommand;
use gemini_core::snapshot::{HealthSnapshot, SessionSnapshot};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CommandSummary {
    pub name: String,
    pub invocations: u64,
    pub average_ms: f64,
    pub max_ms: u64,
    pub queries: u64,
    pub query_exceptions: u64,
    pub load: u32,
}

impl From<&MonitoredCommand> for CommandSummary {
    fn from(command: &MonitoredCommand) -> Self {
        let current = command.current();
        Self {
            name: command.name().to_string(),
            invocations: command.lifetime_invocations(),
            average_ms: current.average_ms(),
            max_ms: current.max_ms(),
            queries: current.queries(),
            query_exceptions: current.query_exceptions(),
            load: command.load(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub seed: u64,
    pub requests: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub simulated_ms: u64,
    pub cpu_samples: usize,
    pub commands: Vec<CommandSummary>,
    pub current_health: HealthSnapshot,
    pub health_snapshots: Vec<HealthSnapshot>,
    pub session_snapshots: Vec<SessionSnapshot>,
    pub exceptional_health: Vec<String>,
    pub spikes: Vec<String>,
}

impl SimulationReport {
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
