//! Synthetic traffic parameters.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct TrafficConfig {
    /// Requests to generate.
    #[serde(default = "default_requests")]
    pub requests: usize,

    /// Seed for the traffic generator.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Command names requests are dispatched to.
    #[validate(length(min = 1))]
    #[serde(default = "default_commands")]
    pub commands: Vec<String>,

    /// Largest gap between consecutive request starts (ms).
    #[validate(range(min = 1))]
    #[serde(default = "default_gap")]
    pub max_gap_ms: u64,

    /// Largest per-phase processing time (ms).
    #[validate(range(min = 1))]
    #[serde(default = "default_phase")]
    pub max_phase_ms: u64,

    /// Most queries issued by one request.
    #[serde(default = "default_queries")]
    pub max_queries: u32,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_exception_probability")]
    pub query_exception_probability: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_render_probability")]
    pub render_probability: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_redispatch_probability")]
    pub redispatch_probability: f64,

    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default = "default_session_probability")]
    pub session_probability: f64,

    /// Simulated threads serving requests.
    #[validate(range(min = 1, max = 1_024))]
    #[serde(default = "default_workers")]
    pub worker_threads: usize,

    /// Script one thread to burn a full core for the whole run.
    #[serde(default)]
    pub spike: bool,
}

fn default_requests() -> usize {
    1_000
}

fn default_seed() -> u64 {
    42
}

fn default_commands() -> Vec<String> {
    ["home", "search", "Login", "checkout", "report"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_gap() -> u64 {
    250
}

fn default_phase() -> u64 {
    40
}

fn default_queries() -> u32 {
    4
}

fn default_exception_probability() -> f64 {
    0.02
}

fn default_render_probability() -> f64 {
    0.8
}

fn default_redispatch_probability() -> f64 {
    0.05
}

fn default_session_probability() -> f64 {
    0.1
}

fn default_workers() -> usize {
    8
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            requests: default_requests(),
            seed: default_seed(),
            commands: default_commands(),
            max_gap_ms: default_gap(),
            max_phase_ms: default_phase(),
            max_queries: default_queries(),
            query_exception_probability: default_exception_probability(),
            render_probability: default_render_probability(),
            redispatch_probability: default_redispatch_probability(),
            session_probability: default_session_probability(),
            worker_threads: default_workers(),
            spike: false,
        }
    }
}

#[derive(Error, Debug)]
pub enum TrafficConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Deserialization error: {0}")]
    Serde(#[from] serde_yaml::Error),
    #[error("Invalid traffic configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads a traffic scenario from a YAML file.
pub fn load_traffic_config<P: AsRef<Path>>(path: P) -> Result<TrafficConfig, TrafficConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(TrafficConfigError::FileNotFound(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let content = std::fs::read_to_string(path)?;
    let config: TrafficConfig = serde_yaml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}
