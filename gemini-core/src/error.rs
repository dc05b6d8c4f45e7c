use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Thread probe failure: {0}")]
    Probe(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(&'static str),

    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}
