//! # Gemini Telemetry
//!
//! Logging setup, structured monitor events and Prometheus metrics.

pub mod logging;
pub mod metrics;

pub use logging::EventLogger;
pub use metrics::MetricsRecorder;
