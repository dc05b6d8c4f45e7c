//! # gemini-core
//!
//! Data model for the Gemini application monitor.
//!
//! ### Key Submodules:
//! - `buffer`: Fixed-capacity, most-recent-first ring buffer for interval history
//! - `sample`: Per-request timing and counter record
//! - `snapshot`: Health and session interval aggregates
//! - `command`: Per-command performance aggregation
//! - `percentage`: Per-thread CPU utilisation intervals
//! - `probe`: Thread CPU-time and system memory probes
//! - `evaluator`: Evaluator and listener seams consumed by the monitor
//! - `time`: Wall clocks (system and manual)

pub mod buffer;
pub mod command;
pub mod error;
pub mod evaluator;
pub mod percentage;
pub mod probe;
pub mod sample;
pub mod snapshot;
pub mod time;

pub mod prelude {
    pub use crate::buffer::RollingBuffer;
    pub use crate::command::{MonitoredCommand, PerformanceInterval};
    pub use crate::error::MonitorError;
    pub use crate::evaluator::{HealthEvaluator, MonitorListener, PercentageEvaluator};
    pub use crate::percentage::{PercentageInterval, PercentageSample};
    pub use crate::probe::{SystemProbe, SystemReadings, ThreadCpuReading, ThreadProbe};
    pub use crate::sample::Sample;
    pub use crate::snapshot::{HealthSnapshot, SessionSnapshot};
    pub use crate::time::{Clock, ManualClock, SystemClock};
}

pub use error::MonitorError;
