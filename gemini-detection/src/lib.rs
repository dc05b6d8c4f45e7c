//! # Gemini Detection
//!
//! Evaluators that judge closed monitor intervals.
//!
//! - `spike`: sustained per-thread CPU spikes over percentage intervals
//! - `resource`: memory, thread and query-exception thresholds over health snapshots
//! - `stacks`: Aho-Corasick filter for stack text that should never be reported

pub mod resource;
pub mod spike;
pub mod stacks;

pub use resource::ResourceHealthEvaluator;
pub use spike::SpikeDetector;
pub use stacks::{DetectionError, StackFilter};
