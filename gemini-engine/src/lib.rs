//! # Gemini Engine
//!
//! The running monitor: request instrumentation entry points, interval
//! rotation, the CPU percentage sampler and listener notification.

pub mod monitor;

pub use monitor::{Monitor, MonitorBuilder, RequestContext};
