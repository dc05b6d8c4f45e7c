//! ## gemini-core::snapshot
//! **Interval-scoped process aggregates**
//!
//! A snapshot is opened with a fixed `[start, end)` window, accumulates
//! counters while open and is closed exactly once. Closed snapshots are
//! immutable apart from the evaluator verdict.

mod health;
mod session;

pub use health::HealthSnapshot;
pub use session::SessionSnapshot;

use serde::Serialize;

/// One-way open/closed lifecycle shared by every snapshot kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotState {
    Open,
    Closed,
}
