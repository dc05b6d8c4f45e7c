//! Monitor configuration.
//!
//! Feature gates, interval lengths and buffer sizes for the health, session
//! and performance dimensions, plus the CPU sampler cadence.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::health::ResourceHealthConfig;
use crate::spike::SpikeConfig;
use crate::validation;

/// Monitor configuration parameters.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct MonitorConfig {
    /// Master switch. A disabled monitor ignores every event.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Process health snapshots.
    #[validate(nested)]
    #[serde(default)]
    pub health: SnapshotConfig,

    /// Session churn snapshots.
    #[validate(nested)]
    #[serde(default)]
    pub session: SnapshotConfig,

    /// Per-command performance intervals.
    #[validate(nested)]
    #[serde(default)]
    pub performance: PerformanceConfig,

    /// Per-thread CPU sampling.
    #[validate(nested)]
    #[serde(default)]
    pub cpu: CpuConfig,

    /// How often the rotation worker checks interval boundaries (ms,
    /// clamped to 100..=60000).
    #[serde(default = "default_tick")]
    pub rotation_interval_ms: u64,

    /// Sustained CPU spike detection.
    #[validate(nested)]
    #[serde(default)]
    pub spike: SpikeConfig,

    /// Resource health thresholds.
    #[validate(nested)]
    #[serde(default)]
    pub resource_health: ResourceHealthConfig,
}

fn default_true() -> bool {
    true
}

fn default_tick() -> u64 {
    1_000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            health: SnapshotConfig::default(),
            session: SnapshotConfig::default(),
            performance: PerformanceConfig::default(),
            cpu: CpuConfig::default(),
            rotation_interval_ms: default_tick(),
            spike: SpikeConfig::default(),
            resource_health: ResourceHealthConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Pulls every bounded value into its legal range.
    pub fn clamp(&mut self) {
        self.health.clamp();
        self.session.clamp();
        self.performance.clamp();
        self.cpu.clamp();
        self.spike.clamp();
        self.rotation_interval_ms = validation::clamp_tick(self.rotation_interval_ms);
    }

    /// Consumes and returns a clamped copy.
    pub fn clamped(mut self) -> Self {
        self.clamp();
        self
    }
}

/// Rolling snapshot buffer for one dimension.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct SnapshotConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Number of closed snapshots retained (clamped to 2..=30000).
    #[serde(default = "default_snapshot_count")]
    pub snapshot_count: usize,

    /// Interval length (ms, clamped to 500 ms..=1 year).
    #[serde(default = "default_snapshot_interval")]
    pub interval_ms: u64,
}

fn default_snapshot_count() -> usize {
    288
}

fn default_snapshot_interval() -> u64 {
    5 * 60 * 1_000
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            snapshot_count: default_snapshot_count(),
            interval_ms: default_snapshot_interval(),
        }
    }
}

impl SnapshotConfig {
    pub fn clamp(&mut self) {
        self.snapshot_count = validation::clamp_snapshot_count(self.snapshot_count);
        self.interval_ms = validation::clamp_snapshot_interval(self.interval_ms);
    }
}

/// Performance interval configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct PerformanceConfig {
    /// Interval length (ms, clamped to 5 s..=1 year). Boundaries are epoch
    /// multiples of this length.
    #[serde(default = "default_performance_interval")]
    pub interval_ms: u64,

    /// Completed intervals kept per command (clamped to 1..=30000).
    #[serde(default = "default_history")]
    pub history_count: usize,
}

fn default_performance_interval() -> u64 {
    60 * 60 * 1_000
}

fn default_history() -> usize {
    24
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_performance_interval(),
            history_count: default_history(),
        }
    }
}

impl PerformanceConfig {
    pub fn clamp(&mut self) {
        self.interval_ms = validation::clamp_performance_interval(self.interval_ms);
        self.history_count = validation::clamp_history_count(self.history_count);
    }
}

/// CPU sampler configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone)]
pub struct CpuConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sampling cadence (ms, clamped to 100..=60000).
    #[serde(default = "default_tick")]
    pub sample_interval_ms: u64,
}

impl CpuConfig {
    pub fn clamp(&mut self) {
        self.sample_interval_ms = validation::clamp_tick(self.sample_interval_ms);
    }
}

impl Default for CpuConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_interval_ms: default_tick(),
        }
    }
}
