// gemini-config/src/validation.rs
//! Bounds and custom validation functions for configuration.
//!
//! Interval lengths, cadences and counts are clamped rather than rejected;
//! everything else goes through `validator`.

use validator::ValidationError;

/// Smallest rolling snapshot buffer.
pub const MIN_SNAPSHOT_COUNT: usize = 2;
/// Largest rolling snapshot buffer.
pub const MAX_SNAPSHOT_COUNT: usize = 30_000;
/// Shortest health/session interval.
pub const MIN_SNAPSHOT_INTERVAL_MS: u64 = 500;
/// Shortest performance interval.
pub const MIN_PERFORMANCE_INTERVAL_MS: u64 = 5_000;
/// Longest interval of any kind (365 days).
pub const MAX_INTERVAL_MS: u64 = 365 * 24 * 60 * 60 * 1_000;
/// Worker cadence bounds (rotation check, CPU sampling).
pub const MIN_TICK_MS: u64 = 100;
pub const MAX_TICK_MS: u64 = 60_000;
/// Per-command performance history bounds.
pub const MIN_HISTORY_COUNT: usize = 1;
pub const MAX_HISTORY_COUNT: usize = 30_000;
/// Consecutive hot intervals before a spike is reported.
pub const MIN_SPIKE_INTERVALS: usize = 1;
pub const MAX_SPIKE_INTERVALS: usize = 1_000;

pub fn clamp_snapshot_count(count: usize) -> usize {
    count.clamp(MIN_SNAPSHOT_COUNT, MAX_SNAPSHOT_COUNT)
}

pub fn clamp_snapshot_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_SNAPSHOT_INTERVAL_MS, MAX_INTERVAL_MS)
}

pub fn clamp_performance_interval(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_PERFORMANCE_INTERVAL_MS, MAX_INTERVAL_MS)
}

pub fn clamp_tick(interval_ms: u64) -> u64 {
    interval_ms.clamp(MIN_TICK_MS, MAX_TICK_MS)
}

pub fn clamp_history_count(count: usize) -> usize {
    count.clamp(MIN_HISTORY_COUNT, MAX_HISTORY_COUNT)
}

pub fn clamp_spike_intervals(intervals: usize) -> usize {
    intervals.clamp(MIN_SPIKE_INTERVALS, MAX_SPIKE_INTERVALS)
}

/// Validate that no ignore entry is blank.
pub fn validate_ignore_list(entries: &[String]) -> Result<(), ValidationError> {
    if entries.iter().any(|e| e.trim().is_empty()) {
        return Err(ValidationError::new("blank_ignore_entry"));
    }
    Ok(())
}

/// Validate a tracing level name.
pub fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let re = regex::Regex::new("^(?i)(trace|debug|info|warn|error|off)$")
        .map_err(|_| ValidationError::new("invalid_regex"))?;
    if re.is_match(level) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_log_level"))
    }
}
