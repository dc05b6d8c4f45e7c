//! Sustained CPU spike detection parameters.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

use crate::error::ConfigError;
use crate::validation::{self, validate_ignore_list};

/// Spike detector configuration.
#[derive(Debug, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct SpikeConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-thread usage (percent of one core) that counts as hot.
    #[validate(range(min = 1.0, max = 10_000.0))]
    #[serde(default = "default_threshold")]
    pub threshold_percent: f64,

    /// Consecutive hot intervals before a thread is reported (clamped to
    /// 1..=1000).
    #[serde(default = "default_intervals")]
    pub intervals: usize,

    /// Thread names never reported.
    #[validate(custom(function = "validate_ignore_list"))]
    #[serde(default)]
    pub ignore_threads: Vec<String>,

    /// Stack substrings that suppress a report.
    #[validate(custom(function = "validate_ignore_list"))]
    #[serde(default)]
    pub ignore_stacks: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    90.0
}

fn default_intervals() -> usize {
    5
}

impl Default for SpikeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_percent: default_threshold(),
            intervals: default_intervals(),
            ignore_threads: Vec::new(),
            ignore_stacks: Vec::new(),
        }
    }
}

impl SpikeConfig {
    pub fn clamp(&mut self) {
        self.intervals = validation::clamp_spike_intervals(self.intervals);
    }

    /// Builds a configuration from flat `key = value` properties under
    /// `prefix`, e.g. `prefix.Threshold`, `prefix.Intervals`,
    /// `prefix.Ignore1`, `prefix.IgnoreStack1`. Numbered keys are read from 1
    /// up to the first absent index. Missing scalar keys keep their defaults.
    pub fn from_properties(
        properties: &HashMap<String, String>,
        prefix: &str,
    ) -> Result<Self, ConfigError> {
        let key = |name: &str| {
            if prefix.is_empty() {
                name.to_string()
            } else {
                format!("{prefix}.{name}")
            }
        };

        let mut config = Self::default();
        if let Some(threshold) = parse_property(properties, &key("Threshold"))? {
            config.threshold_percent = threshold;
        }
        if let Some(intervals) = parse_property(properties, &key("Intervals"))? {
            config.intervals = intervals;
        }
        if let Some(enabled) = parse_property(properties, &key("Enabled"))? {
            config.enabled = enabled;
        }
        config.ignore_threads = numbered(properties, &key("Ignore"));
        config.ignore_stacks = numbered(properties, &key("IgnoreStack"));

        config.clamp();
        config.validate()?;
        Ok(config)
    }
}

fn parse_property<T: FromStr>(
    properties: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match properties.get(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Property {
                key: key.to_string(),
                value: raw.clone(),
            }),
    }
}

fn numbered(properties: &HashMap<String, String>, stem: &str) -> Vec<String> {
    (1..)
        .map_while(|n| properties.get(&format!("{stem}{n}")))
        .map(|value| value.trim().to_string())
        .collect()
}
