//! # Gemini Configuration
//!
//! Layered configuration for the Gemini application monitor.
//!
//! ## Layers
//! - **Defaults**: every field has a serde default
//! - **Files**: `config/gemini.yaml`, then `config/<GEMINI_ENV>.yaml`
//! - **Environment**: `GEMINI_*` variables, nested with `__`
//!
//! Bounded values (snapshot counts, interval lengths, worker cadences and
//! history sizes) are clamped into range after extraction; everything else
//! is validated.

#![warn(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use validator::Validate;

mod error;
mod health;
mod monitor;
mod spike;
mod telemetry;
pub mod validation;

pub use error::ConfigError;
pub use health::ResourceHealthConfig;
pub use monitor::{CpuConfig, MonitorConfig, PerformanceConfig, SnapshotConfig};
pub use spike::SpikeConfig;
pub use telemetry::TelemetryConfig;

const BASE_FILE: &str = "config/gemini.yaml";
const ENV_PREFIX: &str = "GEMINI_";

/// Top-level configuration container.
#[derive(Debug, Serialize, Deserialize, Validate, Default, Clone)]
pub struct GeminiConfig {
    /// Monitor dimensions, sampler and evaluators.
    #[validate(nested)]
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Logging and metrics.
    #[validate(nested)]
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

impl GeminiConfig {
    /// Load configuration from default files and environment.
    ///
    /// Hierarchy:
    /// 1. Default values
    /// 2. `config/gemini.yaml`, if present
    /// 3. `config/<environment>.yaml`, environment from `GEMINI_ENV` (default `production`)
    /// 4. `GEMINI_*` environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(GeminiConfig::default()));

        if Path::new(BASE_FILE).exists() {
            figment = figment.merge(Yaml::file(BASE_FILE));
        }

        let env = std::env::var("GEMINI_ENV").unwrap_or_else(|_| "production".into());
        let env_file = format!("config/{}.yaml", env);
        if Path::new(&env_file).exists() {
            figment = figment.merge(Yaml::file(env_file));
        }

        Self::finish(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Load configuration from a specific file layered over the defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::FileNotFound(PathBuf::from(path)));
        }

        Self::finish(
            Figment::from(Serialized::defaults(GeminiConfig::default()))
                .merge(Yaml::file(path))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn finish(figment: Figment) -> Result<Self, ConfigError> {
        let mut config: Self = figment.extract()?;
        config.monitor.clamp();
        config.validate()?;
        Ok(config)
    }
}
