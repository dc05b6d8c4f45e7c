//! Resource health thresholds applied to closed health snapshots.

use serde::{Deserialize, Serialize};
use validator::{self, Validate};

/// Each threshold is optional; an unset threshold never fires.
#[derive(Debug, Default, Serialize, Deserialize, Validate, Clone, PartialEq)]
pub struct ResourceHealthConfig {
    /// Flag when `free / total` memory drops below this fraction.
    #[validate(range(min = 0.0, max = 1.0))]
    #[serde(default)]
    pub min_free_memory_ratio: Option<f64>,

    /// Flag when the live thread count exceeds this.
    #[validate(range(min = 1))]
    #[serde(default)]
    pub max_threads: Option<usize>,

    /// Flag when an interval saw more query exceptions than this.
    #[serde(default)]
    pub max_query_exceptions: Option<u64>,
}

impl ResourceHealthConfig {
    pub fn is_configured(&self) -> bool {
        self.min_free_memory_ratio.is_some()
            || self.max_threads.is_some()
            || self.max_query_exceptions.is_some()
    }
}
