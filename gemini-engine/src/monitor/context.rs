//! Per-request handle passed through the request-handling call chain.

use std::sync::Arc;

use gemini_core::sample::Sample;
use parking_lot::{Mutex, MutexGuard};

/// Owns the [`Sample`] for one in-flight request. Clones share the sample;
/// the monitor keeps one clone in its in-flight registry until completion.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_number: u64,
    sample: Arc<Mutex<Sample>>,
}

impl RequestContext {
    pub(crate) fn new(sample: Sample) -> Self {
        Self {
            request_number: sample.request_number(),
            sample: Arc::new(Mutex::new(sample)),
        }
    }

    pub fn request_number(&self) -> u64 {
        self.request_number
    }

    /// Copy of the sample as it stands now.
    pub fn sample(&self) -> Sample {
        self.sample.lock().clone()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Sample> {
        self.sample.lock()
    }
}
