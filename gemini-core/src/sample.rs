//! ## gemini-core::sample
//! **Per-request timing record**
//!
//! A `Sample` accumulates everything the monitor learns about one logical
//! request across any number of dispatch and redispatch cycles. Timestamps
//! are supplied by the caller so the record stays clock-agnostic.

use serde::Serialize;

const NANOS_PER_MILLI: u64 = 1_000_000;

#[derive(Debug, Clone, Serialize)]
pub struct Sample {
    request_number: u64,
    thread_id: u64,
    signature: String,
    start_ms: u64,
    end_ms: Option<u64>,
    command: Option<String>,
    render_target: Option<String>,
    dispatch_count: u32,
    query_count: u32,
    query_exceptions: u32,
    query_ms: u64,
    #[serde(skip)]
    query_started: Option<u64>,
    special_ms: u64,
    #[serde(skip)]
    special_started: Option<u64>,
    logic_ms: Option<u64>,
    #[serde(skip)]
    render_started: Option<u64>,
    render_ms: Option<u64>,
    cpu_start_nanos: u64,
    cpu_end_nanos: u64,
    request_load: u32,
}

impl Sample {
    pub fn new(
        request_number: u64,
        thread_id: u64,
        signature: impl Into<String>,
        start_ms: u64,
        cpu_start_nanos: u64,
    ) -> Self {
        Self {
            request_number,
            thread_id,
            signature: signature.into(),
            start_ms,
            end_ms: None,
            command: None,
            render_target: None,
            dispatch_count: 0,
            query_count: 0,
            query_exceptions: 0,
            query_ms: 0,
            query_started: None,
            special_ms: 0,
            special_started: None,
            logic_ms: None,
            render_started: None,
            render_ms: None,
            cpu_start_nanos,
            cpu_end_nanos: cpu_start_nanos,
            request_load: 1,
        }
    }

    /// Records a (re)dispatch to `command`.
    pub fn dispatch_starting(&mut self, command: impl Into<String>) {
        self.dispatch_count += 1;
        self.command = Some(command.into());
    }

    pub fn set_request_load(&mut self, load: u32) {
        self.request_load = load;
    }

    /// Fixes the logic time on first call; later calls return the stored value.
    pub fn logic_complete(&mut self, now_ms: u64) -> u64 {
        let start = self.start_ms;
        *self
            .logic_ms
            .get_or_insert_with(|| now_ms.saturating_sub(start))
    }

    /// Marks the start of view rendering, which also ends the logic phase.
    pub fn render_starting(&mut self, target: impl Into<String>, now_ms: u64) {
        self.logic_complete(now_ms);
        self.render_target = Some(target.into());
        if self.render_started.is_none() {
            self.render_started = Some(now_ms);
        }
    }

    /// Fixes the render time on the first call after `render_starting`.
    pub fn render_complete(&mut self, now_ms: u64) -> Option<u64> {
        if self.render_ms.is_none() {
            if let Some(started) = self.render_started {
                self.render_ms = Some(now_ms.saturating_sub(started));
            }
        }
        self.render_ms
    }

    pub fn query_starting(&mut self, now_ms: u64) {
        self.query_started = Some(now_ms);
    }

    pub fn query_completing(&mut self, now_ms: u64) {
        self.query_count += 1;
        if let Some(started) = self.query_started.take() {
            self.query_ms += now_ms.saturating_sub(started);
        }
    }

    pub fn query_exception(&mut self) {
        self.query_exceptions += 1;
    }

    pub fn special_starting(&mut self, now_ms: u64) {
        self.special_started = Some(now_ms);
    }

    pub fn special_completing(&mut self, now_ms: u64) {
        if let Some(started) = self.special_started.take() {
            self.special_ms += now_ms.saturating_sub(started);
        }
    }

    /// Closes the sample. Safe to call more than once; the first call wins.
    pub fn complete(&mut self, now_ms: u64, cpu_end_nanos: u64) {
        if self.end_ms.is_some() {
            return;
        }
        self.logic_complete(now_ms);
        self.render_complete(now_ms);
        self.end_ms = Some(now_ms);
        self.cpu_end_nanos = cpu_end_nanos;
    }

    pub fn request_number(&self) -> u64 {
        self.request_number
    }

    pub fn thread_id(&self) -> u64 {
        self.thread_id
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn start_ms(&self) -> u64 {
        self.start_ms
    }

    pub fn end_ms(&self) -> Option<u64> {
        self.end_ms
    }

    pub fn command(&self) -> Option<&str> {
        self.command.as_deref()
    }

    pub fn render_target(&self) -> Option<&str> {
        self.render_target.as_deref()
    }

    pub fn dispatch_count(&self) -> u32 {
        self.dispatch_count
    }

    pub fn query_count(&self) -> u32 {
        self.query_count
    }

    pub fn query_exceptions(&self) -> u32 {
        self.query_exceptions
    }

    pub fn query_ms(&self) -> u64 {
        self.query_ms
    }

    pub fn special_ms(&self) -> u64 {
        self.special_ms
    }

    pub fn logic_ms(&self) -> u64 {
        self.logic_ms.unwrap_or(0)
    }

    pub fn render_ms(&self) -> u64 {
        self.render_ms.unwrap_or(0)
    }

    pub fn is_rendered(&self) -> bool {
        self.render_started.is_some()
    }

    pub fn request_load(&self) -> u32 {
        self.request_load
    }

    /// Elapsed wall time, measured to `now_ms` while the request is in flight.
    pub fn elapsed_ms(&self, now_ms: u64) -> u64 {
        self.end_ms.unwrap_or(now_ms).saturating_sub(self.start_ms)
    }

    /// Total wall time of a completed request.
    pub fn total_ms(&self) -> u64 {
        self.end_ms
            .map(|end| end.saturating_sub(self.start_ms))
            .unwrap_or(0)
    }

    /// CPU time consumed by the request thread. Never negative; deltas under
    /// a millisecond round to zero.
    pub fn cpu_ms(&self) -> u64 {
        self.cpu_end_nanos.saturating_sub(self.cpu_start_nanos) / NANOS_PER_MILLI
    }
}
