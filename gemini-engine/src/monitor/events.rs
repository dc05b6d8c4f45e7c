//! Inbound request and session events.
//!
//! Lock order is always monitor state first, then the request's sample.
//! Events that touch only the sample never take the state lock.

use tracing::{instrument, trace};

use super::{Monitor, RequestContext};
use gemini_core::sample::Sample;

impl Monitor {
    fn current_cpu_nanos(&self) -> u64 {
        let probe = &self.inner.thread_probe;
        if probe.supports_cpu_time() {
            probe.current_thread_cpu_nanos()
        } else {
            0
        }
    }

    /// Opens a sample for a new request on the calling thread.
    pub fn request_starting(&self, signature: &str) -> RequestContext {
        let number = self
            .inner
            .next_request
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let sample = Sample::new(
            number,
            self.inner.thread_probe.current_thread_id(),
            signature,
            self.inner.clock.now_ms(),
            self.current_cpu_nanos(),
        );
        let ctx = RequestContext::new(sample);
        if !self.inner.config.enabled {
            return ctx;
        }

        trace!(request = number, signature, "Request starting");
        self.inner.state.lock().in_flight.insert(number, ctx.clone());
        if let Some(metrics) = &self.inner.metrics {
            metrics.request_started();
        }
        ctx
    }

    /// Closes the request's sample, folds it into the aggregates and checks
    /// interval boundaries.
    #[instrument(level = "trace", skip_all, fields(request = ctx.request_number()))]
    pub fn request_completing(&self, ctx: &RequestContext) {
        if !self.inner.config.enabled {
            return;
        }
        let now = self.inner.clock.now_ms();
        let cpu = self.current_cpu_nanos();

        let total_ms = {
            let mut state = self.inner.state.lock();
            let mut sample = ctx.lock();
            sample.complete(now, cpu);
            if state.in_flight.remove(&ctx.request_number()).is_none() {
                // completed twice
                return;
            }
            state.record_completion(&sample);
            sample.total_ms()
        };

        if let Some(metrics) = &self.inner.metrics {
            metrics.request_completed(total_ms);
        }
        self.evaluate_intervals();
    }

    pub fn dispatch_starting(&self, ctx: &RequestContext, command: &str) {
        if !self.inner.config.enabled {
            return;
        }
        let mut state = self.inner.state.lock();
        let mut sample = ctx.lock();
        // A later dispatch cycle in the same request replaces the earlier load.
        if let Some(previous) = sample.command().map(str::to_string) {
            state.release_load(&previous, sample.request_load());
        }
        sample.dispatch_starting(command);
        state.apply_dispatch_load(&mut sample, command);
        if state.health.enabled {
            state.health.current.increment_dispatches();
        }
    }

    /// The request moved from `previous` to `next` without completing.
    pub fn redispatch_occurring(&self, ctx: &RequestContext, previous: &str, next: &str) {
        if !self.inner.config.enabled {
            return;
        }
        let mut state = self.inner.state.lock();
        let mut sample = ctx.lock();
        sample.dispatch_starting(next);
        state.release_load(previous, sample.request_load());
        state.apply_dispatch_load(&mut sample, next);
        if state.health.enabled {
            state.health.current.increment_dispatches();
        }
    }

    /// Command logic finished; fixes the logic time if rendering has not.
    pub fn dispatch_complete(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().logic_complete(now);
    }

    pub fn render_starting(&self, ctx: &RequestContext, target: &str) {
        if !self.inner.config.enabled {
            return;
        }
        let now = self.inner.clock.now_ms();
        let mut state = self.inner.state.lock();
        ctx.lock().render_starting(target, now);
        if state.health.enabled {
            state.health.current.increment_page_renders();
        }
    }

    pub fn render_complete(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().render_complete(now);
    }

    pub fn query_starting(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().query_starting(now);
    }

    pub fn query_completing(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().query_completing(now);
    }

    pub fn query_exception(&self, ctx: &RequestContext) {
        ctx.lock().query_exception();
    }

    pub fn special_starting(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().special_starting(now);
    }

    pub fn special_completing(&self, ctx: &RequestContext) {
        let now = self.inner.clock.now_ms();
        ctx.lock().special_completing(now);
    }

    pub fn session_created(&self) {
        if !self.inner.config.enabled {
            return;
        }
        let mut state = self.inner.state.lock();
        state.active_sessions += 1;
        if state.session.enabled {
            state.session.current.session_created();
        }
    }

    pub fn session_destroyed(&self) {
        if !self.inner.config.enabled {
            return;
        }
        let mut state = self.inner.state.lock();
        state.active_sessions = state.active_sessions.saturating_sub(1);
        if state.session.enabled {
            state.session.current.session_destroyed();
        }
    }
}
