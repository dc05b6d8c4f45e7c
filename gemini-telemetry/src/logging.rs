//! ## gemini-telemetry::logging
//! **Structured logging with tracing and OpenTelemetry key/values**
//!
//! Monitor events (exceptional snapshots, CPU spikes, lifecycle changes) are
//! emitted inside an `info_span` tagged with the event kind so that any
//! subscriber can route them.

use opentelemetry::KeyValue;
use tracing::info_span;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Clone)]
pub struct EventLogger;

impl EventLogger {
    /// Installs the global fmt subscriber. `RUST_LOG` wins over
    /// `default_level`. Returns false if a subscriber was already set.
    pub fn init(default_level: &str) -> bool {
        fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new(default_level)),
            )
            .with_thread_names(true)
            .with_span_events(FmtSpan::ENTER)
            .try_init()
            .is_ok()
    }

    #[inline]
    pub fn log_event(event_type: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "monitor_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        span.in_scope(|| {
            tracing::info!(
                metadata = ?metadata,
                "Monitor event occurred"
            );
        });
    }

    /// Same as [`EventLogger::log_event`] at warn level, for exceptional verdicts.
    pub fn log_exceptional(event_type: &str, reason: &str, metadata: Vec<KeyValue>) {
        let span = info_span!(
            "monitor_event",
            event_type = event_type,
            otel.kind = "INTERNAL"
        );

        span.in_scope(|| {
            tracing::warn!(
                metadata = ?metadata,
                reason = reason,
                "Exceptional interval"
            );
        });
    }
}
