//! ## gemini-telemetry::metrics
//! **Prometheus registry for monitor activity**

use prometheus::{Counter, Gauge, Histogram, HistogramOpts, IntCounterVec, Opts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub requests_completed: Counter,
    pub request_latency: Histogram,
    pub in_flight_requests: Gauge,
    pub exceptional_health_snapshots: Counter,
    pub cpu_spikes: Counter,
    pub interval_rotations: IntCounterVec,
}

impl MetricsRecorder {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let requests_completed =
            Counter::new("gemini_requests_completed_total", "Total completed requests")?;

        let request_latency = Histogram::with_opts(
            HistogramOpts::new("gemini_request_latency_ms", "Request wall time")
                .buckets(vec![1.0, 10.0, 50.0, 100.0, 500.0, 1_000.0, 5_000.0, 30_000.0]),
        )?;

        let in_flight_requests =
            Gauge::new("gemini_in_flight_requests", "Requests currently being handled")?;
        let exceptional_health_snapshots = Counter::new(
            "gemini_exceptional_health_snapshots_total",
            "Health snapshots judged exceptional",
        )?;
        let cpu_spikes = Counter::new(
            "gemini_cpu_spikes_total",
            "CPU utilisation intervals judged exceptional",
        )?;
        let interval_rotations = IntCounterVec::new(
            Opts::new("gemini_interval_rotations_total", "Closed intervals"),
            &["dimension"],
        )?;

        registry.register(Box::new(requests_completed.clone()))?;
        registry.register(Box::new(request_latency.clone()))?;
        registry.register(Box::new(in_flight_requests.clone()))?;
        registry.register(Box::new(exceptional_health_snapshots.clone()))?;
        registry.register(Box::new(cpu_spikes.clone()))?;
        registry.register(Box::new(interval_rotations.clone()))?;

        Ok(Self {
            registry,
            requests_completed,
            request_latency,
            in_flight_requests,
            exceptional_health_snapshots,
            cpu_spikes,
            interval_rotations,
        })
    }

    pub fn gather_metrics(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }

    pub fn request_started(&self) {
        self.in_flight_requests.inc();
    }

    pub fn request_completed(&self, elapsed_ms: u64) {
        self.in_flight_requests.dec();
        self.requests_completed.inc();
        self.request_latency.observe(elapsed_ms as f64);
    }

    pub fn interval_rotated(&self, dimension: &str) {
        self.interval_rotations.with_label_values(&[dimension]).inc();
    }
}
