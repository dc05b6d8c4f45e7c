use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use proptest::prelude::*;
use tracing_test::traced_test;

use gemini_config::MonitorConfig;
use gemini_core::evaluator::{MonitorListener, PercentageEvaluator};
use gemini_core::percentage::PercentageInterval;
use gemini_core::probe::{StaticSystemProbe, StaticThreadProbe, ThreadProbe};
use gemini_core::snapshot::HealthSnapshot;
use gemini_core::time::ManualClock;
use gemini_core::MonitorError;
use gemini_detection::SpikeDetector;
use gemini_telemetry::MetricsRecorder;

use super::Monitor;

const START_MS: u64 = 1_700_000_000_000;

struct Fixture {
    monitor: Monitor,
    clock: ManualClock,
    threads: Arc<StaticThreadProbe>,
}

fn fixture_with(config: MonitorConfig) -> Fixture {
    let clock = ManualClock::new(START_MS);
    let threads = Arc::new(StaticThreadProbe::new());
    let monitor = Monitor::builder(config)
        .clock(Arc::new(clock.clone()))
        .thread_probe(threads.clone())
        .system_probe(Arc::new(StaticSystemProbe::new(512, 1024)))
        .build();
    Fixture {
        monitor,
        clock,
        threads,
    }
}

fn fixture() -> Fixture {
    let mut config = MonitorConfig::default();
    config.health.interval_ms = 1_000;
    config.session.interval_ms = 1_000;
    fixture_with(config)
}

/// Runs one complete request against `command`.
fn request(monitor: &Monitor, command: &str) {
    let ctx = monitor.request_starting("GET /");
    monitor.dispatch_starting(&ctx, command);
    monitor.dispatch_complete(&ctx);
    monitor.request_completing(&ctx);
}

#[derive(Default)]
struct RecordingListener {
    health: Mutex<Vec<HealthSnapshot>>,
    cpu: Mutex<Vec<PercentageInterval>>,
}

impl MonitorListener for RecordingListener {
    fn health_snapshot_exceptional(&self, snapshot: &HealthSnapshot) {
        self.health.lock().push(snapshot.clone());
    }

    fn cpu_utilization_interval_exceptional(&self, interval: &PercentageInterval) {
        self.cpu.lock().push(interval.clone());
    }
}

#[test]
fn test_concurrent_requests_aggregate_into_command() {
    let f = fixture();
    std::thread::scope(|scope| {
        for i in 0..10 {
            let monitor = &f.monitor;
            scope.spawn(move || {
                let ctx = monitor.request_starting("GET /home");
                monitor.dispatch_starting(&ctx, "home");
                monitor.query_starting(&ctx);
                if i < 3 {
                    monitor.query_exception(&ctx);
                }
                monitor.query_completing(&ctx);
                monitor.dispatch_complete(&ctx);
                monitor.request_completing(&ctx);
            });
        }
    });

    let home = f.monitor.command("home").expect("home is monitored");
    assert_eq!(home.current().invocations(), 10);
    assert_eq!(home.current().query_exceptions(), 3);
    assert_eq!(home.current().queries(), 10);
    assert_eq!(home.load(), 0);
    assert!(f.monitor.in_flight_requests().is_empty());

    let health = f.monitor.current_health_snapshot();
    assert_eq!(health.dispatches(), 10);
    assert_eq!(health.query_exceptions(), 3);
}

#[test]
fn test_load_tracks_in_flight_requests() {
    let f = fixture();
    request(&f.monitor, "home");

    let first = f.monitor.request_starting("GET /home");
    f.monitor.dispatch_starting(&first, "home");
    let second = f.monitor.request_starting("GET /home");
    f.monitor.dispatch_starting(&second, "home");
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(2));

    f.monitor.request_completing(&first);
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(1));
    f.monitor.request_completing(&second);
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(0));
}

#[test]
fn test_redispatch_moves_load_between_commands() {
    let f = fixture();
    request(&f.monitor, "login");
    request(&f.monitor, "home");

    let ctx = f.monitor.request_starting("POST /login");
    f.monitor.dispatch_starting(&ctx, "login");
    assert_eq!(f.monitor.command("login").map(|c| c.load()), Some(1));

    f.monitor.redispatch_occurring(&ctx, "login", "home");
    assert_eq!(f.monitor.command("login").map(|c| c.load()), Some(0));
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(1));
    assert_eq!(ctx.sample().dispatch_count(), 2);
    assert_eq!(ctx.sample().command(), Some("home"));

    f.monitor.request_completing(&ctx);
    let home = f.monitor.command("home").unwrap();
    assert_eq!(home.load(), 0);
    assert_eq!(home.current().invocations(), 2);
    assert_eq!(f.monitor.command("login").unwrap().current().invocations(), 1);
}

#[test]
fn test_redispatch_to_unknown_command_carries_no_load() {
    let f = fixture();
    request(&f.monitor, "login");

    let ctx = f.monitor.request_starting("POST /login");
    f.monitor.dispatch_starting(&ctx, "login");
    f.monitor.redispatch_occurring(&ctx, "login", "welcome");
    assert_eq!(ctx.sample().request_load(), 0);
    f.monitor.request_completing(&ctx);

    assert_eq!(f.monitor.command("login").unwrap().load(), 0);
    assert_eq!(f.monitor.command("welcome").unwrap().load(), 0);
}

#[test]
fn test_repeated_dispatch_cycles_hold_one_unit_of_load() {
    let f = fixture();
    request(&f.monitor, "home");
    request(&f.monitor, "login");

    let ctx = f.monitor.request_starting("GET /home");
    f.monitor.dispatch_starting(&ctx, "home");
    f.monitor.dispatch_complete(&ctx);
    f.monitor.dispatch_starting(&ctx, "home");
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(1));
    f.monitor.dispatch_complete(&ctx);
    f.monitor.dispatch_starting(&ctx, "login");
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(0));
    assert_eq!(f.monitor.command("login").map(|c| c.load()), Some(1));
    f.monitor.dispatch_complete(&ctx);
    f.monitor.request_completing(&ctx);

    assert_eq!(ctx.sample().dispatch_count(), 3);
    assert_eq!(f.monitor.command("home").map(|c| c.load()), Some(0));
    assert_eq!(f.monitor.command("login").map(|c| c.load()), Some(0));
}

#[test]
fn test_sample_timings_follow_the_clock() {
    let f = fixture();
    let ctx = f.monitor.request_starting("GET /report");
    f.monitor.dispatch_starting(&ctx, "report");
    f.clock.advance(5);
    f.monitor.special_starting(&ctx);
    f.clock.advance(3);
    f.monitor.special_completing(&ctx);
    f.monitor.query_starting(&ctx);
    f.clock.advance(7);
    f.monitor.query_completing(&ctx);
    f.monitor.render_starting(&ctx, "report.html");
    f.clock.advance(10);
    f.monitor.render_complete(&ctx);
    f.monitor.dispatch_complete(&ctx);

    let live = f.monitor.in_flight_request(ctx.request_number()).unwrap();
    assert_eq!(live.logic_ms(), 15);
    assert_eq!(live.render_ms(), 10);
    assert_eq!(live.special_ms(), 3);
    assert_eq!(live.query_ms(), 7);
    assert_eq!(
        f.monitor
            .in_flight_for_thread(live.thread_id())
            .map(|s| s.request_number()),
        Some(ctx.request_number())
    );

    f.monitor.request_completing(&ctx);
    assert!(f.monitor.in_flight_request(ctx.request_number()).is_none());
    let report = f.monitor.command("report").unwrap();
    assert_eq!(report.current().total_ms(), 25);
    assert_eq!(report.current().renders(), 1);
    assert_eq!(f.monitor.current_health_snapshot().page_renders(), 1);
}

#[test]
fn test_intervals_rotate_without_traffic() {
    let f = fixture();
    f.monitor.session_created();
    f.monitor.session_created();
    f.monitor.session_destroyed();

    f.clock.advance(1_000);
    f.monitor.evaluate_intervals();
    assert!(f.monitor.health_snapshots().is_empty());

    f.clock.advance(1);
    f.monitor.evaluate_intervals();
    let health = f.monitor.health_snapshots();
    assert_eq!(health.len(), 1);
    assert!(health[0].is_closed());
    assert_eq!(health[0].readings().map(|r| r.free_memory), Some(512));

    let sessions = f.monitor.session_snapshots();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].created(), 2);
    assert_eq!(sessions[0].destroyed(), 1);
    assert_eq!(sessions[0].active_at_close(), 1);
    assert_eq!(f.monitor.current_session_snapshot().created(), 0);

    let next = f.monitor.current_health_snapshot();
    assert_eq!(next.start_ms(), START_MS + 1_001);
    assert_eq!(next.end_ms(), START_MS + 2_001);
}

#[test]
fn test_performance_history_pushes_every_command() {
    let f = fixture();
    request(&f.monitor, "home");
    request(&f.monitor, "Search");

    f.clock.advance(3_600_001);
    f.monitor.evaluate_intervals();

    let commands = f.monitor.commands();
    let names: Vec<&str> = commands.iter().map(|c| c.name()).collect();
    assert_eq!(names, vec!["home", "Search"]);
    for command in &commands {
        assert_eq!(command.history().len(), 1);
        assert_eq!(command.history()[0].invocations(), 1);
        assert_eq!(command.current().invocations(), 0);
        assert_eq!(command.lifetime_invocations(), 1);
        assert_eq!(command.current().start_ms() % 3_600_000, 0);
    }
}

#[traced_test]
#[test]
fn test_panicking_evaluator_does_not_block_others() {
    let f = fixture();
    let listener = Arc::new(RecordingListener::default());
    f.monitor
        .add_health_evaluator(|_: &HealthSnapshot| -> Option<String> { panic!("evaluator bug") });
    f.monitor
        .add_health_evaluator(|s: &HealthSnapshot| Some(format!("{} dispatches", s.dispatches())));
    f.monitor.add_listener(listener.clone());

    f.clock.advance(1_001);
    f.monitor.evaluate_intervals();

    let closed = f.monitor.health_snapshots();
    assert_eq!(closed[0].exceptional(), Some("0 dispatches"));
    assert_eq!(listener.health.lock().len(), 1);
    assert!(logs_contain("Caught panic"));
    assert!(logs_contain("evaluator bug"));
}

#[test]
fn test_runtime_reconfiguration_is_clamped() {
    let f = fixture();
    f.monitor.set_health_snapshot_count(1);
    f.monitor.set_health_snapshot_interval(10);
    f.monitor.set_session_snapshot_count(1_000_000);
    f.monitor.set_session_snapshot_interval(u64::MAX);
    assert_eq!(f.monitor.health_snapshot_count(), 2);
    assert_eq!(f.monitor.health_snapshot_interval(), 500);
    assert_eq!(f.monitor.session_snapshot_count(), 30_000);
    assert_eq!(f.monitor.session_snapshot_interval(), 365 * 24 * 60 * 60 * 1_000);

    for _ in 0..4 {
        f.clock.advance(1_001);
        f.monitor.evaluate_intervals();
    }
    assert_eq!(f.monitor.health_snapshots().len(), 2);
    // the interval change applies from the next opened snapshot
    let current = f.monitor.current_health_snapshot();
    assert_eq!(current.end_ms() - current.start_ms(), 500);
}

#[test]
fn test_cpu_spike_reaches_listener() {
    let f = fixture();
    let listener = Arc::new(RecordingListener::default());
    f.monitor.add_percentage_evaluator(SpikeDetector::new(90.0, 2));
    f.monitor.add_listener(listener.clone());
    f.threads.set_thread(7, "hot-worker", 0);
    f.threads.set_thread(8, "idle-worker", 0);

    f.monitor.sample_cpu();
    for _ in 0..3 {
        f.clock.advance(1_000);
        f.threads.advance_cpu(7, 1_000_000_000);
        f.monitor.sample_cpu();
    }

    let current = f.monitor.percentage_interval().unwrap();
    assert_eq!(current.get(7).map(|s| s.usage()), Some(100.0));
    assert_eq!(current.get(8).map(|s| s.usage()), Some(0.0));

    let notified = listener.cpu.lock();
    assert_eq!(notified.len(), 1);
    let report = notified[0].exceptional().unwrap();
    assert!(report.contains("hot-worker"));
    assert!(!report.contains("idle-worker"));
}

struct AlwaysHot;

impl PercentageEvaluator for AlwaysHot {
    fn is_exceptional(&self, _: &PercentageInterval, _: &dyn ThreadProbe) -> Option<String> {
        Some("always hot".to_string())
    }
}

/// Holds every CPU notification until released.
#[derive(Default)]
struct GatedListener {
    open: AtomicBool,
    delivered: AtomicUsize,
}

impl MonitorListener for GatedListener {
    fn cpu_utilization_interval_exceptional(&self, _interval: &PercentageInterval) {
        while !self.open.load(Ordering::Acquire) {
            std::thread::sleep(Duration::from_millis(5));
        }
        self.delivered.fetch_add(1, Ordering::AcqRel);
    }
}

#[traced_test]
#[test]
fn test_slow_listener_does_not_stall_cpu_sampling() {
    let mut config = MonitorConfig::default();
    config.cpu.sample_interval_ms = 60_000;
    let f = fixture_with(config);
    let listener = Arc::new(GatedListener::default());
    f.monitor.add_percentage_evaluator(AlwaysHot);
    f.monitor.add_listener(listener.clone());
    f.threads.set_thread(7, "worker", 0);
    f.monitor.start().unwrap();

    let started = Instant::now();
    for _ in 0..100 {
        f.clock.advance(1_000);
        f.monitor.sample_cpu();
    }
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(logs_contain("Notifier queue full"));

    listener.open.store(true, Ordering::Release);
    f.monitor.stop();
    let delivered = listener.delivered.load(Ordering::Acquire);
    assert!(delivered > 0);
    assert!(delivered < 100);
}

#[test]
fn test_disabled_monitor_records_nothing() {
    let mut config = MonitorConfig::default();
    config.enabled = false;
    let f = fixture_with(config);
    request(&f.monitor, "home");
    f.monitor.session_created();
    assert!(f.monitor.commands().is_empty());
    assert!(f.monitor.in_flight_requests().is_empty());
    assert_eq!(f.monitor.current_session_snapshot().created(), 0);
}

#[test]
fn test_start_and_stop_workers() {
    let mut config = MonitorConfig::default();
    config.rotation_interval_ms = 100;
    config.cpu.sample_interval_ms = 100;
    let f = fixture_with(config);

    f.monitor.start().unwrap();
    assert!(f.monitor.is_running());
    assert!(matches!(f.monitor.start(), Err(MonitorError::AlreadyRunning)));

    f.monitor.stop();
    assert!(!f.monitor.is_running());
    f.monitor.start().unwrap();
    drop(f);
}

#[test]
fn test_metrics_follow_requests() {
    let clock = ManualClock::new(START_MS);
    let monitor = Monitor::builder(MonitorConfig::default())
        .clock(Arc::new(clock.clone()))
        .thread_probe(Arc::new(StaticThreadProbe::new()))
        .system_probe(Arc::new(StaticSystemProbe::new(1, 2)))
        .metrics(MetricsRecorder::new().unwrap())
        .build();

    let ctx = monitor.request_starting("GET /");
    monitor.dispatch_starting(&ctx, "home");
    clock.advance(40);
    monitor.request_completing(&ctx);

    let text = monitor.metrics().unwrap().gather_metrics().unwrap();
    assert!(text.contains("gemini_requests_completed_total 1"));
    assert!(text.contains("gemini_in_flight_requests 0"));
}

proptest! {
    #[test]
    fn prop_balanced_dispatches_return_load_to_zero(
        order in Just((0..16usize).collect::<Vec<_>>()).prop_shuffle(),
        redispatch in proptest::collection::vec(any::<bool>(), 16),
    ) {
        let f = fixture();
        request(&f.monitor, "a");
        request(&f.monitor, "b");

        let contexts: Vec<_> = (0..16)
            .map(|i| {
                let ctx = f.monitor.request_starting("GET /");
                f.monitor.dispatch_starting(&ctx, "a");
                if redispatch[i] {
                    f.monitor.redispatch_occurring(&ctx, "a", "b");
                }
                ctx
            })
            .collect();

        let moved = redispatch.iter().filter(|r| **r).count() as u32;
        prop_assert_eq!(f.monitor.command("a").unwrap().load(), 16 - moved);
        prop_assert_eq!(f.monitor.command("b").unwrap().load(), moved);

        for i in order {
            f.monitor.request_completing(&contexts[i]);
        }
        prop_assert_eq!(f.monitor.command("a").unwrap().load(), 0);
        prop_assert_eq!(f.monitor.command("b").unwrap().load(), 0);
    }
}
