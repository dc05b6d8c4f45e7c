use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};

use gemini_config::GeminiConfig;
use gemini_core::evaluator::MonitorListener;
use gemini_core::percentage::PercentageInterval;
use gemini_core::snapshot::HealthSnapshot;
use gemini_core::time::to_datetime;
use gemini_detection::{ResourceHealthEvaluator, SpikeDetector};
use gemini_engine::Monitor;
use gemini_simulator::{load_traffic_config, TrafficConfig, TrafficSimulator};
use gemini_telemetry::MetricsRecorder;

#[derive(Parser)]
#[command(version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monitor this process for a fixed duration
    Run(RunArgs),
    /// Run seeded synthetic traffic through a monitor
    Simulate(SimulateArgs),
    /// Print the effective configuration as YAML
    Config,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Seconds to run before printing results
    #[arg(short, long, default_value_t = 10)]
    pub duration: u64,
    /// Spin one thread at full speed to trigger spike detection
    #[arg(long)]
    pub burn: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Optional traffic scenario file; flags below override it
    #[arg(short, long)]
    pub scenario: Option<PathBuf>,
    #[arg(long)]
    pub requests: Option<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Script a thread that burns a full core
    #[arg(long)]
    pub spike: bool,
}

/// Logs every exceptional verdict as it arrives.
struct LoggingListener;

impl MonitorListener for LoggingListener {
    fn health_snapshot_exceptional(&self, snapshot: &HealthSnapshot) {
        warn!(
            start_ms = snapshot.start_ms(),
            reason = snapshot.exceptional().unwrap_or_default(),
            "Exceptional health snapshot"
        );
    }

    fn cpu_utilization_interval_exceptional(&self, interval: &PercentageInterval) {
        warn!(
            timestamp_ms = interval.timestamp_ms(),
            "CPU spike\n{}",
            interval.exceptional().unwrap_or_default()
        );
    }
}

pub async fn run_monitor(args: RunArgs, config: GeminiConfig) -> anyhow::Result<()> {
    let mut builder = Monitor::builder(config.monitor.clone());
    if config.telemetry.metrics {
        builder = builder.metrics(MetricsRecorder::new().context("registering metrics")?);
    }
    let monitor = Arc::new(builder.build());

    if config.monitor.spike.enabled {
        monitor.add_percentage_evaluator(SpikeDetector::from_config(&config.monitor.spike)?);
    }
    if config.monitor.resource_health.is_configured() {
        monitor.add_health_evaluator(ResourceHealthEvaluator::new(
            config.monitor.resource_health.clone(),
        ));
    }
    monitor.add_listener(Arc::new(LoggingListener));
    monitor.start()?;
    info!(
        cores = num_cpus::get(),
        cpu_time = monitor.thread_probe().supports_cpu_time(),
        "Monitoring for {}s",
        args.duration
    );

    let burning = Arc::new(AtomicBool::new(args.burn));
    let burner = if args.burn {
        let flag = burning.clone();
        Some(
            std::thread::Builder::new()
                .name("gemini-burner".into())
                .spawn(move || {
                    let mut x: u64 = 0;
                    while flag.load(Ordering::Relaxed) {
                        x = std::hint::black_box(x.wrapping_mul(6364136223846793005).wrapping_add(1));
                    }
                })?,
        )
    } else {
        None
    };

    // Self-instrumented heartbeat so commands and health counters move.
    let deadline = Instant::now() + Duration::from_secs(args.duration);
    while Instant::now() < deadline {
        let ctx = monitor.request_starting("cli heartbeat");
        monitor.dispatch_starting(&ctx, "heartbeat");
        tokio::time::sleep(Duration::from_millis(100)).await;
        monitor.dispatch_complete(&ctx);
        monitor.request_completing(&ctx);
    }

    burning.store(false, Ordering::Relaxed);
    if let Some(handle) = burner {
        let _ = handle.join();
    }
    let stopping = monitor.clone();
    tokio::task::spawn_blocking(move || stopping.stop()).await?;

    print_summary(&monitor)?;
    Ok(())
}

fn print_summary(monitor: &Monitor) -> anyhow::Result<()> {
    println!("# cores: {}", num_cpus::get());
    println!("# commands");
    print!("{}", serde_yaml::to_string(&monitor.commands())?);
    let current = monitor.current_health_snapshot();
    println!(
        "# current health snapshot ({} .. {})",
        to_datetime(current.start_ms()).format("%Y-%m-%d %H:%M:%S"),
        to_datetime(current.end_ms()).format("%H:%M:%S")
    );
    print!("{}", serde_yaml::to_string(&current)?);

    if let Some(interval) = monitor.percentage_interval() {
        println!("# busiest threads (total {:.1}%)", interval.total_usage());
        let mut samples: Vec<_> = interval.samples().collect();
        samples.sort_by(|a, b| b.usage().total_cmp(&a.usage()));
        for sample in samples.into_iter().take(5) {
            println!(
                "{:>8} {:<24} {:>6.1}% {:>8} ms",
                sample.thread_id(),
                sample.name(),
                sample.usage(),
                sample.cpu_ms()
            );
        }
    }

    if let Some(metrics) = monitor.metrics() {
        println!("# metrics");
        print!("{}", metrics.gather_metrics()?);
    }
    Ok(())
}

pub async fn run_simulation(args: SimulateArgs, config: GeminiConfig) -> anyhow::Result<()> {
    let mut traffic = match &args.scenario {
        Some(path) => load_traffic_config(path)
            .with_context(|| format!("loading scenario {}", path.display()))?,
        None => TrafficConfig::default(),
    };
    if let Some(requests) = args.requests {
        traffic.requests = requests;
    }
    if let Some(seed) = args.seed {
        traffic.seed = seed;
    }
    traffic.spike |= args.spike;

    let report = tokio::task::spawn_blocking(move || {
        TrafficSimulator::new(traffic, config.monitor).map(|mut simulator| simulator.run())
    })
    .await??;

    print!("{}", report.to_yaml()?);
    Ok(())
}

pub fn print_config(config: &GeminiConfig) -> anyhow::Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}
