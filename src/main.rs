use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{debug, info, Level};

use floodgate::config::SchedulerConfig;
use floodgate::scheduler::{Scheduler, Task};

/// Seed the scheduler with synthetic tasks and drain them, reporting
/// throughput. Useful for smoke-testing a rate limit configuration.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a YAML scheduler configuration
    #[arg(short, long)]
    config: Option<String>,

    /// Number of synthetic tasks to enqueue
    #[arg(long, default_value_t = 100)]
    tasks: usize,
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    info!("Starting Floodgate scheduler");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = match &args.config {
        Some(path) => SchedulerConfig::from_file(path)?,
        None => SchedulerConfig::default(),
    };
    info!(
        num_threads = config.num_threads,
        rate_limits = config.rate_limits.len(),
        credentials = config.credentials.len(),
        "Configuration loaded"
    );

    let scheduler = Scheduler::new(config)?;
    let completed = Arc::new(AtomicUsize::new(0));

    let tasks: Vec<Task> = (0..args.tasks)
        .map(|i| {
            let completed = completed.clone();
            Task::new(move |credential| {
                debug!(task = i, credential = credential.as_deref(), "Task ran");
                completed.fetch_add(1, Ordering::SeqCst);
            })
        })
        .collect();

    let accepted = scheduler.submit(tasks);
    info!(accepted, offered = args.tasks, "Tasks enqueued");

    let started_at = Instant::now();
    scheduler.start()?;

    while completed.load(Ordering::SeqCst) < accepted {
        std::thread::sleep(Duration::from_millis(100));
    }
    let elapsed = started_at.elapsed();

    scheduler.shutdown();
    info!(
        completed = completed.load(Ordering::SeqCst),
        elapsed_secs = elapsed.as_secs_f64(),
        tasks_per_sec = accepted as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
        "Drain complete"
    );

    Ok(())
}
