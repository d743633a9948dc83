//! Scheduler facade wiring the gated queue, the availability poller, and
//! the worker pool together.

mod poller;
mod pool;
mod signal;
mod task;

pub use task::Task;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{FloodgateError, Result};
use crate::queue::{GatedQueue, QueueStatus};
use crate::ratelimit::RateLimitRule;

use poller::AvailabilityPoller;
use pool::WorkerPool;
use signal::{ShutdownToken, WakeSignal};

/// Round-robin rotation over a fixed set of credentials.
///
/// The cursor has its own lock, independent of the queue lock: it is a
/// read-modify-write per dequeued task and unrelated to queue admission.
pub(crate) struct CredentialRotation {
    credentials: Vec<String>,
    cursor: Mutex<usize>,
}

impl CredentialRotation {
    fn new(credentials: Vec<String>) -> Self {
        Self {
            credentials,
            cursor: Mutex::new(0),
        }
    }

    /// The next credential in rotation, advancing the cursor exactly once
    /// and wrapping modulo the credential count.
    pub(crate) fn next(&self) -> String {
        let mut cursor = self.cursor.lock();
        let credential = self.credentials[*cursor].clone();
        *cursor = (*cursor + 1) % self.credentials.len();
        credential
    }
}

/// Rate-gated task scheduler over a fixed pool of worker threads.
///
/// Tasks submitted through [`submit`](Scheduler::submit) are drained FIFO,
/// subject to every configured rate rule. With more than one credential
/// configured, each rule's count is scaled by the credential count, since
/// each credential is independently rate-limited upstream and the local
/// limiter models the aggregate.
pub struct Scheduler {
    queue: Arc<GatedQueue>,
    signal: Arc<WakeSignal>,
    shutdown: Arc<ShutdownToken>,
    rotation: Option<Arc<CredentialRotation>>,
    num_threads: usize,
    poll_interval: Duration,
    started: AtomicBool,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Create a scheduler from a validated configuration.
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;

        let rules = scale_rules(&config.rate_limits, config.credentials.len());
        let rotation = if config.credentials.is_empty() {
            None
        } else {
            Some(Arc::new(CredentialRotation::new(config.credentials)))
        };

        Ok(Self {
            queue: Arc::new(GatedQueue::new(&rules, config.queue_limit)),
            signal: Arc::new(WakeSignal::new()),
            shutdown: Arc::new(ShutdownToken::new()),
            rotation,
            num_threads: config.num_threads,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            started: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Enqueue tasks, returning the number actually accepted. Thread-safe
    /// and non-blocking; tasks beyond the queue limit are dropped and the
    /// returned count is the caller's signal to re-batch.
    pub fn submit(&self, tasks: Vec<Task>) -> usize {
        let offered = tasks.len();
        let accepted = self.queue.put(tasks);
        if accepted < offered {
            warn!(offered, accepted, "Queue full, dropped excess tasks");
        }
        accepted
    }

    /// Launch the availability poller and the worker pool. Non-blocking.
    ///
    /// The queue is normally seeded before this call, though `submit`
    /// stays safe afterwards. A second call fails with `AlreadyStarted`
    /// rather than duplicating pollers and pools.
    pub fn start(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(FloodgateError::AlreadyStarted);
        }

        info!(
            num_threads = self.num_threads,
            pending = self.queue.len(),
            "Starting scheduler"
        );

        let poller = AvailabilityPoller::new(
            self.queue.clone(),
            self.signal.clone(),
            self.shutdown.clone(),
            self.poll_interval,
        );
        let pool = WorkerPool::new(
            self.num_threads,
            self.queue.clone(),
            self.signal.clone(),
            self.shutdown.clone(),
            self.rotation.clone(),
        );

        let mut handles = self.handles.lock();
        handles.push(poller.spawn()?);
        handles.extend(pool.spawn()?);
        Ok(())
    }

    /// Trigger shutdown and join the poller and all workers. A worker
    /// mid-invocation finishes its current task first.
    pub fn shutdown(&self) {
        debug!("Shutting down scheduler");
        self.shutdown.trigger();
        self.signal.notify_all();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("Scheduler thread panicked during shutdown");
            }
        }
        info!("Scheduler stopped");
    }

    /// Current status of the underlying queue.
    pub fn status(&self) -> QueueStatus {
        self.queue.status()
    }

    /// Number of tasks waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

/// Scale every rule's count by the credential count when more than one
/// credential is configured.
fn scale_rules(rules: &[RateLimitRule], credentials: usize) -> Vec<RateLimitRule> {
    if credentials > 1 {
        rules.iter().map(|r| r.scaled(credentials as u32)).collect()
    } else {
        rules.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::sync::atomic::AtomicUsize;
    use std::time::Instant;

    /// Poll `predicate` until it holds or `timeout` elapses.
    fn wait_until<F: Fn() -> bool>(predicate: F, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if predicate() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        predicate()
    }

    fn config_with_threads(num_threads: usize) -> SchedulerConfig {
        SchedulerConfig {
            num_threads,
            poll_interval_ms: 50,
            ..Default::default()
        }
    }

    #[test]
    fn test_rotation_wraps_round_robin() {
        let rotation = CredentialRotation::new(vec![
            "a".to_string(),
            "b".to_string(),
            "c".to_string(),
        ]);
        assert_eq!(rotation.next(), "a");
        assert_eq!(rotation.next(), "b");
        assert_eq!(rotation.next(), "c");
        assert_eq!(rotation.next(), "a");
    }

    #[test]
    fn test_scale_rules_multiplies_by_credential_count() {
        let rules = [RateLimitRule::new(10, 10), RateLimitRule::new(500, 600)];

        let scaled = scale_rules(&rules, 3);
        assert_eq!(scaled[0], RateLimitRule::new(30, 10));
        assert_eq!(scaled[1], RateLimitRule::new(1500, 600));

        // A single credential does not multiply anything.
        assert_eq!(scale_rules(&rules, 1), rules.to_vec());
        assert_eq!(scale_rules(&rules, 0), rules.to_vec());
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let config = SchedulerConfig {
            rate_limits: vec![RateLimitRule::new(5, 0)],
            ..Default::default()
        };
        assert!(Scheduler::new(config).is_err());
    }

    #[test]
    fn test_start_twice_fails() {
        let scheduler = Scheduler::new(config_with_threads(1)).unwrap();
        scheduler.start().unwrap();
        assert!(matches!(
            scheduler.start(),
            Err(FloodgateError::AlreadyStarted)
        ));
        scheduler.shutdown();
    }

    #[test]
    fn test_drains_every_task_exactly_once() {
        let scheduler = Scheduler::new(config_with_threads(4)).unwrap();
        let executed = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..500)
            .map(|i| {
                let executed = executed.clone();
                Task::new(move |_| executed.lock().push(i))
            })
            .collect();
        assert_eq!(scheduler.submit(tasks), 500);

        scheduler.start().unwrap();
        assert!(wait_until(
            || executed.lock().len() == 500,
            Duration::from_secs(10)
        ));
        scheduler.shutdown();

        let mut seen = executed.lock().clone();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn test_submit_after_start() {
        let scheduler = Scheduler::new(config_with_threads(2)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));
        scheduler.start().unwrap();

        let captured = count.clone();
        scheduler.submit(vec![Task::new(move |_| {
            captured.fetch_add(1, Ordering::SeqCst);
        })]);

        assert!(wait_until(
            || count.load(Ordering::SeqCst) == 1,
            Duration::from_secs(5)
        ));
        scheduler.shutdown();
    }

    #[test]
    fn test_credentials_injected_in_rotation_order() {
        let config = SchedulerConfig {
            credentials: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..config_with_threads(1)
        };
        let scheduler = Scheduler::new(config).unwrap();
        let injected = Arc::new(Mutex::new(Vec::new()));

        let tasks = (0..4)
            .map(|_| {
                let injected = injected.clone();
                Task::new(move |credential| injected.lock().push(credential))
            })
            .collect();
        scheduler.submit(tasks);

        scheduler.start().unwrap();
        assert!(wait_until(
            || injected.lock().len() == 4,
            Duration::from_secs(5)
        ));
        scheduler.shutdown();

        let seen: Vec<_> = injected
            .lock()
            .iter()
            .map(|c| c.clone().unwrap())
            .collect();
        assert_eq!(seen, vec!["a", "b", "c", "a"]);
    }

    #[test]
    fn test_panicking_task_does_not_kill_worker() {
        let scheduler = Scheduler::new(config_with_threads(1)).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let ok_task = |count: &Arc<AtomicUsize>| {
            let captured = count.clone();
            Task::new(move |_| {
                captured.fetch_add(1, Ordering::SeqCst);
            })
        };
        scheduler.submit(vec![
            ok_task(&count),
            Task::new(|_| panic!("task blew up")),
            ok_task(&count),
        ]);

        scheduler.start().unwrap();
        assert!(wait_until(
            || count.load(Ordering::SeqCst) == 2,
            Duration::from_secs(5)
        ));
        scheduler.shutdown();
    }

    #[test]
    #[serial]
    fn test_rate_gated_drain_is_paced() {
        let config = SchedulerConfig {
            rate_limits: vec![RateLimitRule::new(2, 2)],
            ..config_with_threads(1)
        };
        let scheduler = Scheduler::new(config).unwrap();
        let count = Arc::new(AtomicUsize::new(0));

        let tasks = (0..5)
            .map(|_| {
                let captured = count.clone();
                Task::new(move |_| {
                    captured.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();
        scheduler.submit(tasks);

        let started_at = Instant::now();
        scheduler.start().unwrap();
        assert!(wait_until(
            || count.load(Ordering::SeqCst) == 5,
            Duration::from_secs(20)
        ));
        let elapsed = started_at.elapsed();
        scheduler.shutdown();

        // Five tasks at 2 per 2 seconds need two window rollovers. The
        // one-second clock granularity makes each rollover at least one
        // second long.
        assert!(
            elapsed >= Duration::from_secs(2),
            "drained too fast: {:?}",
            elapsed
        );
        assert!(elapsed < Duration::from_secs(15), "drain stalled: {:?}", elapsed);
    }

    #[test]
    fn test_shutdown_joins_all_threads() {
        let scheduler = Scheduler::new(config_with_threads(3)).unwrap();
        scheduler.start().unwrap();
        scheduler.shutdown();
        assert!(scheduler.handles.lock().is_empty());
    }
}
