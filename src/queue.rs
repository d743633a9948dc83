//! Bounded FIFO task queue gated by a set of rate windows.

use std::collections::VecDeque;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use tracing::trace;

use crate::ratelimit::{RateLimitRule, RateWindowSet};
use crate::scheduler::Task;

/// Discrete status of the queue, computed atomically under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// At least one task is queued and the rate windows admit now.
    Available,
    /// No tasks are queued.
    Empty,
    /// Tasks are queued but rate-gated; `retry_after` is the estimated
    /// number of seconds until the next admission.
    Unavailable { retry_after: u64 },
    /// Tasks are queued and gated, but no wait time can be computed.
    /// Callers should treat this as immediately retryable.
    NotStarted,
}

struct Inner {
    tasks: VecDeque<Task>,
    windows: RateWindowSet,
}

/// A thread-safe FIFO of tasks whose dequeue side is gated by rate windows.
///
/// One exclusive lock covers both the task sequence and the rate counters,
/// so no caller ever observes a partially-updated queue, and check-and-pop
/// in [`get`](GatedQueue::get) is a single atomic critical section.
pub struct GatedQueue {
    queue_limit: Option<usize>,
    inner: Mutex<Inner>,
}

impl GatedQueue {
    /// Create a queue gated by `rules`, holding at most `queue_limit` tasks
    /// (unbounded if `None`). Rules are assumed validated by the caller.
    pub fn new(rules: &[RateLimitRule], queue_limit: Option<usize>) -> Self {
        Self {
            queue_limit,
            inner: Mutex::new(Inner {
                tasks: VecDeque::new(),
                windows: RateWindowSet::new(rules),
            }),
        }
    }

    /// Append as many whole tasks as fit under the queue limit, silently
    /// dropping the rest. Returns the number actually appended.
    pub fn put(&self, tasks: Vec<Task>) -> usize {
        let mut inner = self.inner.lock();
        let room = match self.queue_limit {
            Some(limit) => limit.saturating_sub(inner.tasks.len()),
            None => tasks.len(),
        };
        let accepted = tasks.len().min(room);
        for task in tasks.into_iter().take(accepted) {
            inner.tasks.push_back(task);
        }
        trace!(accepted, queued = inner.tasks.len(), "Enqueued tasks");
        accepted
    }

    /// Current status of the queue. Read-only: repeated calls have no
    /// side effects on the rate counters or queue contents.
    pub fn status(&self) -> QueueStatus {
        let inner = self.inner.lock();
        let now = now_secs();
        if inner.tasks.is_empty() {
            QueueStatus::Empty
        } else if inner.windows.can_admit(now) {
            QueueStatus::Available
        } else {
            match inner.windows.time_until_ready(now) {
                Some(retry_after) => QueueStatus::Unavailable { retry_after },
                None => QueueStatus::NotStarted,
            }
        }
    }

    /// Pop the head task if the rate windows admit one more execution now,
    /// recording the admission. Returns `None` when the queue is empty or
    /// rate-gated.
    pub fn get(&self) -> Option<Task> {
        let mut inner = self.inner.lock();
        let now = now_secs();
        if !inner.tasks.is_empty() && inner.windows.can_admit(now) {
            inner.windows.record_admission(now);
            inner.tasks.pop_front()
        } else {
            None
        }
    }

    /// Number of tasks currently queued.
    pub fn len(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    /// Returns true when no tasks are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Wall clock in epoch seconds, rounded up to the next whole second so the
/// limiter errs on the conservative side.
fn now_secs() -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs() + u64::from(now.subsec_nanos() > 0)
}
