//! Synchronization primitives bridging the poller, the workers, and
//! shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Condition shared by the poller and the workers. The poller signals it
/// when the queue reports capacity; workers wait on it and re-check the
/// queue themselves after every wake.
pub(crate) struct WakeSignal {
    pub(crate) lock: Mutex<()>,
    pub(crate) condvar: Condvar,
}

impl WakeSignal {
    pub(crate) fn new() -> Self {
        Self {
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Wake every waiting worker. The lock is taken so a worker that just
    /// failed a dequeue cannot miss the notification between its check and
    /// its wait.
    pub(crate) fn notify_all(&self) {
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }
}

/// Cooperative shutdown token checked at every wait and sleep boundary.
pub(crate) struct ShutdownToken {
    triggered: AtomicBool,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl ShutdownToken {
    pub(crate) fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    pub(crate) fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let _guard = self.lock.lock();
        self.condvar.notify_all();
    }

    pub(crate) fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleep for up to `duration`, returning early when shutdown triggers.
    /// Returns true if shutdown has been triggered.
    pub(crate) fn sleep(&self, duration: Duration) -> bool {
        let mut guard = self.lock.lock();
        if self.triggered.load(Ordering::SeqCst) {
            return true;
        }
        self.condvar.wait_for(&mut guard, duration);
        self.triggered.load(Ordering::SeqCst)
    }
}
