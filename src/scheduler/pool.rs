//! Fixed pool of long-lived worker threads.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::queue::GatedQueue;

use super::signal::{ShutdownToken, WakeSignal};
use super::CredentialRotation;

/// N homogeneous workers, each blocking on the shared wait condition until
/// the poller signals it, then racing for the next admissible task.
///
/// The "task is ready" predicate is evaluated under the condition's lock:
/// a worker that wakes spuriously, or loses the dequeue race to a sibling,
/// simply goes back to waiting. The won task is invoked outside any lock.
pub(crate) struct WorkerPool {
    num_threads: usize,
    queue: Arc<GatedQueue>,
    signal: Arc<WakeSignal>,
    shutdown: Arc<ShutdownToken>,
    rotation: Option<Arc<CredentialRotation>>,
}

impl WorkerPool {
    pub(crate) fn new(
        num_threads: usize,
        queue: Arc<GatedQueue>,
        signal: Arc<WakeSignal>,
        shutdown: Arc<ShutdownToken>,
        rotation: Option<Arc<CredentialRotation>>,
    ) -> Self {
        Self {
            num_threads,
            queue,
            signal,
            shutdown,
            rotation,
        }
    }

    /// Spawn all worker threads.
    pub(crate) fn spawn(self) -> std::io::Result<Vec<JoinHandle<()>>> {
        let mut handles = Vec::with_capacity(self.num_threads);
        for worker_id in 0..self.num_threads {
            let queue = self.queue.clone();
            let signal = self.signal.clone();
            let shutdown = self.shutdown.clone();
            let rotation = self.rotation.clone();
            let handle = thread::Builder::new()
                .name(format!("floodgate-worker-{}", worker_id))
                .spawn(move || run_worker(worker_id, &queue, &signal, &shutdown, rotation.as_deref()))?;
            handles.push(handle);
        }
        Ok(handles)
    }
}

fn run_worker(
    worker_id: usize,
    queue: &GatedQueue,
    signal: &WakeSignal,
    shutdown: &ShutdownToken,
    rotation: Option<&CredentialRotation>,
) {
    debug!(worker_id, "Worker started");
    loop {
        let task = {
            let mut guard = signal.lock.lock();
            loop {
                if shutdown.is_triggered() {
                    debug!(worker_id, "Worker stopped");
                    return;
                }
                match queue.get() {
                    Some(task) => break task,
                    None => signal.condvar.wait(&mut guard),
                }
            }
        };

        let credential = rotation.map(CredentialRotation::next);

        // A panicking task must not take the worker thread down with it.
        let result = panic::catch_unwind(AssertUnwindSafe(|| task.invoke(credential)));
        if result.is_err() {
            warn!(worker_id, "Task panicked, worker continuing");
        }
    }
}
