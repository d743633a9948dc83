//! Background loop converting queue availability into worker wake-ups.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, trace};

use crate::queue::{GatedQueue, QueueStatus};

use super::signal::{ShutdownToken, WakeSignal};

/// Polls the queue's status and signals the shared wait condition whenever
/// capacity is available.
///
/// The poller is the only producer of wake events: the queue itself holds
/// no worker-visible synchronization primitives. When the queue is
/// rate-gated the poller sleeps for exactly the reported wait; otherwise it
/// re-polls on a fixed short interval to avoid a busy loop.
pub(crate) struct AvailabilityPoller {
    queue: Arc<GatedQueue>,
    signal: Arc<WakeSignal>,
    shutdown: Arc<ShutdownToken>,
    poll_interval: Duration,
}

impl AvailabilityPoller {
    pub(crate) fn new(
        queue: Arc<GatedQueue>,
        signal: Arc<WakeSignal>,
        shutdown: Arc<ShutdownToken>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            queue,
            signal,
            shutdown,
            poll_interval,
        }
    }

    /// Spawn the poller thread.
    pub(crate) fn spawn(self) -> std::io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("floodgate-poller".to_string())
            .spawn(move || self.run())
    }

    fn run(self) {
        debug!(poll_interval_ms = self.poll_interval.as_millis() as u64, "Poller started");
        loop {
            let sleep = match self.queue.status() {
                QueueStatus::Available => {
                    trace!("Queue available, waking workers");
                    self.signal.notify_all();
                    self.poll_interval
                }
                QueueStatus::Unavailable { retry_after } => {
                    trace!(retry_after, "Queue rate-gated");
                    Duration::from_secs(retry_after)
                }
                QueueStatus::Empty | QueueStatus::NotStarted => self.poll_interval,
            };
            if self.shutdown.sleep(sleep) {
                break;
            }
        }
        debug!("Poller stopped");
    }
}
