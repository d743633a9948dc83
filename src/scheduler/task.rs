//! Opaque deferred invocations.

use std::fmt;

/// A deferred invocation submitted for rate-gated execution.
///
/// The body is an arbitrary closure; whatever context it needs is captured
/// at construction. The queue never inspects task contents. Each task is
/// consumed by exactly one worker, which passes along the next rotated
/// credential when the scheduler has credentials configured.
pub struct Task {
    body: Box<dyn FnOnce(Option<String>) + Send + 'static>,
}

impl Task {
    /// Create a task from a closure. The argument is the injected
    /// credential, or `None` when the scheduler has no credentials.
    pub fn new<F>(body: F) -> Self
    where
        F: FnOnce(Option<String>) + Send + 'static,
    {
        Self {
            body: Box::new(body),
        }
    }

    /// Consume the task, running its body.
    pub fn invoke(self, credential: Option<String>) {
        (self.body)(credential)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task")
    }
}
