use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Counting semaphore released once per completed request.
///
/// Waiters wake when at least one permit is available. Permits and the number
/// of buffered frames are only loosely coupled (frames are drained in bulk),
/// so a woken caller must re-check what is actually available.
#[derive(Debug, Default)]
pub struct CompletionSignal {
    permits: Mutex<usize>,
    available: Condvar,
}

impl CompletionSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn release(&self) {
        *self.permits.lock() += 1;
        self.available.notify_one();
    }

    /// Wait up to `timeout` for a permit. Returns `false` on timeout.
    ///
    /// A timeout too large to represent as a deadline waits without limit.
    pub fn acquire_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        let mut permits = self.permits.lock();
        while *permits == 0 {
            match deadline {
                Some(deadline) => {
                    if self.available.wait_until(&mut permits, deadline).timed_out() {
                        if *permits == 0 {
                            return false;
                        }
                        break;
                    }
                }
                None => self.available.wait(&mut permits),
            }
        }
        *permits -= 1;
        true
    }

    /// Drop all outstanding permits.
    pub fn reset(&self) {
        *self.permits.lock() = 0;
    }
}
