use std::collections::VecDeque;

use parking_lot::Mutex;

use crate::traits::frame_sink::FlowError;

/// Thread-safe FIFO between a completion callback and the downstream push.
///
/// Producers append at the back, the consumer takes from the front, so
/// buffers leave in the order they arrived. Bounded only by memory.
#[derive(Debug)]
pub struct PendingBufferQueue<B> {
    buffers: Mutex<VecDeque<B>>,
}

impl<B> PendingBufferQueue<B> {
    pub fn new() -> Self {
        Self {
            buffers: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, buffer: B) {
        self.buffers.lock().push_back(buffer);
    }

    /// Take the oldest buffer and hand it to `push`.
    ///
    /// The lock is released before `push` runs. An empty queue is not an
    /// error: nothing is pushed and `Ok(())` is returned.
    pub fn try_emit_one<F>(&self, push: F) -> Result<(), FlowError>
    where
        F: FnOnce(B) -> Result<(), FlowError>,
    {
        let buffer = self.buffers.lock().pop_front();
        match buffer {
            Some(buffer) => push(buffer),
            None => Ok(()),
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.buffers.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        !self.has_pending()
    }

    /// Drop every pending buffer, returning how many were discarded.
    pub fn clear(&self) -> usize {
        let mut buffers = self.buffers.lock();
        let count = buffers.len();
        buffers.clear();
        count
    }
}

impl<B> Default for PendingBufferQueue<B> {
    fn default() -> Self {
        Self::new()
    }
}
