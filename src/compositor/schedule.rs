//! Pending-buffer queues sitting between a producer and the arbiter

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::buffer::Buffer;

/// Ordered queue of produced buffers waiting to become current
pub trait Schedule: Send + Sync {
    fn schedule(&self, buffer: Arc<dyn Buffer>);

    fn num_scheduled(&self) -> usize;

    /// Pop the oldest pending buffer
    fn next_buffer(&self) -> Option<Arc<dyn Buffer>>;

    /// Take every pending buffer, oldest first
    fn drain(&self) -> Vec<Arc<dyn Buffer>>;
}

/// FIFO. Scheduling a buffer that is already queued moves it to the back.
#[derive(Default)]
pub struct QueueingSchedule {
    queue: Mutex<VecDeque<Arc<dyn Buffer>>>,
}

impl QueueingSchedule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Schedule for QueueingSchedule {
    fn schedule(&self, buffer: Arc<dyn Buffer>) {
        let mut queue = self.queue.lock();
        let id = buffer.id();
        queue.retain(|b| b.id() != id);
        queue.push_back(buffer);
    }

    fn num_scheduled(&self) -> usize {
        self.queue.lock().len()
    }

    fn next_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.queue.lock().pop_front()
    }

    fn drain(&self) -> Vec<Arc<dyn Buffer>> {
        self.queue.lock().drain(..).collect()
    }
}

/// Holds only the newest buffer; older ones are dropped unseen
#[derive(Default)]
pub struct DroppingSchedule {
    pending: Mutex<Option<Arc<dyn Buffer>>>,
}

impl DroppingSchedule {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Schedule for DroppingSchedule {
    fn schedule(&self, buffer: Arc<dyn Buffer>) {
        *self.pending.lock() = Some(buffer);
    }

    fn num_scheduled(&self) -> usize {
        usize::from(self.pending.lock().is_some())
    }

    fn next_buffer(&self) -> Option<Arc<dyn Buffer>> {
        self.pending.lock().take()
    }

    fn drain(&self) -> Vec<Arc<dyn Buffer>> {
        self.pending.lock().take().into_iter().collect()
    }
}
