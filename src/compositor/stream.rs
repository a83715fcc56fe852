//! Producer side of one surface's buffers

use log::debug;
use parking_lot::Mutex;
use std::sync::Arc;

use super::arbiter::{CompositorId, MultiMonitorArbiter, DEFAULT_EXPECTED_CONSUMERS};
use super::buffer::Buffer;
use super::schedule::{DroppingSchedule, QueueingSchedule, Schedule};
use crate::error::CoreResult;
use crate::geometry::Size;

struct StreamState {
    schedule: Arc<dyn Schedule>,
    framedropping: bool,
    size: Option<Size>,
}

/// Buffers submitted by a client, arbitrated between every consumer
pub struct BufferStream {
    arbiter: MultiMonitorArbiter,
    state: Mutex<StreamState>,
}

impl BufferStream {
    pub fn new(framedropping: bool) -> Self {
        Self::with_expected_consumers(framedropping, DEFAULT_EXPECTED_CONSUMERS)
    }

    pub fn with_expected_consumers(framedropping: bool, consumers: usize) -> Self {
        let schedule = Self::schedule_for(framedropping);
        Self {
            arbiter: MultiMonitorArbiter::with_expected_consumers(schedule.clone(), consumers),
            state: Mutex::new(StreamState {
                schedule,
                framedropping,
                size: None,
            }),
        }
    }

    fn schedule_for(framedropping: bool) -> Arc<dyn Schedule> {
        if framedropping {
            Arc::new(DroppingSchedule::new())
        } else {
            Arc::new(QueueingSchedule::new())
        }
    }

    pub fn submit_buffer(&self, buffer: Arc<dyn Buffer>) {
        let mut state = self.state.lock();
        state.size = Some(buffer.size());
        state.schedule.schedule(buffer);
    }

    pub fn lock_compositor_buffer(&self, id: CompositorId) -> CoreResult<Arc<dyn Buffer>> {
        self.arbiter.compositor_acquire(id)
    }

    pub fn lock_snapshot_buffer(&self) -> CoreResult<Arc<dyn Buffer>> {
        self.arbiter.snapshot_acquire()
    }

    pub fn buffers_ready_for_compositor(&self, id: CompositorId) -> usize {
        self.arbiter.frames_ready_for(id)
    }

    pub fn has_submitted_buffer(&self) -> bool {
        self.arbiter.has_current_buffer() || self.state.lock().schedule.num_scheduled() > 0
    }

    /// Size of the most recently submitted buffer
    pub fn stream_size(&self) -> Option<Size> {
        self.state.lock().size
    }

    pub fn framedropping(&self) -> bool {
        self.state.lock().framedropping
    }

    /// Switch between keeping every frame and keeping only the newest one.
    /// Pending buffers move to the new schedule in order.
    pub fn allow_framedropping(&self, allow: bool) {
        let mut state = self.state.lock();
        if state.framedropping == allow {
            return;
        }

        let schedule = Self::schedule_for(allow);
        for buffer in state.schedule.drain() {
            schedule.schedule(buffer);
        }
        self.arbiter.set_schedule(schedule.clone());

        debug!(
            "🎞️ Stream switched to {} schedule",
            if allow { "dropping" } else { "queueing" }
        );
        state.schedule = schedule;
        state.framedropping = allow;
    }

    /// Skip every pending frame except the newest
    pub fn drop_old_buffers(&self) {
        let state = self.state.lock();
        while state.schedule.num_scheduled() > 1 {
            self.arbiter.advance_schedule();
        }
    }
}
