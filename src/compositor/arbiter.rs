//! Hand-off of one surface's buffers to many independent consumers.
//!
//! Every output compositor (and the snapshotter) pulls at its own pace. A
//! consumer keeps getting the same buffer until a newer one is scheduled,
//! and a newer one is handed out as soon as the consumer has seen the
//! current one. Each consumer's "seen it" bit lives in a small slot vector;
//! there are rarely more than a handful of outputs.

use log::{error, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::buffer::Buffer;
use super::schedule::Schedule;
use crate::error::{CoreError, CoreResult};

/// Identity of one buffer consumer. Comparable for equality only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompositorId(u64);

impl CompositorId {
    pub fn new() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        CompositorId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for CompositorId {
    fn default() -> Self {
        Self::new()
    }
}

/// Slot capacity reserved up front when no output count is known
pub const DEFAULT_EXPECTED_CONSUMERS: usize = 6;

struct ArbiterState {
    schedule: Arc<dyn Schedule>,
    current_buffer: Option<Arc<dyn Buffer>>,
    current_buffer_users: Vec<Option<CompositorId>>,
}

impl ArbiterState {
    fn is_user_of_current_buffer(&self, id: CompositorId) -> bool {
        self.current_buffer_users.iter().any(|slot| *slot == Some(id))
    }

    fn add_current_buffer_user(&mut self, id: CompositorId) {
        match self.current_buffer_users.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(id),
            None => self.current_buffer_users.push(Some(id)),
        }
    }

    fn clear_current_users(&mut self) {
        for slot in &mut self.current_buffer_users {
            *slot = None;
        }
    }

    /// Make the next scheduled buffer current, if there is one
    fn advance(&mut self) -> bool {
        match self.schedule.next_buffer() {
            Some(next) => {
                trace!("Arbiter advancing to {:?}", next.id());
                self.current_buffer = Some(next);
                self.clear_current_users();
                true
            }
            None => false,
        }
    }
}

pub struct MultiMonitorArbiter {
    state: Mutex<ArbiterState>,
}

impl MultiMonitorArbiter {
    pub fn new(schedule: Arc<dyn Schedule>) -> Self {
        Self::with_expected_consumers(schedule, DEFAULT_EXPECTED_CONSUMERS)
    }

    /// Reserves one user slot per expected consumer, usually one per output
    pub fn with_expected_consumers(schedule: Arc<dyn Schedule>, consumers: usize) -> Self {
        Self {
            state: Mutex::new(ArbiterState {
                schedule,
                current_buffer: None,
                current_buffer_users: Vec::with_capacity(consumers),
            }),
        }
    }

    /// Buffer for consumer `id` to composite.
    ///
    /// Returns the next scheduled buffer if `id` has already seen the
    /// current one, otherwise the current buffer again.
    pub fn compositor_acquire(&self, id: CompositorId) -> CoreResult<Arc<dyn Buffer>> {
        let mut state = self.state.lock();

        if state.current_buffer.is_none() || state.is_user_of_current_buffer(id) {
            // With nothing scheduled the current buffer is handed out again
            state.advance();
        }

        let Some(buffer) = state.current_buffer.clone() else {
            error!("❌ Compositor {:?} acquired with no buffer available", id);
            return Err(CoreError::NoBufferForCompositor);
        };

        if !state.is_user_of_current_buffer(id) {
            state.add_current_buffer_user(id);
        }
        Ok(buffer)
    }

    /// Buffer for a screenshot. Never marks anyone as a user.
    pub fn snapshot_acquire(&self) -> CoreResult<Arc<dyn Buffer>> {
        let mut state = self.state.lock();

        if state.current_buffer.is_none() && !state.advance() {
            error!("❌ Snapshot requested with no buffer available");
            return Err(CoreError::NoBufferForSnapshot);
        }

        state
            .current_buffer
            .clone()
            .ok_or(CoreError::NoBufferForSnapshot)
    }

    pub fn set_schedule(&self, schedule: Arc<dyn Schedule>) {
        self.state.lock().schedule = schedule;
    }

    pub fn buffer_ready_for(&self, id: CompositorId) -> bool {
        let state = self.state.lock();
        state.schedule.num_scheduled() > 0
            || (state.current_buffer.is_some() && !state.is_user_of_current_buffer(id))
    }

    /// Number of frames `id` has not composited yet
    pub fn frames_ready_for(&self, id: CompositorId) -> usize {
        let state = self.state.lock();
        let unseen_current =
            state.current_buffer.is_some() && !state.is_user_of_current_buffer(id);
        state.schedule.num_scheduled() + usize::from(unseen_current)
    }

    /// Skip ahead to the next scheduled buffer regardless of who has seen
    /// the current one
    pub fn advance_schedule(&self) {
        self.state.lock().advance();
    }

    pub fn has_current_buffer(&self) -> bool {
        self.state.lock().current_buffer.is_some()
    }
}
