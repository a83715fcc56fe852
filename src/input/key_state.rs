//! Per-device bookkeeping of depressed keys

use std::collections::{HashMap, HashSet};

use super::event::{DeviceId, KeyAction, KeyboardEvent};
use crate::config::KeyRepeatPolicy;
use crate::error::{CoreError, CoreResult};

#[derive(Debug, Default)]
pub struct KeyInputState {
    depressed_scancodes: HashMap<DeviceId, HashSet<i32>>,
}

impl KeyInputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply `event` and report whether it should reach the focused surface.
    ///
    /// Duplicate presses and releases of keys that were never pressed are
    /// swallowed. A repeat for a key this state never saw go down is a
    /// contract violation.
    pub fn handle_event(
        &mut self,
        device: DeviceId,
        event: &KeyboardEvent,
        repeat_policy: KeyRepeatPolicy,
    ) -> CoreResult<bool> {
        match event.action {
            KeyAction::Down => Ok(self.press_key(device, event.scan_code)),
            KeyAction::Up => Ok(self.release_key(device, event.scan_code)),
            KeyAction::Repeat => {
                if !self.is_pressed(device, event.scan_code) {
                    return Err(CoreError::RepeatWithoutPress {
                        device,
                        scan_code: event.scan_code,
                    });
                }
                Ok(repeat_policy == KeyRepeatPolicy::Deliver)
            }
        }
    }

    fn press_key(&mut self, device: DeviceId, scan_code: i32) -> bool {
        self.depressed_scancodes
            .entry(device)
            .or_default()
            .insert(scan_code)
    }

    fn release_key(&mut self, device: DeviceId, scan_code: i32) -> bool {
        let Some(keys) = self.depressed_scancodes.get_mut(&device) else {
            return false;
        };
        let released = keys.remove(&scan_code);
        if keys.is_empty() {
            self.depressed_scancodes.remove(&device);
        }
        released
    }

    pub fn is_pressed(&self, device: DeviceId, scan_code: i32) -> bool {
        self.depressed_scancodes
            .get(&device)
            .is_some_and(|keys| keys.contains(&scan_code))
    }

    pub fn pressed_count(&self, device: DeviceId) -> usize {
        self.depressed_scancodes.get(&device).map_or(0, HashSet::len)
    }

    pub fn forget_device(&mut self, device: DeviceId) {
        self.depressed_scancodes.remove(&device);
    }

    pub fn clear(&mut self) {
        self.depressed_scancodes.clear();
    }
}
