//! Input device registry and the observers interested in it

use bitflags::bitflags;
use log::{debug, info};
use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::sync::{Arc, Weak};

use super::event::DeviceId;
use crate::observer::{Executor, ObserverMultiplexer, ObserverRegistrar};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceCapabilities: u32 {
        const KEYBOARD = 1 << 0;
        const ALPHANUMERIC = 1 << 1;
        const POINTER = 1 << 2;
        const TOUCHPAD = 1 << 3;
        const TOUCHSCREEN = 1 << 4;
        const SWITCH = 1 << 5;
    }
}

/// XKB rule names describing a keyboard layout
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Keymap {
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: String,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            model: "pc105+inet".to_string(),
            layout: "us".to_string(),
            variant: String::new(),
            options: String::new(),
        }
    }
}

impl Keymap {
    pub fn with_layout(layout: &str) -> Self {
        Self {
            layout: layout.to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub capabilities: DeviceCapabilities,
    /// Only keyboards carry a keymap
    pub keymap: Option<Keymap>,
}

impl DeviceInfo {
    pub fn keyboard(id: DeviceId, name: &str, keymap: Keymap) -> Self {
        Self {
            id,
            name: name.to_string(),
            capabilities: DeviceCapabilities::KEYBOARD | DeviceCapabilities::ALPHANUMERIC,
            keymap: Some(keymap),
        }
    }

    pub fn pointer(id: DeviceId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            capabilities: DeviceCapabilities::POINTER,
            keymap: None,
        }
    }

    pub fn touchscreen(id: DeviceId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            capabilities: DeviceCapabilities::TOUCHSCREEN,
            keymap: None,
        }
    }

    pub fn is_keyboard(&self) -> bool {
        self.capabilities.contains(DeviceCapabilities::KEYBOARD)
    }
}

/// Notified about device hot-plug. A batch of changes is always followed by
/// one `changes_complete`.
pub trait InputDeviceObserver: Send + Sync {
    fn device_added(&self, device: &DeviceInfo);
    fn device_changed(&self, device: &DeviceInfo);
    fn device_removed(&self, device: &DeviceInfo);
    fn changes_complete(&self);
}

impl InputDeviceObserver for ObserverMultiplexer<dyn InputDeviceObserver> {
    fn device_added(&self, device: &DeviceInfo) {
        let device = device.clone();
        self.for_each_observer(move |o| o.device_added(&device));
    }

    fn device_changed(&self, device: &DeviceInfo) {
        let device = device.clone();
        self.for_each_observer(move |o| o.device_changed(&device));
    }

    fn device_removed(&self, device: &DeviceInfo) {
        let device = device.clone();
        self.for_each_observer(move |o| o.device_removed(&device));
    }

    fn changes_complete(&self) {
        self.for_each_observer(|o| o.changes_complete());
    }
}

/// The set of known devices plus everyone who wants to hear about them.
///
/// Notifications are issued while the device list is held (re-entrantly),
/// so a late observer never sees a device twice or misses one.
pub struct InputDeviceHub {
    default_executor: Arc<dyn Executor>,
    observers: ObserverMultiplexer<dyn InputDeviceObserver>,
    devices: ReentrantMutex<RefCell<Vec<DeviceInfo>>>,
}

impl InputDeviceHub {
    pub fn new(default_executor: Arc<dyn Executor>) -> Self {
        Self {
            observers: ObserverMultiplexer::new(default_executor.clone()),
            default_executor,
            devices: ReentrantMutex::new(RefCell::new(Vec::new())),
        }
    }

    /// Register `observer` and replay every known device to it on the
    /// default executor.
    pub fn add_observer(&self, observer: Weak<dyn InputDeviceObserver>) {
        self.add_observer_with(observer, self.default_executor.clone());
    }

    pub fn add_observer_with(
        &self,
        observer: Weak<dyn InputDeviceObserver>,
        executor: Arc<dyn Executor>,
    ) {
        let devices = self.devices.lock();
        self.observers
            .register_interest_with(observer.clone(), executor.clone());

        let known = devices.borrow().clone();
        debug!("🎛️ Replaying {} device(s) to new observer", known.len());
        executor.spawn(Box::new(move || {
            if let Some(observer) = observer.upgrade() {
                for device in &known {
                    observer.device_added(device);
                }
                observer.changes_complete();
            }
        }));
    }

    pub fn remove_observer(&self, observer: &(dyn InputDeviceObserver + 'static)) {
        self.observers.unregister_interest(observer);
    }

    /// Returns false if a device with the same id is already known
    pub fn add_device(&self, device: DeviceInfo) -> bool {
        let devices = self.devices.lock();
        if devices.borrow().iter().any(|d| d.id == device.id) {
            return false;
        }
        devices.borrow_mut().push(device.clone());

        info!("🎛️ Input device added: {} ({:?})", device.name, device.id);
        self.observers.device_added(&device);
        self.observers.changes_complete();
        true
    }

    /// Replace the description of a known device
    pub fn change_device(&self, device: DeviceInfo) -> bool {
        let devices = self.devices.lock();
        {
            let mut list = devices.borrow_mut();
            let Some(slot) = list.iter_mut().find(|d| d.id == device.id) else {
                return false;
            };
            *slot = device.clone();
        }

        debug!("🎛️ Input device changed: {} ({:?})", device.name, device.id);
        self.observers.device_changed(&device);
        self.observers.changes_complete();
        true
    }

    pub fn remove_device(&self, id: DeviceId) -> Option<DeviceInfo> {
        let devices = self.devices.lock();
        let removed = {
            let mut list = devices.borrow_mut();
            let index = list.iter().position(|d| d.id == id)?;
            list.remove(index)
        };

        info!("🎛️ Input device removed: {} ({:?})", removed.name, id);
        self.observers.device_removed(&removed);
        self.observers.changes_complete();
        Some(removed)
    }

    pub fn devices(&self) -> Vec<DeviceInfo> {
        self.devices.lock().borrow().clone()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}
