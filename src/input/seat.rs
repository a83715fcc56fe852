//! Seat frontend: per-client keyboard listeners, keymap tracking and focus
//! notification on top of the input dispatcher.

use log::{debug, info};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ptr;
use std::sync::{Arc, Weak};

use super::device::{DeviceInfo, InputDeviceHub, InputDeviceObserver, Keymap};
use super::dispatcher::InputDispatcher;
use super::surface::InputSurface;
use crate::scene::SurfaceId;

/// Identifies one connected client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

/// Listeners grouped by the client that owns them.
///
/// A client's entry exists exactly while it has at least one listener.
pub struct ListenerList<T: ?Sized> {
    listeners: Mutex<HashMap<ClientId, Vec<Weak<T>>>>,
}

impl<T: ?Sized> Default for ListenerList<T> {
    fn default() -> Self {
        Self {
            listeners: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: ?Sized> ListenerList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_listener(&self, client: ClientId, listener: Weak<T>) {
        self.listeners.lock().entry(client).or_default().push(listener);
    }

    pub fn unregister_listener(&self, client: ClientId, listener: &T) {
        let target = listener as *const T;
        let mut listeners = self.listeners.lock();
        let Some(client_listeners) = listeners.get_mut(&client) else {
            return;
        };
        client_listeners.retain(|l| !ptr::addr_eq(l.as_ptr(), target) && l.strong_count() > 0);
        if client_listeners.is_empty() {
            listeners.remove(&client);
        }
    }

    /// Call `f` on every live listener of `client`, outside the list lock
    pub fn for_each(&self, client: ClientId, mut f: impl FnMut(&Arc<T>)) {
        let live: Vec<Arc<T>> = self
            .listeners
            .lock()
            .get(&client)
            .map(|l| l.iter().filter_map(Weak::upgrade).collect())
            .unwrap_or_default();
        for listener in &live {
            f(listener);
        }
    }

    pub fn for_each_client(&self, mut f: impl FnMut(ClientId, &Arc<T>)) {
        let live: Vec<(ClientId, Arc<T>)> = self
            .listeners
            .lock()
            .iter()
            .flat_map(|(client, l)| l.iter().filter_map(|w| w.upgrade().map(|w| (*client, w))))
            .collect();
        for (client, listener) in &live {
            f(*client, listener);
        }
    }

    pub fn has_client(&self, client: ClientId) -> bool {
        self.listeners.lock().contains_key(&client)
    }

    pub fn listener_count(&self, client: ClientId) -> usize {
        self.listeners.lock().get(&client).map_or(0, Vec::len)
    }
}

/// A client's keyboard object
pub trait KeyboardListener: Send + Sync {
    fn keymap_changed(&self, keymap: &Keymap);

    fn focus_gained(&self, surface: SurfaceId);

    fn focus_lost(&self, surface: SurfaceId);

    /// Re-send pressed keys and modifiers after a server restart
    fn resync(&self) {}
}

/// Stages keymaps from keyboard devices and commits them once a batch of
/// device changes is complete.
struct KeymapObserver {
    current: Arc<Mutex<Keymap>>,
    pending: Mutex<Option<Keymap>>,
    listeners: Weak<ListenerList<dyn KeyboardListener>>,
}

impl KeymapObserver {
    fn stage(&self, device: &DeviceInfo) {
        let Some(keymap) = device.keymap.as_ref().filter(|_| device.is_keyboard()) else {
            return;
        };
        if *self.current.lock() != *keymap {
            *self.pending.lock() = Some(keymap.clone());
        }
    }
}

impl InputDeviceObserver for KeymapObserver {
    fn device_added(&self, device: &DeviceInfo) {
        self.stage(device);
    }

    fn device_changed(&self, device: &DeviceInfo) {
        self.stage(device);
    }

    fn device_removed(&self, _device: &DeviceInfo) {}

    fn changes_complete(&self) {
        let Some(keymap) = self.pending.lock().take() else {
            return;
        };

        info!("⌨️ Committing keymap layout '{}'", keymap.layout);
        *self.current.lock() = keymap.clone();
        if let Some(listeners) = self.listeners.upgrade() {
            listeners.for_each_client(|_, listener| listener.keymap_changed(&keymap));
        }
    }
}

pub struct Seat {
    dispatcher: Arc<dyn InputDispatcher>,
    hub: Arc<InputDeviceHub>,
    keymap: Arc<Mutex<Keymap>>,
    keyboard_listeners: Arc<ListenerList<dyn KeyboardListener>>,
    keymap_observer: Arc<KeymapObserver>,
    focus: Mutex<Option<(ClientId, SurfaceId)>>,
}

impl Seat {
    pub fn new(hub: Arc<InputDeviceHub>, dispatcher: Arc<dyn InputDispatcher>) -> Self {
        let keymap = Arc::new(Mutex::new(Keymap::default()));
        let keyboard_listeners: Arc<ListenerList<dyn KeyboardListener>> =
            Arc::new(ListenerList::new());

        let keymap_observer = Arc::new(KeymapObserver {
            current: keymap.clone(),
            pending: Mutex::new(None),
            listeners: Arc::downgrade(&keyboard_listeners),
        });
        let observer: Arc<dyn InputDeviceObserver> = keymap_observer.clone();
        hub.add_observer(Arc::downgrade(&observer));

        Self {
            dispatcher,
            hub,
            keymap,
            keyboard_listeners,
            keymap_observer,
            focus: Mutex::new(None),
        }
    }

    pub fn keymap(&self) -> Keymap {
        self.keymap.lock().clone()
    }

    pub fn add_keyboard_listener(&self, client: ClientId, listener: Weak<dyn KeyboardListener>) {
        self.keyboard_listeners.register_listener(client, listener);
    }

    pub fn remove_keyboard_listener(
        &self,
        client: ClientId,
        listener: &(dyn KeyboardListener + 'static),
    ) {
        self.keyboard_listeners.unregister_listener(client, listener);
    }

    pub fn keyboard_listeners(&self) -> &ListenerList<dyn KeyboardListener> {
        &self.keyboard_listeners
    }

    /// Move keyboard focus to `target` (owned by the given client), or
    /// clear it.
    pub fn set_focus(&self, target: Option<(ClientId, &Arc<dyn InputSurface>)>) {
        self.dispatcher.set_focus(target.map(|(_, surface)| surface));

        let new_focus = target.map(|(client, surface)| (client, surface.id()));
        let old_focus = std::mem::replace(&mut *self.focus.lock(), new_focus);
        if old_focus == new_focus {
            return;
        }

        debug!("⌨️ Seat focus {:?} -> {:?}", old_focus, new_focus);
        if let Some((client, surface)) = old_focus {
            self.keyboard_listeners
                .for_each(client, |l| l.focus_lost(surface));
        }
        if let Some((client, surface)) = new_focus {
            self.keyboard_listeners
                .for_each(client, |l| l.focus_gained(surface));
        }
    }

    pub fn focused_client(&self) -> Option<ClientId> {
        self.focus.lock().map(|(client, _)| client)
    }

    pub fn server_restart(&self) {
        if let Some(client) = self.focused_client() {
            self.keyboard_listeners.for_each(client, |l| l.resync());
        }
    }
}

impl Drop for Seat {
    fn drop(&mut self) {
        self.hub.remove_observer(&*self.keymap_observer);
    }
}
