//! Input handling: the event model, per-device key bookkeeping, the
//! dispatch state machine and the seat/device frontends built on top of it.

pub mod device;
pub mod dispatcher;
pub mod event;
pub mod key_state;
pub mod seat;
pub mod surface;

pub use device::{DeviceCapabilities, DeviceInfo, InputDeviceHub, InputDeviceObserver, Keymap};
pub use dispatcher::{DefaultInputDispatcher, InputDispatcher};
pub use event::{
    DeviceId, Event, InputEvent, InputEventKind, KeyAction, KeyboardEvent, Modifiers,
    PointerAction, PointerButtons, PointerEvent, TouchAction, TouchContact, TouchEvent,
    WindowEvent,
};
pub use key_state::KeyInputState;
pub use seat::{ClientId, KeyboardListener, ListenerList, Seat};
pub use surface::{InputScene, InputSurface};
