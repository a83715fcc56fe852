//! Device-independent input event model

use bitflags::bitflags;
use std::time::Duration;

use crate::geometry::Point;

/// Identifier of the physical (or virtual) device an event came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(pub i64);

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PointerButtons: u32 {
        const PRIMARY = 1 << 0;
        const SECONDARY = 1 << 1;
        const TERTIARY = 1 << 2;
        const BACK = 1 << 3;
        const FORWARD = 1 << 4;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u32 {
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const SUPER = 1 << 3;
        const CAPS_LOCK = 1 << 4;
        const NUM_LOCK = 1 << 5;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Up,
    Down,
    Repeat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyboardEvent {
    pub action: KeyAction,
    /// Hardware scan code, the key used for press/release bookkeeping
    pub scan_code: i32,
    /// Keysym as resolved by the keymap
    pub key_code: u32,
    pub modifiers: Modifiers,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerAction {
    ButtonUp,
    ButtonDown,
    Enter,
    Leave,
    Motion,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerEvent {
    pub action: PointerAction,
    /// Buttons held after this event was applied
    pub buttons: PointerButtons,
    pub x: f32,
    pub y: f32,
    pub relative_x: f32,
    pub relative_y: f32,
    pub vscroll: f32,
    pub hscroll: f32,
    pub modifiers: Modifiers,
}

impl PointerEvent {
    pub fn position(&self) -> Point {
        Point::new(self.x as i32, self.y as i32)
    }

    /// A button-up that leaves no button held ends the gesture
    pub fn is_gesture_terminator(&self) -> bool {
        self.action == PointerAction::ButtonUp && self.buttons.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchAction {
    Up,
    Down,
    Change,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchContact {
    pub id: i32,
    pub action: TouchAction,
    pub x: f32,
    pub y: f32,
    pub pressure: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TouchEvent {
    pub contacts: Vec<TouchContact>,
    pub modifiers: Modifiers,
}

impl TouchEvent {
    pub fn point_count(&self) -> usize {
        self.contacts.len()
    }

    /// True for the last remaining finger lifting
    pub fn is_last_contact_up(&self) -> bool {
        self.contacts.len() == 1 && self.contacts[0].action == TouchAction::Up
    }

    /// True for the first finger landing
    pub fn is_first_contact_down(&self) -> bool {
        self.contacts.len() == 1 && self.contacts[0].action == TouchAction::Down
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEventKind {
    Key(KeyboardEvent),
    Pointer(PointerEvent),
    Touch(TouchEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputEvent {
    pub device_id: DeviceId,
    /// Monotonic event time
    pub timestamp: Duration,
    pub kind: InputEventKind,
}

impl InputEvent {
    /// Copy of this event with pointer/touch coordinates shifted by
    /// `-origin`. Keyboard events are returned unchanged.
    pub fn translated(&self, origin: Point) -> InputEvent {
        let (dx, dy) = (origin.x as f32, origin.y as f32);
        let mut event = self.clone();
        match &mut event.kind {
            InputEventKind::Pointer(pointer) => {
                pointer.x -= dx;
                pointer.y -= dy;
            }
            InputEventKind::Touch(touch) => {
                for contact in &mut touch.contacts {
                    contact.x -= dx;
                    contact.y -= dy;
                }
            }
            InputEventKind::Key(_) => {}
        }
        event
    }
}

/// Window-level notifications that travel the same event path as input but
/// must never be handed to the input dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Resize { width: u32, height: u32 },
    Focus(bool),
    CloseRequest,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Input(InputEvent),
    Window(WindowEvent),
}

impl Event {
    pub fn key(device: DeviceId, timestamp: Duration, action: KeyAction, scan_code: i32) -> Self {
        Event::Input(InputEvent {
            device_id: device,
            timestamp,
            kind: InputEventKind::Key(KeyboardEvent {
                action,
                scan_code,
                key_code: 0,
                modifiers: Modifiers::empty(),
            }),
        })
    }

    pub fn pointer(
        device: DeviceId,
        timestamp: Duration,
        action: PointerAction,
        buttons: PointerButtons,
        x: f32,
        y: f32,
    ) -> Self {
        Event::Input(InputEvent {
            device_id: device,
            timestamp,
            kind: InputEventKind::Pointer(PointerEvent {
                action,
                buttons,
                x,
                y,
                relative_x: 0.0,
                relative_y: 0.0,
                vscroll: 0.0,
                hscroll: 0.0,
                modifiers: Modifiers::empty(),
            }),
        })
    }

    pub fn touch(device: DeviceId, timestamp: Duration, contacts: Vec<TouchContact>) -> Self {
        Event::Input(InputEvent {
            device_id: device,
            timestamp,
            kind: InputEventKind::Touch(TouchEvent {
                contacts,
                modifiers: Modifiers::empty(),
            }),
        })
    }

    pub fn as_input(&self) -> Option<&InputEvent> {
        match self {
            Event::Input(input) => Some(input),
            Event::Window(_) => None,
        }
    }
}
