//! Routing of device events to scene surfaces.
//!
//! Each device has its own little state machine. Pointers move between
//! idle, hovering a target and captured by a gesture owner; touch devices
//! between idle and captured; keyboards only track which keys are down and
//! always deliver to the focused surface. All devices share one lock so
//! delivery order matches submission order across devices.

use log::{debug, error, info, trace};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use super::event::{
    DeviceId, Event, InputEvent, InputEventKind, KeyboardEvent, Modifiers, PointerAction,
    PointerButtons, PointerEvent, TouchEvent,
};
use super::key_state::KeyInputState;
use super::surface::{InputScene, InputSurface};
use crate::config::{InputConfig, KeyRepeatPolicy};
use crate::error::{CoreError, CoreResult};
use crate::geometry::Point;
use crate::scene::{SceneObserver, SurfaceId};

pub trait InputDispatcher: Send + Sync {
    /// Route one event. `Ok(true)` if something was delivered.
    fn dispatch(&self, event: &Event) -> CoreResult<bool>;

    /// Replace the keyboard focus. Resets key bookkeeping.
    fn set_focus(&self, target: Option<&Arc<dyn InputSurface>>);

    fn start(&self);

    fn stop(&self);

    fn configuration_changed(&self, when: Duration);

    fn device_reset(&self, device: DeviceId, when: Duration);
}

/// A non-owning surface reference that remembers who it pointed at
#[derive(Clone)]
struct SurfaceRef {
    id: SurfaceId,
    surface: Weak<dyn InputSurface>,
}

impl SurfaceRef {
    fn new(surface: &Arc<dyn InputSurface>) -> Self {
        Self {
            id: surface.id(),
            surface: Arc::downgrade(surface),
        }
    }

    fn upgrade(&self) -> Option<Arc<dyn InputSurface>> {
        self.surface.upgrade()
    }
}

#[derive(Default)]
struct PointerInputState {
    gesture_owner: Option<SurfaceRef>,
    current_target: Option<SurfaceRef>,
}

#[derive(Default)]
struct TouchInputState {
    gesture_owner: Option<SurfaceRef>,
}

#[derive(Default)]
struct DispatchState {
    focus: Option<SurfaceRef>,
    key_state: KeyInputState,
    pointers: HashMap<DeviceId, PointerInputState>,
    touches: HashMap<DeviceId, TouchInputState>,
    started: bool,
}

impl DispatchState {
    fn forget_surface(&mut self, id: SurfaceId) {
        let matches = |r: &Option<SurfaceRef>| r.as_ref().is_some_and(|r| r.id == id);

        if matches(&self.focus) {
            self.focus = None;
            self.key_state.clear();
        }
        for pointer in self.pointers.values_mut() {
            if matches(&pointer.gesture_owner) {
                pointer.gesture_owner = None;
            }
            if matches(&pointer.current_target) {
                pointer.current_target = None;
            }
        }
        for touch in self.touches.values_mut() {
            if matches(&touch.gesture_owner) {
                touch.gesture_owner = None;
            }
        }
    }

    fn forget_gestures(&mut self) {
        self.pointers.clear();
        self.touches.clear();
        self.key_state.clear();
    }
}

/// Drops references to surfaces as soon as they leave the scene, even if
/// their owner keeps them alive.
struct DispatcherSceneObserver {
    state: Weak<Mutex<DispatchState>>,
}

impl SceneObserver for DispatcherSceneObserver {
    fn surface_removed(&self, surface: SurfaceId) {
        if let Some(state) = self.state.upgrade() {
            trace!("Forgetting input state for removed surface {:?}", surface);
            state.lock().forget_surface(surface);
        }
    }
}

pub struct DefaultInputDispatcher {
    scene: Arc<dyn InputScene>,
    repeat_policy: KeyRepeatPolicy,
    state: Arc<Mutex<DispatchState>>,
    scene_observer: Arc<DispatcherSceneObserver>,
}

impl DefaultInputDispatcher {
    pub fn new(scene: Arc<dyn InputScene>, config: &InputConfig) -> Self {
        let state = Arc::new(Mutex::new(DispatchState::default()));
        let scene_observer = Arc::new(DispatcherSceneObserver {
            state: Arc::downgrade(&state),
        });
        let observer: Arc<dyn SceneObserver> = scene_observer.clone();
        scene.add_observer(Arc::downgrade(&observer));

        debug!(
            "⌨️ Input dispatcher created (key repeat: {:?})",
            config.key_repeat
        );

        Self {
            scene,
            repeat_policy: config.key_repeat,
            state,
            scene_observer,
        }
    }

    /// Topmost surface whose input area contains `point`
    fn find_target_surface(&self, point: Point) -> Option<Arc<dyn InputSurface>> {
        let mut top_target = None;
        self.scene.for_each(&mut |surface| {
            if surface.input_area_contains(point) {
                top_target = Some(surface.clone());
            }
        });
        top_target
    }

    fn deliver(surface: &Arc<dyn InputSurface>, event: &InputEvent) {
        let local = event.translated(surface.input_bounds().top_left());
        trace!("Delivering {:?} to '{}'", local.kind, surface.name());
        surface.consume(&local);
    }

    fn send_enter_exit_event(
        surface: &Arc<dyn InputSurface>,
        trigger: &InputEvent,
        modifiers: Modifiers,
        action: PointerAction,
        x: f32,
        y: f32,
    ) {
        let event = InputEvent {
            device_id: trigger.device_id,
            timestamp: trigger.timestamp,
            kind: InputEventKind::Pointer(PointerEvent {
                action,
                buttons: PointerButtons::empty(),
                x,
                y,
                relative_x: 0.0,
                relative_y: 0.0,
                vscroll: 0.0,
                hscroll: 0.0,
                modifiers,
            }),
        };
        Self::deliver(surface, &event);
    }

    /// Synthesize leave/enter if the hovered surface changed. Returns true if
    /// any event was actually delivered.
    fn update_hover_target(
        pointer: &mut PointerInputState,
        target: Option<&Arc<dyn InputSurface>>,
        trigger: &InputEvent,
        pev: &PointerEvent,
    ) -> bool {
        let current_id = pointer.current_target.as_ref().map(|t| t.id);
        if current_id == target.map(|t| t.id()) {
            return false;
        }

        let mut sent = false;
        if let Some(old) = pointer.current_target.take().and_then(|t| t.upgrade()) {
            Self::send_enter_exit_event(
                &old,
                trigger,
                pev.modifiers,
                PointerAction::Leave,
                pev.x,
                pev.y,
            );
            sent = true;
        }

        pointer.current_target = target.map(SurfaceRef::new);
        if let Some(new) = target {
            Self::send_enter_exit_event(
                new,
                trigger,
                pev.modifiers,
                PointerAction::Enter,
                pev.x,
                pev.y,
            );
            sent = true;
        }

        sent
    }

    fn dispatch_key(
        &self,
        state: &mut DispatchState,
        event: &InputEvent,
        kev: &KeyboardEvent,
    ) -> CoreResult<bool> {
        let Some(focus) = state.focus.as_ref().and_then(SurfaceRef::upgrade) else {
            return Ok(false);
        };

        if !state
            .key_state
            .handle_event(event.device_id, kev, self.repeat_policy)?
        {
            return Ok(false);
        }

        Self::deliver(&focus, event);
        Ok(true)
    }

    fn dispatch_pointer(
        &self,
        state: &mut DispatchState,
        event: &InputEvent,
        pev: &PointerEvent,
    ) -> bool {
        let point = pev.position();
        let pointer = state.pointers.entry(event.device_id).or_default();

        if let Some(owner) = pointer.gesture_owner.as_ref().and_then(SurfaceRef::upgrade) {
            Self::deliver(&owner, event);

            if pev.is_gesture_terminator() {
                debug!(
                    "🐁 Pointer gesture on {:?} released by '{}'",
                    event.device_id,
                    owner.name()
                );
                pointer.gesture_owner = None;

                let target = self.find_target_surface(point);
                Self::update_hover_target(pointer, target.as_ref(), event, pev);
            }
            return true;
        }
        // An owner that died mid-gesture loses its capture
        pointer.gesture_owner = None;

        if pev.action == PointerAction::ButtonUp {
            // The matching down was never delivered to anyone
            trace!("Dropping orphaned button-up from {:?}", event.device_id);
            return false;
        }

        let target = self.find_target_surface(point);
        let sent_hover = Self::update_hover_target(pointer, target.as_ref(), event, pev);

        let Some(target) = target else {
            return sent_hover;
        };

        if pev.action == PointerAction::ButtonDown {
            debug!(
                "🐁 Pointer gesture on {:?} captured by '{}'",
                event.device_id,
                target.name()
            );
            pointer.gesture_owner = Some(SurfaceRef::new(&target));
        }

        Self::deliver(&target, event);
        true
    }

    fn dispatch_touch(
        &self,
        state: &mut DispatchState,
        event: &InputEvent,
        tev: &TouchEvent,
    ) -> bool {
        let touch = state.touches.entry(event.device_id).or_default();

        if let Some(owner) = touch.gesture_owner.as_ref().and_then(SurfaceRef::upgrade) {
            Self::deliver(&owner, event);
            if tev.is_last_contact_up() {
                debug!("👆 Touch gesture on {:?} is over", event.device_id);
                touch.gesture_owner = None;
            }
            return true;
        }
        touch.gesture_owner = None;

        if tev.is_first_contact_down() {
            let contact = &tev.contacts[0];
            let point = Point::new(contact.x as i32, contact.y as i32);
            if let Some(target) = self.find_target_surface(point) {
                debug!(
                    "👆 Touch gesture on {:?} captured by '{}'",
                    event.device_id,
                    target.name()
                );
                touch.gesture_owner = Some(SurfaceRef::new(&target));
                Self::deliver(&target, event);
                return true;
            }
        }

        false
    }
}

impl InputDispatcher for DefaultInputDispatcher {
    fn dispatch(&self, event: &Event) -> CoreResult<bool> {
        let Some(input) = event.as_input() else {
            error!("❌ Input dispatcher got a non-input event: {:?}", event);
            return Err(CoreError::NonInputEvent);
        };

        let mut state = self.state.lock();
        match &input.kind {
            InputEventKind::Key(kev) => self.dispatch_key(&mut state, input, kev).inspect_err(|e| {
                error!("❌ Keyboard dispatch failed: {}", e);
            }),
            InputEventKind::Pointer(pev) => Ok(self.dispatch_pointer(&mut state, input, pev)),
            InputEventKind::Touch(tev) => Ok(self.dispatch_touch(&mut state, input, tev)),
        }
    }

    fn set_focus(&self, target: Option<&Arc<dyn InputSurface>>) {
        let mut state = self.state.lock();
        debug!(
            "⌨️ Keyboard focus -> {}",
            target.map_or_else(|| "<none>".to_string(), |t| t.name())
        );
        state.key_state.clear();
        state.focus = target.map(SurfaceRef::new);
    }

    fn start(&self) {
        let mut state = self.state.lock();
        if !state.started {
            state.started = true;
            info!("⌨️ Input dispatcher started");
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        if state.started {
            state.started = false;
            state.forget_gestures();
            info!("🔌 Input dispatcher stopped");
        }
    }

    fn configuration_changed(&self, when: Duration) {
        debug!("Input configuration changed at {:?}", when);
    }

    fn device_reset(&self, device: DeviceId, when: Duration) {
        debug!("Resetting input state of {:?} at {:?}", device, when);
        let mut state = self.state.lock();
        state.pointers.remove(&device);
        state.touches.remove(&device);
        state.key_state.forget_device(device);
    }
}

impl Drop for DefaultInputDispatcher {
    fn drop(&mut self) {
        self.scene.remove_observer(&*self.scene_observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rectangle;
    use crate::input::event::{KeyAction, TouchAction, TouchContact, WindowEvent};
    use crate::observer::{InlineExecutor, ObserverMultiplexer, ObserverRegistrar};
    use parking_lot::RwLock;

    struct RecordingSurface {
        id: SurfaceId,
        name: String,
        bounds: Rectangle,
        events: Mutex<Vec<InputEvent>>,
    }

    impl RecordingSurface {
        fn new(name: &str, bounds: Rectangle) -> Arc<Self> {
            Arc::new(Self {
                id: SurfaceId::next(),
                name: name.to_string(),
                bounds,
                events: Mutex::new(Vec::new()),
            })
        }

        fn pointer_log(&self) -> Vec<(PointerAction, f32, f32)> {
            self.events
                .lock()
                .iter()
                .filter_map(|e| match &e.kind {
                    InputEventKind::Pointer(p) => Some((p.action, p.x, p.y)),
                    _ => None,
                })
                .collect()
        }

        fn count(&self) -> usize {
            self.events.lock().len()
        }
    }

    impl InputSurface for RecordingSurface {
        fn id(&self) -> SurfaceId {
            self.id
        }
        fn name(&self) -> String {
            self.name.clone()
        }
        fn input_bounds(&self) -> Rectangle {
            self.bounds
        }
        fn consume(&self, event: &InputEvent) {
            self.events.lock().push(event.clone());
        }
    }

    struct StubScene {
        surfaces: RwLock<Vec<Arc<dyn InputSurface>>>,
        observers: ObserverMultiplexer<dyn SceneObserver>,
    }

    impl StubScene {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                surfaces: RwLock::new(Vec::new()),
                observers: ObserverMultiplexer::new(Arc::new(InlineExecutor)),
            })
        }

        fn add(&self, surface: &Arc<RecordingSurface>) -> Arc<dyn InputSurface> {
            let s: Arc<dyn InputSurface> = surface.clone();
            self.surfaces.write().push(s.clone());
            s
        }

        fn remove(&self, id: SurfaceId) {
            self.surfaces.write().retain(|s| s.id() != id);
            self.observers.for_each_observer(move |o| o.surface_removed(id));
        }
    }

    impl InputScene for StubScene {
        fn for_each(&self, visitor: &mut dyn FnMut(&Arc<dyn InputSurface>)) {
            for surface in self.surfaces.read().iter() {
                visitor(surface);
            }
        }
        fn add_observer(&self, observer: Weak<dyn SceneObserver>) {
            self.observers.register_interest(observer);
        }
        fn remove_observer(&self, observer: &(dyn SceneObserver + 'static)) {
            self.observers.unregister_interest(observer);
        }
    }

    const MOUSE: DeviceId = DeviceId(7);
    const FINGER: DeviceId = DeviceId(9);
    const KBD: DeviceId = DeviceId(1);

    fn dispatcher(scene: &Arc<StubScene>) -> DefaultInputDispatcher {
        DefaultInputDispatcher::new(scene.clone(), &InputConfig::default())
    }

    fn pointer(action: PointerAction, buttons: PointerButtons, x: f32, y: f32) -> Event {
        Event::pointer(MOUSE, Duration::from_millis(1), action, buttons, x, y)
    }

    fn motion(x: f32, y: f32) -> Event {
        pointer(PointerAction::Motion, PointerButtons::empty(), x, y)
    }

    fn touch(actions: &[(TouchAction, f32, f32)]) -> Event {
        let contacts = actions
            .iter()
            .enumerate()
            .map(|(i, &(action, x, y))| TouchContact {
                id: i as i32,
                action,
                x,
                y,
                pressure: 1.0,
            })
            .collect();
        Event::touch(FINGER, Duration::ZERO, contacts)
    }

    #[test]
    fn test_hover_capture_and_release_to_nowhere() {
        let scene = StubScene::new();
        let s1 = RecordingSurface::new("s1", Rectangle::new(0, 0, 100, 100));
        scene.add(&s1);
        let d = dispatcher(&scene);

        assert_eq!(d.dispatch(&motion(5.0, 5.0)), Ok(true));
        assert_eq!(
            d.dispatch(&pointer(
                PointerAction::ButtonDown,
                PointerButtons::PRIMARY,
                5.0,
                5.0
            )),
            Ok(true)
        );
        assert_eq!(
            d.dispatch(&pointer(
                PointerAction::Motion,
                PointerButtons::PRIMARY,
                9000.0,
                9000.0
            )),
            Ok(true)
        );
        assert_eq!(
            d.dispatch(&pointer(
                PointerAction::ButtonUp,
                PointerButtons::empty(),
                9000.0,
                9000.0
            )),
            Ok(true)
        );

        assert_eq!(
            s1.pointer_log(),
            vec![
                (PointerAction::Enter, 5.0, 5.0),
                (PointerAction::Motion, 5.0, 5.0),
                (PointerAction::ButtonDown, 5.0, 5.0),
                (PointerAction::Motion, 9000.0, 9000.0),
                (PointerAction::ButtonUp, 9000.0, 9000.0),
                (PointerAction::Leave, 9000.0, 9000.0),
            ]
        );
    }

    #[test]
    fn test_events_are_translated_to_surface_coordinates() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("offset", Rectangle::new(100, 200, 50, 50));
        scene.add(&s);
        let d = dispatcher(&scene);

        d.dispatch(&motion(110.0, 220.0)).unwrap();
        assert_eq!(
            s.pointer_log(),
            vec![
                (PointerAction::Enter, 10.0, 20.0),
                (PointerAction::Motion, 10.0, 20.0)
            ]
        );
    }

    #[test]
    fn test_topmost_surface_wins() {
        let scene = StubScene::new();
        let below = RecordingSurface::new("below", Rectangle::new(0, 0, 100, 100));
        let above = RecordingSurface::new("above", Rectangle::new(50, 50, 100, 100));
        scene.add(&below);
        scene.add(&above);
        let d = dispatcher(&scene);

        d.dispatch(&motion(60.0, 60.0)).unwrap();
        assert_eq!(below.count(), 0);
        assert_eq!(above.count(), 2);

        d.dispatch(&motion(10.0, 10.0)).unwrap();
        assert_eq!(above.pointer_log().last().unwrap().0, PointerAction::Leave);
        assert_eq!(
            below.pointer_log(),
            vec![
                (PointerAction::Enter, 10.0, 10.0),
                (PointerAction::Motion, 10.0, 10.0)
            ]
        );
    }

    #[test]
    fn test_release_over_other_surface_moves_hover() {
        let scene = StubScene::new();
        let left = RecordingSurface::new("left", Rectangle::new(0, 0, 100, 100));
        let right = RecordingSurface::new("right", Rectangle::new(100, 0, 100, 100));
        scene.add(&left);
        scene.add(&right);
        let d = dispatcher(&scene);

        d.dispatch(&pointer(
            PointerAction::ButtonDown,
            PointerButtons::PRIMARY,
            10.0,
            10.0,
        ))
        .unwrap();
        d.dispatch(&pointer(
            PointerAction::Motion,
            PointerButtons::PRIMARY,
            150.0,
            10.0,
        ))
        .unwrap();
        // Still captured: right sees nothing yet
        assert_eq!(right.count(), 0);

        d.dispatch(&pointer(
            PointerAction::ButtonUp,
            PointerButtons::empty(),
            150.0,
            10.0,
        ))
        .unwrap();

        let left_log = left.pointer_log();
        assert_eq!(left_log.last().unwrap(), &(PointerAction::Leave, 150.0, 10.0));
        assert_eq!(right.pointer_log(), vec![(PointerAction::Enter, 50.0, 10.0)]);
    }

    #[test]
    fn test_capture_survives_up_with_buttons_held() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        let other = RecordingSurface::new("other", Rectangle::new(200, 0, 100, 100));
        scene.add(&s);
        scene.add(&other);
        let d = dispatcher(&scene);

        d.dispatch(&pointer(
            PointerAction::ButtonDown,
            PointerButtons::PRIMARY | PointerButtons::SECONDARY,
            10.0,
            10.0,
        ))
        .unwrap();
        d.dispatch(&pointer(
            PointerAction::ButtonUp,
            PointerButtons::SECONDARY,
            250.0,
            10.0,
        ))
        .unwrap();
        d.dispatch(&motion(260.0, 10.0)).unwrap();

        assert_eq!(other.count(), 0);
        assert_eq!(
            s.pointer_log().last().unwrap(),
            &(PointerAction::Motion, 260.0, 10.0)
        );
    }

    #[test]
    fn test_up_without_down_is_dropped() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        scene.add(&s);
        let d = dispatcher(&scene);

        assert_eq!(
            d.dispatch(&pointer(
                PointerAction::ButtonUp,
                PointerButtons::empty(),
                10.0,
                10.0
            )),
            Ok(false)
        );
        assert_eq!(s.count(), 0);
    }

    #[test]
    fn test_miss_is_not_delivered_but_leave_is() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        scene.add(&s);
        let d = dispatcher(&scene);

        assert_eq!(d.dispatch(&motion(500.0, 500.0)), Ok(false));
        d.dispatch(&motion(10.0, 10.0)).unwrap();
        // Leaving reports the leave as delivery
        assert_eq!(d.dispatch(&motion(500.0, 500.0)), Ok(true));
        assert_eq!(d.dispatch(&motion(501.0, 500.0)), Ok(false));
        assert_eq!(s.pointer_log().last().unwrap().0, PointerAction::Leave);
    }

    #[test]
    fn test_dropped_owner_loses_capture() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        let behind = RecordingSurface::new("behind", Rectangle::new(0, 0, 100, 100));
        scene.add(&behind);
        let s_dyn = scene.add(&s);
        let d = dispatcher(&scene);

        d.dispatch(&pointer(
            PointerAction::ButtonDown,
            PointerButtons::PRIMARY,
            10.0,
            10.0,
        ))
        .unwrap();

        // Gone from the scene without a removal notice, and dropped
        scene.surfaces.write().retain(|x| x.id() != s.id);
        drop(s_dyn);
        drop(s);

        assert_eq!(d.dispatch(&motion(20.0, 20.0)), Ok(true));
        assert_eq!(
            behind.pointer_log(),
            vec![
                (PointerAction::Enter, 20.0, 20.0),
                (PointerAction::Motion, 20.0, 20.0)
            ]
        );
    }

    #[test]
    fn test_surface_removed_from_scene_releases_capture() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        scene.add(&s);
        let d = dispatcher(&scene);

        d.dispatch(&pointer(
            PointerAction::ButtonDown,
            PointerButtons::PRIMARY,
            10.0,
            10.0,
        ))
        .unwrap();
        let before = s.count();

        scene.remove(s.id);
        assert_eq!(d.dispatch(&motion(20.0, 20.0)), Ok(false));
        assert_eq!(s.count(), before);
    }

    #[test]
    fn test_touch_gesture_follows_first_finger() {
        let scene = StubScene::new();
        let a = RecordingSurface::new("a", Rectangle::new(0, 0, 100, 100));
        let b = RecordingSurface::new("b", Rectangle::new(100, 0, 100, 100));
        scene.add(&a);
        scene.add(&b);
        let d = dispatcher(&scene);

        assert_eq!(d.dispatch(&touch(&[(TouchAction::Down, 10.0, 10.0)])), Ok(true));
        // Second finger lands on b, still goes to a
        assert_eq!(
            d.dispatch(&touch(&[
                (TouchAction::Change, 10.0, 10.0),
                (TouchAction::Down, 150.0, 10.0)
            ])),
            Ok(true)
        );
        // One of two fingers up: gesture continues
        d.dispatch(&touch(&[
            (TouchAction::Up, 10.0, 10.0),
            (TouchAction::Change, 150.0, 10.0),
        ]))
        .unwrap();
        d.dispatch(&touch(&[(TouchAction::Change, 160.0, 10.0)])).unwrap();
        assert_eq!(b.count(), 0);
        assert_eq!(a.count(), 4);

        // Last finger up ends it
        d.dispatch(&touch(&[(TouchAction::Up, 160.0, 10.0)])).unwrap();
        assert_eq!(a.count(), 5);

        d.dispatch(&touch(&[(TouchAction::Down, 150.0, 10.0)])).unwrap();
        assert_eq!(b.count(), 1);
    }

    #[test]
    fn test_touch_outside_any_surface() {
        let scene = StubScene::new();
        let a = RecordingSurface::new("a", Rectangle::new(0, 0, 100, 100));
        scene.add(&a);
        let d = dispatcher(&scene);

        assert_eq!(d.dispatch(&touch(&[(TouchAction::Down, 500.0, 10.0)])), Ok(false));
        assert_eq!(d.dispatch(&touch(&[(TouchAction::Change, 10.0, 10.0)])), Ok(false));
        assert_eq!(a.count(), 0);
    }

    #[test]
    fn test_keys_go_to_focus() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        let s_dyn = scene.add(&s);
        let d = dispatcher(&scene);

        let down = Event::key(KBD, Duration::ZERO, KeyAction::Down, 30);
        let up = Event::key(KBD, Duration::ZERO, KeyAction::Up, 30);

        assert_eq!(d.dispatch(&down), Ok(false));

        d.set_focus(Some(&s_dyn));
        assert_eq!(d.dispatch(&down), Ok(true));
        assert_eq!(
            d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Repeat, 30)),
            Ok(true)
        );
        assert_eq!(d.dispatch(&up), Ok(true));
        assert_eq!(s.count(), 3);
    }

    #[test]
    fn test_focus_change_resets_key_state() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        let s_dyn = scene.add(&s);
        let d = dispatcher(&scene);

        d.set_focus(Some(&s_dyn));
        d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Down, 30))
            .unwrap();
        d.set_focus(Some(&s_dyn));
        assert_eq!(
            d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Up, 30)),
            Ok(false)
        );
        assert_eq!(
            d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Repeat, 30)),
            Err(CoreError::RepeatWithoutPress {
                device: KBD,
                scan_code: 30
            })
        );
    }

    #[test]
    fn test_repeat_policy_drop() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        let s_dyn = scene.add(&s);
        let config = InputConfig {
            key_repeat: KeyRepeatPolicy::Drop,
        };
        let d = DefaultInputDispatcher::new(scene.clone(), &config);

        d.set_focus(Some(&s_dyn));
        d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Down, 30))
            .unwrap();
        assert_eq!(
            d.dispatch(&Event::key(KBD, Duration::ZERO, KeyAction::Repeat, 30)),
            Ok(false)
        );
        assert_eq!(s.count(), 1);
    }

    #[test]
    fn test_non_input_event_is_rejected() {
        let scene = StubScene::new();
        let d = dispatcher(&scene);
        assert_eq!(
            d.dispatch(&Event::Window(WindowEvent::Resize {
                width: 1,
                height: 1
            })),
            Err(CoreError::NonInputEvent)
        );
    }

    #[test]
    fn test_device_reset_forgets_capture() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        scene.add(&s);
        let d = dispatcher(&scene);

        d.dispatch(&pointer(
            PointerAction::ButtonDown,
            PointerButtons::PRIMARY,
            10.0,
            10.0,
        ))
        .unwrap();
        d.device_reset(MOUSE, Duration::ZERO);

        assert_eq!(
            d.dispatch(&pointer(
                PointerAction::ButtonUp,
                PointerButtons::empty(),
                10.0,
                10.0
            )),
            Ok(false)
        );
    }

    #[test]
    fn test_stop_forgets_gestures() {
        let scene = StubScene::new();
        let s = RecordingSurface::new("s", Rectangle::new(0, 0, 100, 100));
        scene.add(&s);
        let d = dispatcher(&scene);
        d.start();

        d.dispatch(&touch(&[(TouchAction::Down, 10.0, 10.0)])).unwrap();
        d.stop();
        d.start();

        assert_eq!(d.dispatch(&touch(&[(TouchAction::Change, 10.0, 10.0)])), Ok(false));
    }

    #[test]
    fn test_dispatcher_unregisters_scene_observer_on_drop() {
        let scene = StubScene::new();
        let d = dispatcher(&scene);
        assert_eq!(scene.observers.len(), 1);
        drop(d);
        assert!(scene.observers.is_empty());
    }
}
