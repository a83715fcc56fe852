//! A concrete scene surface: geometry, a buffer stream and an input sink

use log::trace;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};

use super::{SceneObserver, SceneObservers, SurfaceId};
use crate::compositor::arbiter::{CompositorId, DEFAULT_EXPECTED_CONSUMERS};
use crate::compositor::buffer::Buffer;
use crate::compositor::renderable::Renderable;
use crate::compositor::stream::BufferStream;
use crate::geometry::{Point, Rectangle, Size};
use crate::input::event::InputEvent;
use crate::input::surface::InputSurface;

/// Where a surface's input ends up (the client connection, in a full
/// server)
pub trait EventSink: Send + Sync {
    fn handle_event(&self, event: &InputEvent);
}

/// Keeps every event it is handed
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<InputEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<InputEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl EventSink for RecordingEventSink {
    fn handle_event(&self, event: &InputEvent) {
        self.events.lock().push(event.clone());
    }
}

#[derive(Debug, Clone)]
pub struct SurfaceParams {
    pub name: String,
    pub top_left: Point,
    pub size: Size,
    pub alpha: f32,
    pub shaped: bool,
    pub visible: bool,
    pub framedropping: bool,
    /// How many outputs are expected to composite this surface
    pub expected_consumers: usize,
}

impl Default for SurfaceParams {
    fn default() -> Self {
        Self {
            name: String::new(),
            top_left: Point::default(),
            size: Size::new(1, 1),
            alpha: 1.0,
            shaped: false,
            visible: true,
            framedropping: false,
            expected_consumers: DEFAULT_EXPECTED_CONSUMERS,
        }
    }
}

#[derive(Debug)]
struct SurfaceState {
    top_left: Point,
    size: Size,
    alpha: f32,
    shaped: bool,
    visible: bool,
    /// Surface-local; `None` means the whole surface
    input_region: Option<Rectangle>,
}

pub struct BasicSurface {
    id: SurfaceId,
    name: String,
    state: RwLock<SurfaceState>,
    stream: BufferStream,
    sink: RwLock<Option<Arc<dyn EventSink>>>,
    scene: RwLock<Weak<SceneObservers>>,
}

impl BasicSurface {
    pub fn new(params: SurfaceParams) -> Self {
        Self {
            id: SurfaceId::next(),
            name: params.name,
            state: RwLock::new(SurfaceState {
                top_left: params.top_left,
                size: params.size,
                alpha: params.alpha,
                shaped: params.shaped,
                visible: params.visible,
                input_region: None,
            }),
            stream: BufferStream::with_expected_consumers(
                params.framedropping,
                params.expected_consumers,
            ),
            sink: RwLock::new(None),
            scene: RwLock::new(Weak::new()),
        }
    }

    pub fn id(&self) -> SurfaceId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_event_sink(&self, sink: Arc<dyn EventSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Called by the stack the surface is placed in
    pub(crate) fn attach_to_scene(&self, observers: Weak<SceneObservers>) {
        *self.scene.write() = observers;
    }

    pub(crate) fn detach_from_scene(&self) {
        *self.scene.write() = Weak::new();
    }

    fn notify_changed(&self) {
        let observers = self.scene.read().upgrade();
        if let Some(observers) = observers {
            observers.scene_changed();
        }
    }

    pub fn stream(&self) -> &BufferStream {
        &self.stream
    }

    pub fn submit_buffer(&self, buffer: Arc<dyn Buffer>) {
        trace!("'{}' submitted {:?}", self.name, buffer.id());
        self.stream.submit_buffer(buffer);
        self.notify_changed();
    }

    pub fn move_to(&self, top_left: Point) {
        self.state.write().top_left = top_left;
        self.notify_changed();
    }

    pub fn resize(&self, size: Size) {
        self.state.write().size = size;
        self.notify_changed();
    }

    pub fn set_alpha(&self, alpha: f32) {
        self.state.write().alpha = alpha.clamp(0.0, 1.0);
        self.notify_changed();
    }

    pub fn set_shaped(&self, shaped: bool) {
        self.state.write().shaped = shaped;
        self.notify_changed();
    }

    pub fn set_visible(&self, visible: bool) {
        self.state.write().visible = visible;
        self.notify_changed();
    }

    pub fn is_visible(&self) -> bool {
        self.state.read().visible
    }

    /// Restrict input to `region`, in surface-local coordinates
    pub fn set_input_region(&self, region: Option<Rectangle>) {
        self.state.write().input_region = region;
    }

    pub fn bounds(&self) -> Rectangle {
        let state = self.state.read();
        Rectangle::from_loc_and_size(state.top_left, state.size)
    }

    /// Snapshot for compositor `id`, taking its next frame. `None` while
    /// hidden or before the first buffer.
    pub fn renderable_for(&self, id: CompositorId) -> Option<Renderable> {
        let (screen_position, alpha, shaped) = {
            let state = self.state.read();
            if !state.visible {
                return None;
            }
            (
                Rectangle::from_loc_and_size(state.top_left, state.size),
                state.alpha,
                state.shaped,
            )
        };

        if !self.stream.has_submitted_buffer() {
            return None;
        }
        let buffer = self.stream.lock_compositor_buffer(id).ok()?;

        Some(Renderable {
            id: self.id,
            buffer,
            screen_position,
            alpha,
            shaped,
            buffers_ready_for_compositor: self.stream.buffers_ready_for_compositor(id),
        })
    }
}

impl InputSurface for BasicSurface {
    fn id(&self) -> SurfaceId {
        BasicSurface::id(self)
    }

    fn name(&self) -> String {
        BasicSurface::name(self).to_string()
    }

    fn input_bounds(&self) -> Rectangle {
        self.bounds()
    }

    fn input_area_contains(&self, point: Point) -> bool {
        let state = self.state.read();
        if !state.visible {
            return false;
        }

        let bounds = Rectangle::from_loc_and_size(state.top_left, state.size);
        match state.input_region {
            Some(region) => {
                let global = Rectangle::new(
                    region.x + state.top_left.x,
                    region.y + state.top_left.y,
                    region.width,
                    region.height,
                );
                global.intersection_with(&bounds).contains_point(point)
            }
            None => bounds.contains_point(point),
        }
    }

    fn consume(&self, event: &InputEvent) {
        let sink = self.sink.read().clone();
        if let Some(sink) = sink {
            sink.handle_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::buffer::SoftwareBuffer;
    use crate::input::event::{DeviceId, Event, KeyAction};
    use crate::observer::{InlineExecutor, ObserverRegistrar};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn surface(top_left: Point, size: Size) -> BasicSurface {
        BasicSurface::new(SurfaceParams {
            name: "test".to_string(),
            top_left,
            size,
            ..SurfaceParams::default()
        })
    }

    #[test]
    fn test_input_region_restricts_hits() {
        let s = surface(Point::new(100, 100), Size::new(100, 100));
        assert!(s.input_area_contains(Point::new(150, 150)));

        s.set_input_region(Some(Rectangle::new(0, 0, 10, 10)));
        assert!(s.input_area_contains(Point::new(105, 105)));
        assert!(!s.input_area_contains(Point::new(150, 150)));

        s.set_input_region(None);
        s.set_visible(false);
        assert!(!s.input_area_contains(Point::new(150, 150)));
    }

    #[test]
    fn test_renderable_requires_visible_buffer() {
        let s = surface(Point::new(0, 0), Size::new(10, 10));
        let c = CompositorId::new();
        assert!(s.renderable_for(c).is_none());

        let buffer: Arc<dyn Buffer> = Arc::new(SoftwareBuffer::new(Size::new(10, 10)));
        s.submit_buffer(buffer.clone());
        let renderable = s.renderable_for(c).unwrap();
        assert_eq!(renderable.buffer.id(), buffer.id());
        assert_eq!(renderable.screen_position, Rectangle::new(0, 0, 10, 10));
        assert_eq!(renderable.buffers_ready_for_compositor, 0);

        s.set_visible(false);
        assert!(s.renderable_for(c).is_none());
    }

    #[test]
    fn test_consumed_events_reach_the_sink() {
        let s = surface(Point::new(0, 0), Size::new(10, 10));
        let sink = Arc::new(RecordingEventSink::new());
        s.set_event_sink(sink.clone());

        let event = Event::key(DeviceId(1), Duration::ZERO, KeyAction::Down, 30);
        s.consume(event.as_input().unwrap());
        assert_eq!(sink.take().len(), 1);
    }

    #[test]
    fn test_changes_notify_attached_scene() {
        #[derive(Default)]
        struct Counter(AtomicUsize);
        impl SceneObserver for Counter {
            fn scene_changed(&self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let observers = Arc::new(SceneObservers::new(Arc::new(InlineExecutor)));
        let counter = Arc::new(Counter::default());
        let as_observer: Arc<dyn SceneObserver> = counter.clone();
        observers.register_interest(Arc::downgrade(&as_observer));

        let s = surface(Point::new(0, 0), Size::new(10, 10));
        s.move_to(Point::new(5, 5));
        assert_eq!(counter.0.load(Ordering::SeqCst), 0);

        s.attach_to_scene(Arc::downgrade(&observers));
        s.move_to(Point::new(6, 6));
        s.set_alpha(0.5);
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);

        s.detach_from_scene();
        s.resize(Size::new(1, 1));
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
