//! Surface z-ordering and the scene facade used by input and compositing
//!
//! This module provides `SurfaceStack`, the ordered collection of surfaces
//! that makes up the scene. Surfaces are ordered from bottom to top, with
//! the last surface being the top-most visible one. The stack is both the
//! input dispatcher's `InputScene` and the compositor's `Scene`.

use log::debug;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use super::surface::BasicSurface;
use super::{SceneObserver, SceneObservers, SurfaceId};
use crate::compositor::arbiter::CompositorId;
use crate::compositor::renderable::{Renderable, Scene};
use crate::geometry::Point;
use crate::input::surface::{InputScene, InputSurface};
use crate::observer::{Executor, ObserverRegistrar};

struct StackEntry {
    surface: Arc<BasicSurface>,
    input: Arc<dyn InputSurface>,
}

#[derive(Default)]
struct Layers {
    /// Surfaces ordered from bottom to top
    entries: Vec<StackEntry>,

    /// Fast lookup: surface ID -> position in stack
    positions: HashMap<SurfaceId, usize>,
}

impl Layers {
    fn rebuild_positions(&mut self) {
        self.positions.clear();
        for (pos, entry) in self.entries.iter().enumerate() {
            self.positions.insert(entry.surface.id(), pos);
        }
    }

    fn take(&mut self, id: SurfaceId) -> Option<StackEntry> {
        let pos = self.positions.remove(&id)?;
        let entry = self.entries.remove(pos);
        self.rebuild_positions();
        Some(entry)
    }
}

/// Manages the stacking order of the scene's surfaces.
///
/// Every mutation releases the stack lock before observers are notified,
/// so observers may call straight back into the stack.
///
/// # Examples
///
/// ```
/// use keystone::input::InputSurface;
/// use keystone::observer::InlineExecutor;
/// use keystone::scene::{BasicSurface, SurfaceParams, SurfaceStack};
/// use std::sync::Arc;
///
/// let stack = SurfaceStack::new(Arc::new(InlineExecutor));
/// let a = Arc::new(BasicSurface::new(SurfaceParams::default()));
/// let b = Arc::new(BasicSurface::new(SurfaceParams::default()));
/// stack.add_surface(a.clone());
/// stack.add_surface(b.clone());
///
/// stack.raise(a.id());
/// assert_eq!(stack.stacking_order(), vec![b.id(), a.id()]);
/// ```
pub struct SurfaceStack {
    layers: RwLock<Layers>,
    observers: Arc<SceneObservers>,
}

impl SurfaceStack {
    /// Creates an empty stack whose observers run on `executor` unless they
    /// ask for their own.
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            layers: RwLock::new(Layers::default()),
            observers: Arc::new(SceneObservers::new(executor)),
        }
    }

    /// Adds a surface on top of the stack.
    ///
    /// # Returns
    ///
    /// `true` if the surface was added, `false` if it was already present
    pub fn add_surface(&self, surface: Arc<BasicSurface>) -> bool {
        let id = surface.id();
        {
            let mut layers = self.layers.write();
            if layers.positions.contains_key(&id) {
                return false;
            }
            let position = layers.entries.len();
            let input: Arc<dyn InputSurface> = surface.clone();
            layers.entries.push(StackEntry {
                surface: surface.clone(),
                input,
            });
            layers.positions.insert(id, position);
        }

        surface.attach_to_scene(Arc::downgrade(&self.observers));
        debug!("🪟 Surface '{}' ({:?}) added to scene", surface.name(), id);
        self.observers.surface_added(id);
        self.observers.scene_changed();
        true
    }

    /// Removes a surface from the stack.
    ///
    /// # Returns
    ///
    /// The removed surface, or `None` if it was not in the stack
    pub fn remove_surface(&self, id: SurfaceId) -> Option<Arc<BasicSurface>> {
        let entry = self.layers.write().take(id)?;

        entry.surface.detach_from_scene();
        debug!("🪟 Surface {:?} removed from scene", id);
        self.observers.surface_removed(id);
        self.observers.scene_changed();
        Some(entry.surface)
    }

    /// Raises a surface to the top of the stack.
    ///
    /// # Returns
    ///
    /// `true` if the surface was raised, `false` if it wasn't in the stack
    pub fn raise(&self, id: SurfaceId) -> bool {
        {
            let mut layers = self.layers.write();
            let Some(entry) = layers.take(id) else {
                return false;
            };
            layers.entries.push(entry);
            layers.rebuild_positions();
        }
        self.notify_reordered();
        true
    }

    /// Lowers a surface to the bottom of the stack.
    ///
    /// # Returns
    ///
    /// `true` if the surface was lowered, `false` if it wasn't in the stack
    pub fn lower(&self, id: SurfaceId) -> bool {
        {
            let mut layers = self.layers.write();
            let Some(entry) = layers.take(id) else {
                return false;
            };
            layers.entries.insert(0, entry);
            layers.rebuild_positions();
        }
        self.notify_reordered();
        true
    }

    /// Places a surface immediately above another one.
    ///
    /// # Returns
    ///
    /// `true` if successful, `false` if either surface wasn't in the stack
    pub fn raise_above(&self, id: SurfaceId, above: SurfaceId) -> bool {
        {
            let mut layers = self.layers.write();
            if id == above || !layers.positions.contains_key(&above) {
                return false;
            }
            let Some(entry) = layers.take(id) else {
                return false;
            };
            // Target position may have shifted after removal
            let new_pos = layers.positions.get(&above).map_or(0, |&p| p + 1);
            layers.entries.insert(new_pos, entry);
            layers.rebuild_positions();
        }
        self.notify_reordered();
        true
    }

    fn notify_reordered(&self) {
        self.observers.surfaces_reordered();
        self.observers.scene_changed();
    }

    /// Returns surface IDs in bottom-to-top order.
    pub fn stacking_order(&self) -> Vec<SurfaceId> {
        self.layers
            .read()
            .entries
            .iter()
            .map(|e| e.surface.id())
            .collect()
    }

    pub fn surface(&self, id: SurfaceId) -> Option<Arc<BasicSurface>> {
        let layers = self.layers.read();
        let pos = *layers.positions.get(&id)?;
        Some(layers.entries[pos].surface.clone())
    }

    /// Returns the top-most surface.
    pub fn top(&self) -> Option<Arc<BasicSurface>> {
        self.layers.read().entries.last().map(|e| e.surface.clone())
    }

    /// Top-most surface accepting input at `point`
    pub fn surface_at(&self, point: Point) -> Option<Arc<BasicSurface>> {
        self.surfaces()
            .into_iter()
            .rev()
            .find(|s| s.input_area_contains(point))
    }

    pub fn len(&self) -> usize {
        self.layers.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: SurfaceId) -> bool {
        self.layers.read().positions.contains_key(&id)
    }

    fn surfaces(&self) -> Vec<Arc<BasicSurface>> {
        self.layers
            .read()
            .entries
            .iter()
            .map(|e| e.surface.clone())
            .collect()
    }

    pub fn add_observer(&self, observer: Weak<dyn SceneObserver>) {
        self.observers.register_interest(observer);
    }

    pub fn add_observer_with(&self, observer: Weak<dyn SceneObserver>, executor: Arc<dyn Executor>) {
        self.observers.register_interest_with(observer, executor);
    }

    pub fn remove_observer(&self, observer: &(dyn SceneObserver + 'static)) {
        self.observers.unregister_interest(observer);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

impl InputScene for SurfaceStack {
    fn for_each(&self, visitor: &mut dyn FnMut(&Arc<dyn InputSurface>)) {
        let inputs: Vec<Arc<dyn InputSurface>> = self
            .layers
            .read()
            .entries
            .iter()
            .map(|e| e.input.clone())
            .collect();
        for input in &inputs {
            visitor(input);
        }
    }

    fn add_observer(&self, observer: Weak<dyn SceneObserver>) {
        SurfaceStack::add_observer(self, observer);
    }

    fn remove_observer(&self, observer: &(dyn SceneObserver + 'static)) {
        SurfaceStack::remove_observer(self, observer);
    }
}

impl Scene for SurfaceStack {
    fn renderable_list_for(&self, id: CompositorId) -> Vec<Renderable> {
        self.surfaces()
            .iter()
            .filter_map(|s| s.renderable_for(id))
            .collect()
    }

    fn add_observer(&self, observer: Weak<dyn SceneObserver>) {
        SurfaceStack::add_observer(self, observer);
    }

    fn remove_observer(&self, observer: &(dyn SceneObserver + 'static)) {
        SurfaceStack::remove_observer(self, observer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compositor::buffer::{Buffer, SoftwareBuffer};
    use crate::geometry::Size;
    use crate::observer::InlineExecutor;
    use crate::scene::SurfaceParams;
    use parking_lot::Mutex;

    fn stack() -> Arc<SurfaceStack> {
        Arc::new(SurfaceStack::new(Arc::new(InlineExecutor)))
    }

    fn surface(x: i32) -> Arc<BasicSurface> {
        Arc::new(BasicSurface::new(SurfaceParams {
            name: format!("surface@{}", x),
            top_left: Point::new(x, 0),
            size: Size::new(100, 100),
            ..SurfaceParams::default()
        }))
    }

    #[test]
    fn test_add_puts_on_top() {
        let stack = stack();
        let (a, b) = (surface(0), surface(0));
        assert!(stack.add_surface(a.clone()));
        assert!(stack.add_surface(b.clone()));
        assert!(!stack.add_surface(a.clone()));

        assert_eq!(stack.stacking_order(), vec![a.id(), b.id()]);
        assert_eq!(stack.top().map(|s| s.id()), Some(b.id()));
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_reordering() {
        let stack = stack();
        let (a, b, c) = (surface(0), surface(0), surface(0));
        for s in [&a, &b, &c] {
            stack.add_surface((*s).clone());
        }

        assert!(stack.raise(a.id()));
        assert_eq!(stack.stacking_order(), vec![b.id(), c.id(), a.id()]);

        assert!(stack.lower(c.id()));
        assert_eq!(stack.stacking_order(), vec![c.id(), b.id(), a.id()]);

        assert!(stack.raise_above(c.id(), b.id()));
        assert_eq!(stack.stacking_order(), vec![b.id(), c.id(), a.id()]);

        assert!(!stack.raise_above(c.id(), c.id()));
        assert!(!stack.raise(SurfaceId::next()));
    }

    #[test]
    fn test_remove() {
        let stack = stack();
        let (a, b) = (surface(0), surface(0));
        stack.add_surface(a.clone());
        stack.add_surface(b.clone());

        assert_eq!(stack.remove_surface(a.id()).map(|s| s.id()), Some(a.id()));
        assert!(stack.remove_surface(a.id()).is_none());
        assert!(!stack.contains(a.id()));
        assert_eq!(stack.surface(b.id()).map(|s| s.id()), Some(b.id()));
    }

    #[test]
    fn test_surface_at_prefers_top() {
        let stack = stack();
        let (below, above) = (surface(0), surface(50));
        stack.add_surface(below.clone());
        stack.add_surface(above.clone());

        assert_eq!(stack.surface_at(Point::new(60, 10)).map(|s| s.id()), Some(above.id()));
        assert_eq!(stack.surface_at(Point::new(10, 10)).map(|s| s.id()), Some(below.id()));
        assert!(stack.surface_at(Point::new(500, 10)).is_none());
    }

    #[test]
    fn test_renderables_skip_surfaces_without_buffers() {
        let stack = stack();
        let (a, b) = (surface(0), surface(0));
        stack.add_surface(a.clone());
        stack.add_surface(b.clone());
        let buffer: Arc<dyn Buffer> = Arc::new(SoftwareBuffer::new(Size::new(100, 100)));
        b.submit_buffer(buffer);

        let list = stack.renderable_list_for(CompositorId::new());
        assert_eq!(list.iter().map(|r| r.id).collect::<Vec<_>>(), vec![b.id()]);
    }

    #[derive(Default)]
    struct Recorder {
        stack: Mutex<Weak<SurfaceStack>>,
        log: Mutex<Vec<String>>,
    }

    impl SceneObserver for Recorder {
        fn surface_added(&self, surface: SurfaceId) {
            // Calls back into the stack from inside the notification
            let len = self.stack.lock().upgrade().map_or(0, |s| s.len());
            self.log.lock().push(format!("added {} (len {})", surface.0, len));
        }
        fn surface_removed(&self, surface: SurfaceId) {
            self.log.lock().push(format!("removed {}", surface.0));
        }
        fn surfaces_reordered(&self) {
            self.log.lock().push("reordered".to_string());
        }
    }

    #[test]
    fn test_observers_are_notified_outside_the_lock() {
        let stack = stack();
        let recorder = Arc::new(Recorder::default());
        *recorder.stack.lock() = Arc::downgrade(&stack);
        let observer: Arc<dyn SceneObserver> = recorder.clone();
        stack.add_observer(Arc::downgrade(&observer));

        let (a, b) = (surface(0), surface(0));
        stack.add_surface(a.clone());
        stack.add_surface(b.clone());
        stack.raise(a.id());
        stack.remove_surface(b.id());

        assert_eq!(
            *recorder.log.lock(),
            vec![
                format!("added {} (len 1)", a.id().0),
                format!("added {} (len 2)", b.id().0),
                "reordered".to_string(),
                format!("removed {}", b.id().0),
            ]
        );

        stack.remove_observer(&*observer);
        assert_eq!(stack.observer_count(), 0);
    }

    #[test]
    fn test_input_scene_visits_bottom_to_top() {
        let stack = stack();
        let (a, b) = (surface(0), surface(0));
        stack.add_surface(a.clone());
        stack.add_surface(b.clone());

        let mut visited = Vec::new();
        InputScene::for_each(&*stack, &mut |s| visited.push(s.id()));
        assert_eq!(visited, vec![a.id(), b.id()]);
    }
}
