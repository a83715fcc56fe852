//! Capabilities the dispatcher needs from surfaces and from the scene

use std::sync::{Arc, Weak};

use super::event::InputEvent;
use crate::geometry::{Point, Rectangle};
use crate::scene::{SceneObserver, SurfaceId};

/// Anything that can receive input
pub trait InputSurface: Send + Sync {
    fn id(&self) -> SurfaceId;

    fn name(&self) -> String;

    /// Bounds in global coordinates; delivered events are made relative to
    /// its top-left corner.
    fn input_bounds(&self) -> Rectangle;

    fn input_area_contains(&self, point: Point) -> bool {
        self.input_bounds().contains_point(point)
    }

    /// Receives an event already translated into surface-local coordinates.
    ///
    /// Called with the dispatcher lock held: implementations must not
    /// dispatch again or remove surfaces from the scene.
    fn consume(&self, event: &InputEvent);
}

/// The ordered collection of input targets
pub trait InputScene: Send + Sync {
    /// Visit surfaces back-to-front: later surfaces are visually on top
    fn for_each(&self, visitor: &mut dyn FnMut(&Arc<dyn InputSurface>));

    fn add_observer(&self, observer: Weak<dyn SceneObserver>);

    fn remove_observer(&self, observer: &(dyn SceneObserver + 'static));
}
