//! The authoritative scene: surfaces in stacking order and the observers
//! that follow its changes.

pub mod surface;
pub mod surface_stack;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::observer::ObserverMultiplexer;

pub use surface::{BasicSurface, EventSink, RecordingEventSink, SurfaceParams};
pub use surface_stack::SurfaceStack;

/// Process-unique surface identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        SurfaceId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Notified about scene changes. Every method has an empty default so
/// observers only implement what they care about.
pub trait SceneObserver: Send + Sync {
    fn surface_added(&self, _surface: SurfaceId) {}

    fn surface_removed(&self, _surface: SurfaceId) {}

    fn surfaces_reordered(&self) {}

    /// Something visible changed: content, position or stacking
    fn scene_changed(&self) {}
}

pub type SceneObservers = ObserverMultiplexer<dyn SceneObserver>;

impl SceneObserver for SceneObservers {
    fn surface_added(&self, surface: SurfaceId) {
        self.for_each_observer(move |o| o.surface_added(surface));
    }

    fn surface_removed(&self, surface: SurfaceId) {
        self.for_each_observer(move |o| o.surface_removed(surface));
    }

    fn surfaces_reordered(&self) {
        self.for_each_observer(|o| o.surfaces_reordered());
    }

    fn scene_changed(&self) {
        self.for_each_observer(|o| o.scene_changed());
    }
}
