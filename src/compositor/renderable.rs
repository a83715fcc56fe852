//! What the compositor sees of the scene for one frame

use std::sync::{Arc, Weak};

use super::arbiter::CompositorId;
use super::buffer::Buffer;
use crate::geometry::Rectangle;
use crate::scene::{SceneObserver, SurfaceId};

/// Snapshot of one surface taken for one compositor pass
#[derive(Debug, Clone)]
pub struct Renderable {
    pub id: SurfaceId,
    pub buffer: Arc<dyn Buffer>,
    pub screen_position: Rectangle,
    pub alpha: f32,
    /// Has a non-rectangular or partially transparent outline
    pub shaped: bool,
    /// Frames still waiting for this compositor after `buffer` was taken
    pub buffers_ready_for_compositor: usize,
}

impl Renderable {
    /// Fully hides whatever is beneath its rectangle
    pub fn is_opaque(&self) -> bool {
        self.alpha >= 1.0 && !self.shaped
    }
}

/// The compositor's view of the scene
pub trait Scene: Send + Sync {
    /// Renderables bottom-to-top. Taking the list consumes a frame from
    /// every stream on behalf of `id`.
    fn renderable_list_for(&self, id: CompositorId) -> Vec<Renderable>;

    fn register_compositor(&self, _id: CompositorId) {}

    fn unregister_compositor(&self, _id: CompositorId) {}

    fn add_observer(&self, observer: Weak<dyn SceneObserver>);

    fn remove_observer(&self, observer: &(dyn SceneObserver + 'static));
}
