//! Outputs and a renderer that draw nothing and remember everything.
//!
//! Used by the `--demo` server mode, the tests and the benches.

use log::trace;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::compositor::buffer::{Buffer, BufferId};
use crate::compositor::display_buffer_compositor::{DisplayBuffer, Orientation, Renderer};
use crate::compositor::renderable::Renderable;
use crate::geometry::Rectangle;
use crate::scene::SurfaceId;

/// Keep at most this many posts in history
const POST_HISTORY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Post {
    Composited,
    Bypass(BufferId),
}

pub struct HeadlessDisplayBuffer {
    view_area: Rectangle,
    bypass_capable: bool,
    orientation: Orientation,
    posts: Mutex<Vec<Post>>,
    make_current_calls: Mutex<u64>,
}

impl HeadlessDisplayBuffer {
    pub fn new(view_area: Rectangle, bypass_capable: bool) -> Self {
        Self {
            view_area,
            bypass_capable,
            orientation: Orientation::Normal,
            posts: Mutex::new(Vec::new()),
            make_current_calls: Mutex::new(0),
        }
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn posts(&self) -> Vec<Post> {
        self.posts.lock().clone()
    }

    pub fn post_count(&self) -> usize {
        self.posts.lock().len()
    }

    pub fn make_current_calls(&self) -> u64 {
        *self.make_current_calls.lock()
    }

    fn push(&self, post: Post) {
        let mut posts = self.posts.lock();
        if posts.len() == POST_HISTORY {
            posts.remove(0);
        }
        posts.push(post);
    }
}

impl DisplayBuffer for HeadlessDisplayBuffer {
    fn view_area(&self) -> Rectangle {
        self.view_area
    }

    fn can_bypass(&self) -> bool {
        self.bypass_capable
    }

    fn orientation(&self) -> Orientation {
        self.orientation
    }

    fn make_current(&self) {
        *self.make_current_calls.lock() += 1;
    }

    fn post_update(&self) {
        self.push(Post::Composited);
    }

    fn post_bypass(&self, buffer: Arc<dyn Buffer>) {
        trace!("Headless scanout of {:?}", buffer.id());
        self.push(Post::Bypass(buffer.id()));
    }
}

#[derive(Default)]
struct RenderLog {
    frames_begun: u64,
    frames_ended: u64,
    suspends: u64,
    rotation: Orientation,
    viewport: Option<Rectangle>,
    current_frame: Vec<SurfaceId>,
    last_frame: Vec<SurfaceId>,
}

/// Counts renderer calls and records what the last frame drew
#[derive(Default)]
pub struct CountingRenderer {
    log: Mutex<RenderLog>,
}

impl CountingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_begun(&self) -> u64 {
        self.log.lock().frames_begun
    }

    pub fn frames_ended(&self) -> u64 {
        self.log.lock().frames_ended
    }

    pub fn suspend_count(&self) -> u64 {
        self.log.lock().suspends
    }

    pub fn rotation(&self) -> Orientation {
        self.log.lock().rotation
    }

    pub fn viewport(&self) -> Option<Rectangle> {
        self.log.lock().viewport
    }

    /// Surfaces drawn by the last completed frame, bottom to top
    pub fn rendered(&self) -> Vec<SurfaceId> {
        self.log.lock().last_frame.clone()
    }
}

impl Renderer for CountingRenderer {
    fn set_rotation(&self, orientation: Orientation) {
        self.log.lock().rotation = orientation;
    }

    fn set_viewport(&self, viewport: Rectangle) {
        self.log.lock().viewport = Some(viewport);
    }

    fn begin(&self) {
        let mut log = self.log.lock();
        log.frames_begun += 1;
        log.current_frame.clear();
    }

    fn render(&self, renderable: &Renderable) {
        self.log.lock().current_frame.push(renderable.id);
    }

    fn end(&self) {
        let mut log = self.log.lock();
        log.frames_ended += 1;
        log.last_frame = std::mem::take(&mut log.current_frame);
    }

    fn suspend(&self) {
        self.log.lock().suspends += 1;
    }
}
