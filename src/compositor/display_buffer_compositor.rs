//! One output's frame: composite the scene or scan out a single buffer

use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::arbiter::CompositorId;
use super::buffer::Buffer;
use super::bypass::bypass_candidate;
use super::occlusion::filter_occlusions_from;
use super::renderable::{Renderable, Scene};
use super::report::CompositorReport;
use crate::geometry::{Point, Rectangle};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    #[default]
    Normal,
    Left,
    Inverted,
    Right,
}

/// An output's framebuffer
pub trait DisplayBuffer: Send + Sync {
    /// Area of the global coordinate space this output shows
    fn view_area(&self) -> Rectangle;

    fn can_bypass(&self) -> bool;

    fn orientation(&self) -> Orientation {
        Orientation::Normal
    }

    fn make_current(&self);

    /// Present what the renderer drew
    fn post_update(&self);

    /// Present `buffer` directly, skipping composition
    fn post_bypass(&self, buffer: Arc<dyn Buffer>);
}

pub trait Renderer: Send + Sync {
    fn set_rotation(&self, orientation: Orientation);

    fn set_viewport(&self, viewport: Rectangle);

    fn begin(&self);

    fn render(&self, renderable: &Renderable);

    fn end(&self);

    /// Release resources while the output is bypassed
    fn suspend(&self);
}

pub struct DisplayBufferCompositor {
    id: CompositorId,
    display_buffer: Arc<dyn DisplayBuffer>,
    scene: Arc<dyn Scene>,
    renderer: Arc<dyn Renderer>,
    report: Arc<dyn CompositorReport>,
    bypass_enabled: bool,
    last_pass_rendered_anything: bool,
    viewport: Rectangle,
    zoom_mag: f32,
    cursor_pos: Point,
}

impl DisplayBufferCompositor {
    pub fn new(
        display_buffer: Arc<dyn DisplayBuffer>,
        scene: Arc<dyn Scene>,
        renderer: Arc<dyn Renderer>,
        report: Arc<dyn CompositorReport>,
    ) -> Self {
        let id = CompositorId::new();
        let viewport = display_buffer.view_area();
        scene.register_compositor(id);
        report.added_display(id, viewport);

        Self {
            id,
            display_buffer,
            scene,
            renderer,
            report,
            bypass_enabled: true,
            last_pass_rendered_anything: false,
            viewport,
            zoom_mag: 1.0,
            cursor_pos: Point::default(),
        }
    }

    /// Disable bypass even on outputs that support it
    pub fn with_bypass(mut self, enabled: bool) -> Self {
        self.bypass_enabled = enabled;
        self
    }

    pub fn id(&self) -> CompositorId {
        self.id
    }

    pub fn viewport(&self) -> Rectangle {
        self.viewport
    }

    pub fn zoom_mag(&self) -> f32 {
        self.zoom_mag
    }

    /// Produce one frame. Returns true if the scene still holds frames this
    /// output has not shown, so another pass should follow right away.
    pub fn composite(&mut self) -> bool {
        self.report.began_frame(self.id);

        let mut renderable_list = self.scene.renderable_list_for(self.id);
        filter_occlusions_from(&mut renderable_list, self.viewport);

        let mut uncomposited_buffers = renderable_list
            .iter()
            .any(|r| r.buffers_ready_for_compositor > 1);

        let mut bypassed = false;
        if self.bypass_enabled
            && self.viewport == self.display_buffer.view_area()
            && self.display_buffer.can_bypass()
        {
            if let Some(candidate) = bypass_candidate(&renderable_list, self.viewport) {
                if candidate.buffer.can_bypass() {
                    trace!("{:?} bypassing with {:?}", self.id, candidate.buffer.id());
                    self.display_buffer.post_bypass(candidate.buffer.clone());
                    self.renderer.suspend();
                    bypassed = true;
                }
            }
        }

        if !bypassed {
            self.display_buffer.make_current();

            self.renderer.set_rotation(self.display_buffer.orientation());
            self.renderer.set_viewport(self.viewport);
            self.renderer.begin();

            for renderable in &renderable_list {
                self.renderer.render(renderable);
            }

            self.display_buffer.post_update();
            self.renderer.end();

            // The last visible surface went away: one more pass clears it
            if self.last_pass_rendered_anything && renderable_list.is_empty() {
                uncomposited_buffers = true;
            }
            self.last_pass_rendered_anything = !renderable_list.is_empty();
        }

        self.report.finished_frame(self.id, bypassed);
        uncomposited_buffers
    }

    pub fn on_cursor_movement(&mut self, position: Point) {
        self.cursor_pos = position;
        if self.zoom_mag != 1.0 {
            self.update_viewport();
        }
    }

    pub fn zoom(&mut self, magnification: f32) {
        debug!("🔍 {:?} zoom x{}", self.id, magnification);
        self.zoom_mag = magnification;
        self.update_viewport();
    }

    fn update_viewport(&mut self) {
        let view_area = self.display_buffer.view_area();

        if self.zoom_mag == 1.0 {
            // Exact, no float round trip
            self.viewport = view_area;
            return;
        }

        let db_width = view_area.width as f32;
        let db_height = view_area.height as f32;

        let zoom_width = db_width / self.zoom_mag;
        let zoom_height = db_height / self.zoom_mag;

        let normal_x = (self.cursor_pos.x - view_area.x) as f32 / db_width;
        let normal_y = (self.cursor_pos.y - view_area.y) as f32 / db_height;

        // Keep the cursor over the same content it points at unzoomed
        let zoom_x = (view_area.x as f32 + (db_width - zoom_width) * normal_x) as i32;
        let zoom_y = (view_area.y as f32 + (db_height - zoom_height) * normal_y) as i32;

        self.viewport = Rectangle::new(zoom_x, zoom_y, zoom_width as u32, zoom_height as u32);
    }
}

impl Drop for DisplayBufferCompositor {
    fn drop(&mut self) {
        self.scene.unregister_compositor(self.id);
    }
}
