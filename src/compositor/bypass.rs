//! Choosing a renderable that can be scanned out without compositing

use super::renderable::Renderable;
use crate::geometry::Rectangle;

/// The topmost renderable that touches `view_area` decides: it is the
/// bypass candidate if it is opaque and covers exactly `view_area`.
/// Anything stacked below it is irrelevant.
pub fn bypass_candidate(list: &[Renderable], view_area: Rectangle) -> Option<&Renderable> {
    list.iter()
        .rev()
        .find(|r| r.screen_position.overlaps(&view_area))
        .filter(|r| r.is_opaque() && r.screen_position == view_area)
}
