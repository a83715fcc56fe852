//! Removal of renderables nobody could see

use super::renderable::Renderable;
use crate::geometry::Rectangle;

fn is_occluded(renderable: &Renderable, area: &Rectangle, coverage: &mut Vec<Rectangle>) -> bool {
    let clipped = renderable.screen_position.intersection_with(area);
    if clipped.is_empty() {
        return true;
    }
    if coverage.iter().any(|covered| covered.contains(&clipped)) {
        return true;
    }
    if renderable.is_opaque() {
        coverage.push(clipped);
    }
    false
}

/// Drop renderables that are outside `area` or fully hidden behind opaque
/// renderables stacked above them. Returns what was dropped, top first.
pub fn filter_occlusions_from(list: &mut Vec<Renderable>, area: Rectangle) -> Vec<Renderable> {
    let mut coverage = Vec::new();
    let mut visible = Vec::with_capacity(list.len());
    let mut occluded = Vec::new();

    // Walk top-down so coverage accumulates from the front
    for renderable in list.drain(..).rev() {
        if is_occluded(&renderable, &area, &mut coverage) {
            occluded.push(renderable);
        } else {
            visible.push(renderable);
        }
    }

    visible.reverse();
    *list = visible;
    occluded
}
