//! Hit testing: scene point → element lookup.
//!
//! Reverse-walks the paint order (front to back) so the topmost element
//! under the cursor wins.

use crate::scene::SceneGraph;
use canvas_core::ElementId;
use kurbo::{Point, Rect};
use petgraph::graph::NodeIndex;

/// Find the topmost element at `point` (scene coordinates).
/// Returns the deepest hit; `None` means the background was hit.
pub fn hit_test(scene: &SceneGraph, point: Point) -> Option<ElementId> {
    hit_test_node(scene, scene.root, point)
}

fn hit_test_node(scene: &SceneGraph, idx: NodeIndex, point: Point) -> Option<ElementId> {
    for &child in scene.children(idx).iter().rev() {
        if let Some(hit) = hit_test_node(scene, child, point) {
            return Some(hit);
        }
    }

    let el = scene.get(idx)?;
    if let Some(bounds) = scene.absolute_bounds(idx)
        && bounds.contains(point)
    {
        return Some(el.id);
    }
    None
}

/// Top-level elements whose bounds intersect `area`, back to front.
/// Used for marquee selection.
pub fn hit_test_rect(scene: &SceneGraph, area: Rect) -> Vec<ElementId> {
    scene
        .children(scene.root)
        .iter()
        .filter(|&&idx| {
            scene
                .absolute_bounds(idx)
                .is_some_and(|b| b.overlaps(area))
        })
        .filter_map(|&idx| scene.get(idx).map(|el| el.id))
        .collect()
}
