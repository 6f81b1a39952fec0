//! Active selection and its geometry fingerprint.
//!
//! When a selection is made, the geometry of every selected element is
//! captured. A later `element:modified` whose geometry differs from the
//! fingerprint is a real change even without a pointer gesture (keyboard
//! nudges, host-driven moves); one that matches is just a click.

use canvas_core::{CanvasEngine, ElementId, ElementIds, Geometry};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Selection {
    ids: ElementIds,
    fingerprints: HashMap<ElementId, Geometry>,
}

impl Selection {
    /// Capture `ids` and their current geometry from the engine. Ids the
    /// engine does not know are dropped.
    pub fn capture<E: CanvasEngine + ?Sized>(engine: &E, ids: &[ElementId]) -> Self {
        let mut selection = Self::default();
        for &id in ids {
            if let Some(el) = engine.element(id) {
                selection.ids.push(id);
                selection.fingerprints.insert(id, el.geometry);
            }
        }
        selection
    }

    pub fn ids(&self) -> &[ElementId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, id: ElementId) -> bool {
        self.ids.contains(&id)
    }

    pub fn fingerprint(&self, id: ElementId) -> Option<&Geometry> {
        self.fingerprints.get(&id)
    }

    /// Whether `geometry` differs from what was captured for `id`.
    /// Elements outside the selection have no fingerprint and never differ.
    pub fn differs(&self, id: ElementId, geometry: &Geometry) -> bool {
        self.fingerprints
            .get(&id)
            .is_some_and(|captured| !captured.approx_eq(geometry))
    }

    /// Accept `geometry` as the new baseline for `id`.
    pub fn refresh(&mut self, id: ElementId, geometry: Geometry) {
        if let Some(captured) = self.fingerprints.get_mut(&id) {
            *captured = geometry;
        }
    }

    /// Forget an element that left the canvas.
    pub fn forget(&mut self, id: ElementId) {
        self.ids.retain(|s| *s != id);
        self.fingerprints.remove(&id);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
        self.fingerprints.clear();
    }
}
