//! In-memory rendering engine.
//!
//! `SceneEngine` implements the [`CanvasEngine`] facade over a
//! [`SceneGraph`] and publishes the same event stream a browser canvas
//! library would: pointer gestures produce `pointer:*`, transform progress
//! and `element:modified` on release; selection changes produce
//! `selection:*`; document loads report completion with `document:loaded`.
//!
//! Pointer coordinates are viewport coordinates; they are mapped into the
//! scene through the inverse viewport transform.

use crate::hit::{hit_test, hit_test_rect};
use crate::scene::SceneGraph;
use canvas_core::{
    CanvasEngine, Document, Element, ElementId, ElementIds, EngineError, EngineEvent,
    EngineEventKind, EventBus, Viewport, ZOrder,
};
use kurbo::{Point, Rect, Vec2};

/// Pointer gesture in progress.
#[derive(Debug, Clone, Copy)]
enum Drag {
    /// Dragging the selection; `last` is the previous scene point.
    Move { last: Point, moved: bool },
    /// Rubber-band selection from `origin` (scene coordinates).
    Marquee { origin: Point },
}

pub struct SceneEngine {
    scene: SceneGraph,
    bus: EventBus<EngineEvent>,
    viewport: Viewport,
    selection: ElementIds,
    editing: Option<ElementId>,
    drag: Option<Drag>,
    clock_ms: f64,
    live: bool,
    /// When set, `load_document` parks the document until
    /// [`SceneEngine::complete_load`] is called.
    deferred_loads: bool,
    pending_load: Option<Document>,
}

impl Default for SceneEngine {
    fn default() -> Self {
        Self::new(Viewport::default())
    }
}

impl SceneEngine {
    pub fn new(viewport: Viewport) -> Self {
        Self {
            scene: SceneGraph::new(),
            bus: EventBus::new(),
            viewport,
            selection: ElementIds::new(),
            editing: None,
            drag: None,
            clock_ms: 0.0,
            live: true,
            deferred_loads: false,
            pending_load: None,
        }
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn now(&self) -> f64 {
        self.clock_ms
    }

    pub fn advance_clock(&mut self, ms: f64) {
        self.clock_ms += ms;
    }

    pub fn set_time(&mut self, ms: f64) {
        self.clock_ms = ms;
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    /// Make `load_document` asynchronous: completion waits for
    /// [`SceneEngine::complete_load`].
    pub fn set_deferred_loads(&mut self, deferred: bool) {
        self.deferred_loads = deferred;
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending_load.is_some()
    }

    /// Finish a deferred load. Returns `false` if none was pending.
    pub fn complete_load(&mut self) -> bool {
        match self.pending_load.take() {
            Some(document) => {
                self.apply_document(document);
                true
            }
            None => false,
        }
    }

    pub fn editing(&self) -> Option<ElementId> {
        self.editing
    }

    fn emit(&self, kind: EngineEventKind) {
        let event = EngineEvent::new(self.clock_ms, kind);
        log::trace!("engine: {} at {}ms", event.wire_name(), event.time_ms);
        self.bus.emit(&event);
    }

    fn to_scene(&self, point: Point) -> Point {
        self.viewport.transform().inverse() * point
    }

    fn set_selection(&mut self, ids: ElementIds) {
        let was_empty = self.selection.is_empty();
        if ids == self.selection {
            return;
        }
        self.selection = ids;
        let ids = self.selection.clone();
        match (was_empty, ids.is_empty()) {
            (_, true) => self.emit(EngineEventKind::SelectionCleared),
            (true, false) => self.emit(EngineEventKind::SelectionCreated { ids }),
            (false, false) => self.emit(EngineEventKind::SelectionUpdated { ids }),
        }
    }

    fn emit_modified(&self, ids: &[ElementId]) {
        for &id in ids {
            if let Some(el) = self.scene.get_by_id(id) {
                self.emit(EngineEventKind::ElementModified {
                    id,
                    geometry: el.geometry.clone(),
                });
            }
        }
    }

    fn apply_document(&mut self, document: Document) {
        self.editing = None;
        self.drag = None;
        self.set_selection(ElementIds::new());
        for removed in self.scene.clear() {
            self.emit(EngineEventKind::ElementRemoved { id: removed.id });
        }
        self.scene.background = document.background;
        for element in document.objects {
            let id = element.id;
            match self.scene.insert(self.scene.root, element) {
                Ok(_) => self.emit(EngineEventKind::ElementAdded { id }),
                Err(conflict) => log::warn!("engine: dropped element with duplicate id {conflict}"),
            }
        }
        self.emit(EngineEventKind::DocumentLoaded);
    }

    // ─── Pointer input ───────────────────────────────────────────────────

    /// Press at `point`. Selects the element under the pointer (or clears
    /// the selection on empty canvas) and starts a drag.
    pub fn pointer_down(&mut self, point: Point) {
        let scene_point = self.to_scene(point);
        let leaf = hit_test(&self.scene, scene_point);
        let target = leaf.and_then(|id| self.scene.selectable_target(id));
        self.emit(EngineEventKind::PointerDown { target, point });

        match target {
            Some(id) => {
                if !self.selection.contains(&id) {
                    self.set_selection(std::iter::once(id).collect());
                }
                self.drag = Some(Drag::Move {
                    last: scene_point,
                    moved: false,
                });
            }
            None => {
                self.set_selection(ElementIds::new());
                self.drag = Some(Drag::Marquee {
                    origin: scene_point,
                });
            }
        }
    }

    /// Move the pointer. Drags the selection when a press is active.
    pub fn pointer_move(&mut self, point: Point) {
        let scene_point = self.to_scene(point);
        self.emit(EngineEventKind::PointerMove { point });
        let Some(Drag::Move { last, .. }) = self.drag else {
            return;
        };
        let delta = scene_point - last;
        for id in self.selection.clone() {
            if let Some(idx) = self.scene.index_of(id) {
                self.scene.translate(idx, delta);
                self.emit(EngineEventKind::Moving { id });
            }
        }
        self.drag = Some(Drag::Move {
            last: scene_point,
            moved: true,
        });
    }

    /// Release. Every selected element reports `element:modified`, even if
    /// nothing moved.
    pub fn pointer_up(&mut self, point: Point) {
        let scene_point = self.to_scene(point);
        let target = hit_test(&self.scene, scene_point).and_then(|id| self.scene.selectable_target(id));
        self.emit(EngineEventKind::PointerUp { target, point });
        match self.drag.take() {
            Some(Drag::Move { moved, .. }) => {
                log::trace!("engine: release after drag (moved: {moved})");
                let ids = self.selection.clone();
                self.emit_modified(&ids);
            }
            Some(Drag::Marquee { origin }) if origin != scene_point => {
                let area = Rect::from_points(origin, scene_point);
                let hits = hit_test_rect(&self.scene, area);
                self.set_selection(hits.into_iter().collect());
            }
            _ => {}
        }
    }

    /// Press, drag by `delta` and release, as one gesture.
    pub fn drag(&mut self, from: Point, delta: Vec2) {
        self.pointer_down(from);
        self.pointer_move(from + delta);
        self.pointer_up(from + delta);
    }

    /// Press and release without moving.
    pub fn click(&mut self, point: Point) {
        self.pointer_down(point);
        self.pointer_up(point);
    }

    /// Corner-handle scale of the selection.
    pub fn scale_selection(&mut self, sx: f64, sy: f64) {
        let ids = self.selection.clone();
        for &id in &ids {
            if let Some(el) = self.scene.get_by_id_mut(id) {
                el.geometry.scale_x *= sx;
                el.geometry.scale_y *= sy;
                self.emit(EngineEventKind::Scaling { id });
            }
        }
        self.emit(EngineEventKind::PointerUp {
            target: ids.first().copied(),
            point: Point::ORIGIN,
        });
        self.emit_modified(&ids);
    }

    /// Rotation-handle gesture. Rotation is locked, so the angle stays zero
    /// but the engine still reports the gesture.
    pub fn rotate_selection(&mut self, degrees: f64) {
        log::debug!("engine: rotation locked, ignoring {degrees}°");
        let ids = self.selection.clone();
        for &id in &ids {
            self.emit(EngineEventKind::Rotating { id });
        }
        self.emit(EngineEventKind::PointerUp {
            target: ids.first().copied(),
            point: Point::ORIGIN,
        });
        self.emit_modified(&ids);
    }

    pub fn double_click(&mut self, point: Point) {
        let target = hit_test(&self.scene, self.to_scene(point))
            .and_then(|id| self.scene.selectable_target(id));
        self.emit(EngineEventKind::DoubleClick { target, point });
    }

    /// Hover. Publishes `pointer:over` for whatever is under the pointer.
    pub fn pointer_over(&mut self, point: Point) {
        let target = hit_test(&self.scene, self.to_scene(point));
        self.emit(EngineEventKind::PointerOver { target });
    }

    /// Type into the element being edited. Content changes are not
    /// reported until editing ends.
    pub fn type_text(&mut self, text: &str) -> bool {
        let Some(id) = self.editing else {
            return false;
        };
        match self.scene.get_by_id_mut(id).and_then(Element::text_mut) {
            Some(content) => {
                content.text.push_str(text);
                true
            }
            None => false,
        }
    }
}

impl CanvasEngine for SceneEngine {
    fn events(&self) -> &EventBus<EngineEvent> {
        &self.bus
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn add_elements(&mut self, elements: Vec<Element>) -> Result<(), EngineError> {
        if !self.live {
            return Err(EngineError::Disposed);
        }
        // all-or-nothing: validate the whole batch first
        let mut batch = SceneGraph::new();
        for element in &elements {
            if let Some(conflict) = self.scene.first_conflict(element) {
                return Err(EngineError::DuplicateId(conflict));
            }
            batch
                .insert(batch.root, element.clone())
                .map_err(EngineError::DuplicateId)?;
        }
        for element in elements {
            let id = element.id;
            self.scene
                .insert(self.scene.root, element)
                .map_err(EngineError::DuplicateId)?;
            self.emit(EngineEventKind::ElementAdded { id });
        }
        Ok(())
    }

    fn remove_element(&mut self, id: ElementId) -> Result<Element, EngineError> {
        if !self.live {
            return Err(EngineError::Disposed);
        }
        let idx = self
            .scene
            .index_of(id)
            .ok_or(EngineError::UnknownElement(id))?;
        let removed = self
            .scene
            .remove(idx)
            .ok_or(EngineError::UnknownElement(id))?;
        if self.editing == Some(id) {
            self.editing = None;
        }
        if self.selection.contains(&id) {
            let remaining = self.selection.iter().copied().filter(|s| *s != id).collect();
            self.set_selection(remaining);
        }
        self.emit(EngineEventKind::ElementRemoved { id });
        Ok(removed)
    }

    fn clear(&mut self) {
        self.editing = None;
        self.drag = None;
        self.set_selection(ElementIds::new());
        for removed in self.scene.clear() {
            self.emit(EngineEventKind::ElementRemoved { id: removed.id });
        }
    }

    fn set_background(&mut self, background: Option<String>) {
        self.scene.background = background;
    }

    fn serialize(&self) -> Result<Document, EngineError> {
        if !self.live {
            return Err(EngineError::Disposed);
        }
        Ok(self.scene.to_document())
    }

    fn load_document(&mut self, document: Document) -> Result<(), EngineError> {
        if !self.live {
            return Err(EngineError::Disposed);
        }
        if let Err(conflict) = SceneGraph::from_document(&document) {
            return Err(EngineError::Rejected(format!("duplicate id {conflict}")));
        }
        if self.deferred_loads {
            log::debug!("engine: load of {} elements deferred", document.element_count());
            self.pending_load = Some(document);
        } else {
            self.apply_document(document);
        }
        Ok(())
    }

    fn element(&self, id: ElementId) -> Option<Element> {
        self.scene.index_of(id).and_then(|idx| self.scene.to_element(idx))
    }

    fn bounding_box(&self, id: ElementId) -> Option<Rect> {
        self.scene
            .index_of(id)
            .and_then(|idx| self.scene.absolute_bounds(idx))
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn active_selection(&self) -> Vec<ElementId> {
        self.selection.to_vec()
    }

    fn select(&mut self, ids: &[ElementId]) {
        let ids: ElementIds = ids
            .iter()
            .copied()
            .filter(|id| self.scene.contains(*id))
            .collect();
        self.set_selection(ids);
    }

    fn clear_selection(&mut self) {
        self.set_selection(ElementIds::new());
    }

    fn enter_text_editing(&mut self, id: ElementId) -> Result<(), EngineError> {
        let el = self
            .scene
            .get_by_id(id)
            .ok_or(EngineError::UnknownElement(id))?;
        if !el.is_text() {
            return Err(EngineError::NotText(id));
        }
        if self.editing == Some(id) {
            return Ok(());
        }
        self.exit_text_editing();
        self.editing = Some(id);
        self.emit(EngineEventKind::TextEditingEntered { id });
        Ok(())
    }

    fn exit_text_editing(&mut self) {
        if let Some(id) = self.editing.take() {
            self.emit(EngineEventKind::TextEditingExited { id });
        }
    }

    fn translate_elements(&mut self, ids: &[ElementId], delta: Vec2) {
        let mut moved = Vec::with_capacity(ids.len());
        for &id in ids {
            if let Some(idx) = self.scene.index_of(id)
                && self.scene.translate(idx, delta)
            {
                moved.push(id);
            }
        }
        self.emit_modified(&moved);
    }

    fn reorder(&mut self, id: ElementId, order: ZOrder) -> bool {
        let Some(idx) = self.scene.index_of(id) else {
            return false;
        };
        let changed = self.scene.reorder(idx, order);
        if changed {
            self.emit(EngineEventKind::ElementReordered { id });
        }
        changed
    }

    fn dispose(&mut self) {
        if !self.live {
            return;
        }
        self.live = false;
        self.bus.clear();
        self.scene = SceneGraph::new();
        self.selection.clear();
        self.editing = None;
        self.drag = None;
        self.pending_load = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder(engine: &SceneEngine) -> (Rc<RefCell<Vec<&'static str>>>, canvas_core::Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sub = {
            let log = Rc::clone(&log);
            engine
                .events()
                .subscribe(move |ev: &EngineEvent| log.borrow_mut().push(ev.wire_name()))
        };
        (log, sub)
    }

    fn engine_with_rect() -> SceneEngine {
        let mut engine = SceneEngine::default();
        engine
            .add_elements(vec![Element::rect("box", 10.0, 10.0, 100.0, 100.0)])
            .unwrap();
        engine
    }

    #[test]
    fn click_selects_and_reports_modified() {
        let mut engine = engine_with_rect();
        let (log, _sub) = recorder(&engine);
        engine.click(Point::new(50.0, 50.0));
        assert_eq!(
            *log.borrow(),
            vec!["pointer:down", "selection:created", "pointer:up", "element:modified"]
        );
        assert_eq!(engine.active_selection(), vec![ElementId::intern("box")]);
    }

    #[test]
    fn drag_moves_selection() {
        let mut engine = engine_with_rect();
        let (log, _sub) = recorder(&engine);
        engine.drag(Point::new(50.0, 50.0), Vec2::new(30.0, -5.0));
        let el = engine.element(ElementId::intern("box")).unwrap();
        assert_eq!((el.geometry.left, el.geometry.top), (40.0, 5.0));
        assert!(log.borrow().contains(&"element:moving"));
        assert_eq!(log.borrow().last(), Some(&"element:modified"));
    }

    #[test]
    fn drag_respects_zoom() {
        let mut engine = engine_with_rect();
        let mut vp = Viewport::new(800.0, 600.0);
        vp.zoom = 2.0;
        engine.set_viewport(vp);
        engine.drag(Point::new(100.0, 100.0), Vec2::new(20.0, 0.0));
        let el = engine.element(ElementId::intern("box")).unwrap();
        assert_eq!(el.geometry.left, 20.0);
    }

    #[test]
    fn empty_click_clears_selection() {
        let mut engine = engine_with_rect();
        engine.click(Point::new(50.0, 50.0));
        let (log, _sub) = recorder(&engine);
        engine.click(Point::new(700.0, 500.0));
        assert!(engine.active_selection().is_empty());
        assert_eq!(
            *log.borrow(),
            vec!["pointer:down", "selection:cleared", "pointer:up"]
        );
    }

    #[test]
    fn marquee_selects_intersecting() {
        let mut engine = engine_with_rect();
        engine
            .add_element(Element::rect("far", 600.0, 400.0, 10.0, 10.0))
            .unwrap();
        engine.drag(Point::new(0.0, 0.0), Vec2::new(200.0, 200.0));
        assert_eq!(engine.active_selection(), vec![ElementId::intern("box")]);
    }

    #[test]
    fn add_elements_is_all_or_nothing() {
        let mut engine = engine_with_rect();
        let err = engine
            .add_elements(vec![
                Element::rect("new", 0.0, 0.0, 1.0, 1.0),
                Element::rect("box", 0.0, 0.0, 1.0, 1.0),
            ])
            .unwrap_err();
        assert!(matches!(err, EngineError::DuplicateId(_)));
        assert!(engine.element(ElementId::intern("new")).is_none());
    }

    #[test]
    fn load_document_reports_completion() {
        let mut engine = engine_with_rect();
        engine.click(Point::new(50.0, 50.0));
        let (log, _sub) = recorder(&engine);
        engine
            .load_document(Document::new(vec![Element::rect("other", 0.0, 0.0, 5.0, 5.0)]))
            .unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "selection:cleared",
                "element:removed",
                "element:added",
                "document:loaded"
            ]
        );
        assert_eq!(engine.serialize().unwrap().element_count(), 1);
    }

    #[test]
    fn deferred_load_waits_for_completion() {
        let mut engine = engine_with_rect();
        engine.set_deferred_loads(true);
        engine.load_document(Document::default()).unwrap();
        assert!(engine.has_pending_load());
        assert_eq!(engine.serialize().unwrap().element_count(), 1);
        assert!(engine.complete_load());
        assert_eq!(engine.serialize().unwrap().element_count(), 0);
        assert!(!engine.complete_load());
    }

    #[test]
    fn text_editing_is_silent_until_exit() {
        let mut engine = SceneEngine::default();
        engine
            .add_element(Element::textbox("t", "Hello", 0.0, 0.0, 200.0))
            .unwrap();
        let (log, _sub) = recorder(&engine);
        engine.enter_text_editing(ElementId::intern("t")).unwrap();
        assert!(engine.type_text(", world"));
        engine.exit_text_editing();
        assert_eq!(*log.borrow(), vec!["text-edit:entered", "text-edit:exited"]);
        let el = engine.element(ElementId::intern("t")).unwrap();
        assert_eq!(el.text().unwrap().text, "Hello, world");
    }

    #[test]
    fn text_editing_rejects_shapes() {
        let mut engine = engine_with_rect();
        assert!(matches!(
            engine.enter_text_editing(ElementId::intern("box")),
            Err(EngineError::NotText(_))
        ));
    }

    #[test]
    fn rotation_stays_locked() {
        let mut engine = engine_with_rect();
        engine.select(&[ElementId::intern("box")]);
        let (log, _sub) = recorder(&engine);
        engine.rotate_selection(45.0);
        assert_eq!(
            *log.borrow(),
            vec!["element:rotating", "pointer:up", "element:modified"]
        );
        assert_eq!(engine.element(ElementId::intern("box")).unwrap().geometry.angle, 0.0);
    }

    #[test]
    fn dispose_is_terminal() {
        let mut engine = engine_with_rect();
        let (_log, _sub) = recorder(&engine);
        engine.dispose();
        engine.dispose();
        assert!(!engine.is_live());
        assert_eq!(engine.events().listener_count(), 0);
        assert!(matches!(engine.serialize(), Err(EngineError::Disposed)));
    }
}
