//! Rendering engine facade and its event vocabulary.
//!
//! The session never reaches into an engine instance directly; it only
//! uses the vetted operations of [`CanvasEngine`] and listens to the
//! [`EngineEvent`]s the engine publishes on its bus.

use crate::error::{EngineError, WireError};
use crate::events::EventBus;
use crate::id::ElementId;
use crate::model::{Document, Element, Geometry, Viewport};
use kurbo::{Point, Rect, Vec2};
use serde_json::Value;
use smallvec::SmallVec;

/// Ids carried by selection events. Most selections are one or two elements.
pub type ElementIds = SmallVec<[ElementId; 4]>;

/// What happened on the engine side.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEventKind {
    ElementAdded { id: ElementId },
    ElementRemoved { id: ElementId },
    /// Fired after a gesture ends, and also after a plain click that
    /// moved nothing. Carries the element's geometry after the fact.
    ElementModified { id: ElementId, geometry: Geometry },
    ElementReordered { id: ElementId },
    Moving { id: ElementId },
    Scaling { id: ElementId },
    Rotating { id: ElementId },
    PointerDown { target: Option<ElementId>, point: Point },
    PointerUp { target: Option<ElementId>, point: Point },
    PointerMove { point: Point },
    PointerOver { target: Option<ElementId> },
    PointerOut { target: Option<ElementId> },
    DoubleClick { target: Option<ElementId>, point: Point },
    SelectionCreated { ids: ElementIds },
    SelectionUpdated { ids: ElementIds },
    SelectionCleared,
    TextEditingEntered { id: ElementId },
    TextEditingExited { id: ElementId },
    /// The asynchronous load started by `load_document` has completed.
    DocumentLoaded,
}

/// An engine event stamped with the engine clock (milliseconds).
#[derive(Debug, Clone, PartialEq)]
pub struct EngineEvent {
    pub time_ms: f64,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn new(time_ms: f64, kind: EngineEventKind) -> Self {
        Self { time_ms, kind }
    }

    pub fn wire_name(&self) -> &'static str {
        self.kind.wire_name()
    }

    /// Decode an event from its wire name and JSON payload.
    pub fn from_wire(name: &str, payload: &Value, time_ms: f64) -> Result<Self, WireError> {
        EngineEventKind::from_wire(name, payload).map(|kind| Self::new(time_ms, kind))
    }
}

impl EngineEventKind {
    pub fn wire_name(&self) -> &'static str {
        match self {
            EngineEventKind::ElementAdded { .. } => "element:added",
            EngineEventKind::ElementRemoved { .. } => "element:removed",
            EngineEventKind::ElementModified { .. } => "element:modified",
            EngineEventKind::ElementReordered { .. } => "element:reordered",
            EngineEventKind::Moving { .. } => "element:moving",
            EngineEventKind::Scaling { .. } => "element:scaling",
            EngineEventKind::Rotating { .. } => "element:rotating",
            EngineEventKind::PointerDown { .. } => "pointer:down",
            EngineEventKind::PointerUp { .. } => "pointer:up",
            EngineEventKind::PointerMove { .. } => "pointer:move",
            EngineEventKind::PointerOver { .. } => "pointer:over",
            EngineEventKind::PointerOut { .. } => "pointer:out",
            EngineEventKind::DoubleClick { .. } => "pointer:dblclick",
            EngineEventKind::SelectionCreated { .. } => "selection:created",
            EngineEventKind::SelectionUpdated { .. } => "selection:updated",
            EngineEventKind::SelectionCleared => "selection:cleared",
            EngineEventKind::TextEditingEntered { .. } => "text-edit:entered",
            EngineEventKind::TextEditingExited { .. } => "text-edit:exited",
            EngineEventKind::DocumentLoaded => "document:loaded",
        }
    }

    /// Hover events. They never reach the classifier.
    pub fn is_hover(&self) -> bool {
        matches!(
            self,
            EngineEventKind::PointerOver { .. } | EngineEventKind::PointerOut { .. }
        )
    }

    pub fn from_wire(name: &str, payload: &Value) -> Result<Self, WireError> {
        let kind = match name {
            "element:added" => EngineEventKind::ElementAdded {
                id: wire_id(payload, "element:added")?,
            },
            "element:removed" => EngineEventKind::ElementRemoved {
                id: wire_id(payload, "element:removed")?,
            },
            "element:modified" => EngineEventKind::ElementModified {
                id: wire_id(payload, "element:modified")?,
                geometry: wire_geometry(payload, "element:modified")?,
            },
            "element:reordered" => EngineEventKind::ElementReordered {
                id: wire_id(payload, "element:reordered")?,
            },
            "element:moving" => EngineEventKind::Moving {
                id: wire_id(payload, "element:moving")?,
            },
            "element:scaling" => EngineEventKind::Scaling {
                id: wire_id(payload, "element:scaling")?,
            },
            "element:rotating" => EngineEventKind::Rotating {
                id: wire_id(payload, "element:rotating")?,
            },
            "pointer:down" => EngineEventKind::PointerDown {
                target: wire_target(payload),
                point: wire_point(payload),
            },
            "pointer:up" => EngineEventKind::PointerUp {
                target: wire_target(payload),
                point: wire_point(payload),
            },
            "pointer:move" => EngineEventKind::PointerMove {
                point: wire_point(payload),
            },
            "pointer:over" => EngineEventKind::PointerOver {
                target: wire_target(payload),
            },
            "pointer:out" => EngineEventKind::PointerOut {
                target: wire_target(payload),
            },
            "pointer:dblclick" => EngineEventKind::DoubleClick {
                target: wire_target(payload),
                point: wire_point(payload),
            },
            "selection:created" => EngineEventKind::SelectionCreated {
                ids: wire_ids(payload, "selection:created")?,
            },
            "selection:updated" => EngineEventKind::SelectionUpdated {
                ids: wire_ids(payload, "selection:updated")?,
            },
            "selection:cleared" => EngineEventKind::SelectionCleared,
            "text-edit:entered" => EngineEventKind::TextEditingEntered {
                id: wire_id(payload, "text-edit:entered")?,
            },
            "text-edit:exited" => EngineEventKind::TextEditingExited {
                id: wire_id(payload, "text-edit:exited")?,
            },
            "document:loaded" => EngineEventKind::DocumentLoaded,
            other => return Err(WireError::UnknownEvent(other.to_string())),
        };
        Ok(kind)
    }
}

fn wire_id(payload: &Value, event: &'static str) -> Result<ElementId, WireError> {
    payload
        .get("id")
        .and_then(Value::as_str)
        .map(ElementId::intern)
        .ok_or(WireError::MissingField { event, field: "id" })
}

fn wire_target(payload: &Value) -> Option<ElementId> {
    payload
        .get("target")
        .and_then(Value::as_str)
        .map(ElementId::intern)
}

fn wire_point(payload: &Value) -> Point {
    let coord = |key: &str| payload.get(key).and_then(Value::as_f64).unwrap_or(0.0);
    Point::new(coord("x"), coord("y"))
}

fn wire_geometry(payload: &Value, event: &'static str) -> Result<Geometry, WireError> {
    let raw = payload.get("geometry").ok_or(WireError::MissingField {
        event,
        field: "geometry",
    })?;
    serde_json::from_value(raw.clone()).map_err(|source| WireError::Payload { event, source })
}

fn wire_ids(payload: &Value, event: &'static str) -> Result<ElementIds, WireError> {
    let raw = payload
        .get("ids")
        .and_then(Value::as_array)
        .ok_or(WireError::MissingField { event, field: "ids" })?;
    Ok(raw
        .iter()
        .filter_map(Value::as_str)
        .map(ElementId::intern)
        .collect())
}

/// Z-order moves within an element's parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZOrder {
    Backward,
    Forward,
    ToBack,
    ToFront,
}

/// The vetted operations the session may perform on a rendering engine.
///
/// Implementations publish [`EngineEvent`]s on [`CanvasEngine::events`]
/// as a side effect of these calls and of user input they handle
/// themselves (pointer gestures, text editing).
pub trait CanvasEngine {
    /// Bus the engine publishes its raw events on.
    fn events(&self) -> &EventBus<EngineEvent>;

    /// Whether the underlying handle is still usable.
    fn is_live(&self) -> bool;

    /// Append elements on top of the current document.
    fn add_elements(&mut self, elements: Vec<Element>) -> Result<(), EngineError>;

    fn add_element(&mut self, element: Element) -> Result<(), EngineError> {
        self.add_elements(vec![element])
    }

    /// Remove an element (top-level or nested) and return it.
    fn remove_element(&mut self, id: ElementId) -> Result<Element, EngineError>;

    /// Remove every element.
    fn clear(&mut self);

    fn set_background(&mut self, background: Option<String>);

    /// Serialize the visible document into the portable tree.
    fn serialize(&self) -> Result<Document, EngineError>;

    /// Replace the document. Completion is reported by a
    /// [`EngineEventKind::DocumentLoaded`] event, which may arrive later.
    fn load_document(&mut self, document: Document) -> Result<(), EngineError>;

    fn element(&self, id: ElementId) -> Option<Element>;

    /// Bounding box in scene coordinates.
    fn bounding_box(&self, id: ElementId) -> Option<Rect>;

    fn viewport(&self) -> Viewport;

    fn active_selection(&self) -> Vec<ElementId>;

    fn select(&mut self, ids: &[ElementId]);

    fn clear_selection(&mut self);

    fn enter_text_editing(&mut self, id: ElementId) -> Result<(), EngineError>;

    fn exit_text_editing(&mut self);

    /// Move elements without a pointer gesture (keyboard nudges).
    fn translate_elements(&mut self, ids: &[ElementId], delta: Vec2);

    /// Change an element's z-order. Returns `false` when nothing moved.
    fn reorder(&mut self, id: ElementId, order: ZOrder) -> bool;

    /// Release the engine. Every later call is a no-op or `Disposed`.
    fn dispose(&mut self);
}
