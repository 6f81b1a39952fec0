//! Portable element tree for canvas documents.
//!
//! This is the serialized shape the rendering engine emits and accepts:
//! a flat, ordered list of element descriptors plus a background. Groups
//! nest their children under `objects`, positioned relative to the group
//! origin. Field names follow the engine's camelCase wire format so the
//! same tree round-trips through the engine unchanged.

use crate::id::ElementId;
use kurbo::{Affine, Rect, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ─── Geometry ────────────────────────────────────────────────────────────

fn unit() -> f64 {
    1.0
}

/// Position, size and transform of an element in its parent's space.
///
/// `angle` is carried for wire compatibility only; rotation is locked to
/// zero in this editor and normalized away on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Geometry {
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub top: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default = "unit")]
    pub scale_x: f64,
    #[serde(default = "unit")]
    pub scale_y: f64,
    #[serde(default)]
    pub angle: f64,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width: 0.0,
            height: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            angle: 0.0,
        }
    }
}

impl Geometry {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
            ..Self::default()
        }
    }

    /// Transform from this element's local space into its parent's space.
    pub fn local_transform(&self) -> Affine {
        Affine::translate(Vec2::new(self.left, self.top))
            * Affine::scale_non_uniform(self.scale_x, self.scale_y)
    }

    /// Unscaled extent in local space, anchored at the origin.
    pub fn local_rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Bounding box in the parent's space.
    pub fn bounds(&self) -> Rect {
        self.local_transform().transform_rect_bbox(self.local_rect())
    }

    /// Compare two geometries with a small tolerance for float noise.
    pub fn approx_eq(&self, other: &Geometry) -> bool {
        const EPS: f64 = 1e-6;
        let close = |a: f64, b: f64| (a - b).abs() <= EPS;
        close(self.left, other.left)
            && close(self.top, other.top)
            && close(self.width, other.width)
            && close(self.height, other.height)
            && close(self.scale_x, other.scale_x)
            && close(self.scale_y, other.scale_y)
            && close(self.angle, other.angle)
    }
}

// ─── Style ───────────────────────────────────────────────────────────────

/// Paint attributes. Colors stay as the engine's CSS strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stroke: Option<String>,
    #[serde(default = "unit")]
    pub stroke_width: f64,
    #[serde(default = "unit")]
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: None,
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

// ─── Text ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextBaseline {
    #[default]
    Alphabetic,
    Top,
    Hanging,
    Middle,
    Ideographic,
    Bottom,
}

fn default_font_family() -> String {
    "Times New Roman".to_string()
}

fn default_font_size() -> f64 {
    40.0
}

fn default_font_weight() -> String {
    "normal".to_string()
}

fn default_text_align() -> String {
    "left".to_string()
}

/// Content and font of a text element.
///
/// `styles` is the engine's per-character style map; it is opaque to the
/// session and only carried through.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    #[serde(default)]
    pub text: String,
    #[serde(default = "default_font_family")]
    pub font_family: String,
    #[serde(default = "default_font_size")]
    pub font_size: f64,
    #[serde(default = "default_font_weight")]
    pub font_weight: String,
    #[serde(default = "default_text_align")]
    pub text_align: String,
    #[serde(default)]
    pub text_baseline: TextBaseline,
    #[serde(default)]
    pub styles: Map<String, Value>,
}

impl TextContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            font_family: default_font_family(),
            font_size: default_font_size(),
            font_weight: default_font_weight(),
            text_align: default_text_align(),
            text_baseline: TextBaseline::Alphabetic,
            styles: Map::new(),
        }
    }
}

// ─── Elements ────────────────────────────────────────────────────────────

/// Type-specific part of an element, tagged by the wire `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ElementKind {
    #[serde(rename = "textbox")]
    Textbox(TextContent),
    #[serde(rename = "i-text")]
    IText(TextContent),
    #[serde(rename = "text")]
    Text(TextContent),
    #[serde(rename = "rect")]
    Rect {
        #[serde(default)]
        rx: f64,
        #[serde(default)]
        ry: f64,
    },
    #[serde(rename = "circle")]
    Circle { radius: f64 },
    #[serde(rename = "line")]
    Line { x1: f64, y1: f64, x2: f64, y2: f64 },
    #[serde(rename = "image")]
    Image { src: String },
    #[serde(rename = "group")]
    Group {
        #[serde(default)]
        objects: Vec<Element>,
    },
}

impl ElementKind {
    /// Wire tag for this kind (the `type` field).
    pub fn type_name(&self) -> &'static str {
        match self {
            ElementKind::Textbox(_) => "textbox",
            ElementKind::IText(_) => "i-text",
            ElementKind::Text(_) => "text",
            ElementKind::Rect { .. } => "rect",
            ElementKind::Circle { .. } => "circle",
            ElementKind::Line { .. } => "line",
            ElementKind::Image { .. } => "image",
            ElementKind::Group { .. } => "group",
        }
    }

    /// All wire tags the model understands.
    pub const TYPE_NAMES: [&'static str; 8] = [
        "textbox", "i-text", "text", "rect", "circle", "line", "image", "group",
    ];
}

/// A drawable entity: id, kind, geometry and style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(default = "ElementId::anonymous")]
    pub id: ElementId,
    #[serde(flatten)]
    pub kind: ElementKind,
    #[serde(flatten)]
    pub geometry: Geometry,
    #[serde(flatten)]
    pub style: Style,
}

impl Element {
    pub fn new(id: ElementId, kind: ElementKind, geometry: Geometry) -> Self {
        Self {
            id,
            kind,
            geometry,
            style: Style::default(),
        }
    }

    pub fn rect(id: &str, left: f64, top: f64, width: f64, height: f64) -> Self {
        Self::new(
            ElementId::intern(id),
            ElementKind::Rect { rx: 0.0, ry: 0.0 },
            Geometry::new(left, top, width, height),
        )
    }

    pub fn textbox(id: &str, text: &str, left: f64, top: f64, width: f64) -> Self {
        Self::new(
            ElementId::intern(id),
            ElementKind::Textbox(TextContent::new(text)),
            Geometry::new(left, top, width, 45.2),
        )
    }

    pub fn group(id: &str, left: f64, top: f64, objects: Vec<Element>) -> Self {
        let (width, height) = objects.iter().fold((0.0_f64, 0.0_f64), |(w, h), el| {
            let b = el.geometry.bounds();
            (w.max(b.x1), h.max(b.y1))
        });
        Self::new(
            ElementId::intern(id),
            ElementKind::Group { objects },
            Geometry::new(left, top, width, height),
        )
    }

    pub fn is_text(&self) -> bool {
        self.text().is_some()
    }

    pub fn text(&self) -> Option<&TextContent> {
        match &self.kind {
            ElementKind::Textbox(t) | ElementKind::IText(t) | ElementKind::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn text_mut(&mut self) -> Option<&mut TextContent> {
        match &mut self.kind {
            ElementKind::Textbox(t) | ElementKind::IText(t) | ElementKind::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Children of a group, empty for every other kind.
    pub fn children(&self) -> &[Element] {
        match &self.kind {
            ElementKind::Group { objects } => objects,
            _ => &[],
        }
    }

    /// Depth-first search for an element by id, including `self`.
    pub fn find(&self, id: ElementId) -> Option<&Element> {
        if self.id == id {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(id))
    }
}

// ─── Document ────────────────────────────────────────────────────────────

/// The full visible state of the canvas at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub objects: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background: Option<String>,
}

impl Document {
    pub fn new(objects: Vec<Element>) -> Self {
        Self {
            objects,
            background: None,
        }
    }

    /// Number of top-level elements.
    pub fn element_count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn find(&self, id: ElementId) -> Option<&Element> {
        self.objects.iter().find_map(|el| el.find(id))
    }
}

// ─── Viewport ────────────────────────────────────────────────────────────

/// Visible area of the canvas and the scene → viewport transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
    pub pan: Vec2,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            zoom: 1.0,
            pan: Vec2::ZERO,
        }
    }

    /// Scene coordinates → viewport (screen) coordinates.
    pub fn transform(&self) -> Affine {
        Affine::translate(self.pan) * Affine::scale(self.zoom)
    }

    /// Viewport extent in its own coordinates.
    pub fn rect(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }
}
