//! Fetched document trees → normalized elements.
//!
//! Persisted documents come in several historical shapes. The element
//! array is probed at a fixed list of locations and the first one present
//! wins. Each element descriptor is then normalized so that it parses as
//! the current [`Element`] model:
//!
//! - type tags are case-folded (`Textbox` → `textbox`, `IText` → `i-text`)
//! - the deprecated `textBaseline: "alphabetical"` becomes `"alphabetic"`
//! - text elements without a `styles` map get an empty one
//! - rotation is reset to zero
//! - missing or duplicate ids are replaced with generated ones
//! - elements of unknown type are skipped

use crate::error::TemplateError;
use crate::id::ElementId;
use crate::model::{Element, ElementKind};
use serde_json::{Map, Value};
use std::borrow::Cow;
use std::collections::HashSet;

/// Locations probed for the element array, in priority order.
pub const ELEMENT_PATHS: &[&[&str]] = &[
    &["canvasData", "objects"],
    &["canvasData", "elements"],
    &["builderData", "objects"],
    &["builderData", "elements"],
    &["builderData", "canvas", "objects"],
    &["objects"],
    &["elements"],
    &["canvas", "objects"],
];

const PROBED: &str = "canvasData.objects, canvasData.elements, builderData.objects, \
builderData.elements, builderData.canvas.objects, objects, elements, canvas.objects";

const TEXT_TYPES: [&str; 3] = ["textbox", "i-text", "text"];

/// What normalization had to change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub types_renamed: usize,
    pub baselines_rewritten: usize,
    pub styles_added: usize,
    pub angles_reset: usize,
    pub ids_assigned: usize,
    pub skipped: Vec<String>,
}

/// A fetched document ready to be inserted into an engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Template {
    pub elements: Vec<Element>,
    pub background: Option<String>,
    /// Dotted path the elements were found at.
    pub source: String,
    pub report: NormalizeReport,
}

impl Template {
    /// Probe `tree` for its element array and normalize every descriptor.
    pub fn from_tree(tree: &Value) -> Result<Self, TemplateError> {
        let tree = decode_embedded(tree).ok_or(TemplateError::NotAnObject)?;
        if !tree.is_object() {
            return Err(TemplateError::NotAnObject);
        }

        let (path, background, raw) = ELEMENT_PATHS
            .iter()
            .find_map(|path| probe(&tree, path).map(|(b, a)| (*path, b, a)))
            .ok_or(TemplateError::NoElements(PROBED))?;
        let source = path.join(".");
        log::debug!("template: {} descriptors at {source}", raw.len());

        let mut report = NormalizeReport::default();
        let mut seen = HashSet::new();
        let mut elements = Vec::with_capacity(raw.len());
        for (index, descriptor) in raw.into_iter().enumerate() {
            let Some(normalized) = normalize_descriptor(descriptor, &mut seen, &mut report) else {
                continue;
            };
            let element: Element = serde_json::from_value(normalized)
                .map_err(|source| TemplateError::Element { index, source })?;
            elements.push(element);
        }

        if !report.skipped.is_empty() {
            log::warn!(
                "template: skipped {} descriptor(s) of unknown type: {:?}",
                report.skipped.len(),
                report.skipped
            );
        }

        Ok(Self {
            elements,
            background,
            source,
            report,
        })
    }
}

/// Some stores keep the canvas tree as a JSON string inside the record.
fn decode_embedded(value: &Value) -> Option<Cow<'_, Value>> {
    match value {
        Value::String(s) => serde_json::from_str(s).ok().map(Cow::Owned),
        other => Some(Cow::Borrowed(other)),
    }
}

/// Walk `path`; return the background of the container holding the last
/// key, and a copy of the array found there.
fn probe(tree: &Value, path: &[&str]) -> Option<(Option<String>, Vec<Value>)> {
    let (last, parents) = path.split_last()?;
    let mut container = Cow::Borrowed(tree);
    for key in parents {
        container = match container {
            Cow::Borrowed(value) => decode_embedded(value.get(*key)?)?,
            Cow::Owned(value) => Cow::Owned(decode_embedded(value.get(*key)?)?.into_owned()),
        };
    }
    let Value::Array(items) = container.get(*last)? else {
        return None;
    };
    let background = container
        .get("background")
        .and_then(Value::as_str)
        .map(str::to_string);
    Some((background, items.clone()))
}

fn canonical_type(raw: &str) -> Option<&'static str> {
    let folded = raw.to_ascii_lowercase();
    let folded = if folded == "itext" { "i-text".to_string() } else { folded };
    ElementKind::TYPE_NAMES
        .iter()
        .copied()
        .find(|name| *name == folded)
}

fn normalize_descriptor(
    descriptor: Value,
    seen: &mut HashSet<ElementId>,
    report: &mut NormalizeReport,
) -> Option<Value> {
    let Value::Object(mut obj) = descriptor else {
        report.skipped.push("<non-object>".to_string());
        return None;
    };

    let raw_type = obj
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let Some(ty) = canonical_type(&raw_type) else {
        report.skipped.push(raw_type);
        return None;
    };
    if ty != raw_type {
        report.types_renamed += 1;
        obj.insert("type".into(), Value::String(ty.to_string()));
    }

    normalize_id(&mut obj, ty, seen, report);

    if obj.get("angle").and_then(Value::as_f64).is_some_and(|a| a != 0.0) {
        report.angles_reset += 1;
        obj.insert("angle".into(), Value::from(0.0));
    }

    if TEXT_TYPES.contains(&ty) {
        normalize_text(&mut obj, report);
    }

    if ty == "group"
        && let Some(Value::Array(children)) = obj.remove("objects")
    {
        let children: Vec<Value> = children
            .into_iter()
            .filter_map(|child| normalize_descriptor(child, seen, report))
            .collect();
        obj.insert("objects".into(), Value::Array(children));
    }

    Some(Value::Object(obj))
}

fn normalize_id(
    obj: &mut Map<String, Value>,
    ty: &str,
    seen: &mut HashSet<ElementId>,
    report: &mut NormalizeReport,
) {
    let existing = obj
        .get("id")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ElementId::intern);
    let id = match existing {
        Some(id) if seen.insert(id) => return,
        _ => ElementId::with_prefix(&ty.replace('-', "")),
    };
    seen.insert(id);
    report.ids_assigned += 1;
    obj.insert("id".into(), Value::String(id.as_str().to_string()));
}

fn normalize_text(obj: &mut Map<String, Value>, report: &mut NormalizeReport) {
    let baseline = obj
        .get("textBaseline")
        .and_then(Value::as_str)
        .map(str::to_string);
    match baseline.as_deref() {
        Some("alphabetical") => {
            report.baselines_rewritten += 1;
            obj.insert("textBaseline".into(), Value::from("alphabetic"));
        }
        Some("alphabetic" | "top" | "hanging" | "middle" | "ideographic" | "bottom") | None => {}
        Some(other) => {
            log::warn!("template: unsupported textBaseline {other:?}, using alphabetic");
            report.baselines_rewritten += 1;
            obj.insert("textBaseline".into(), Value::from("alphabetic"));
        }
    }

    if !matches!(obj.get("styles"), Some(Value::Object(_))) {
        report.styles_added += 1;
        obj.insert("styles".into(), Value::Object(Map::new()));
    }

    let numeric_weight = obj
        .get("fontWeight")
        .filter(|w| w.is_number())
        .map(Value::to_string);
    if let Some(weight) = numeric_weight {
        obj.insert("fontWeight".into(), Value::String(weight));
    }
}
