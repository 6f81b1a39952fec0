//! Integration tests: legacy template probing and normalization (canvas-core).
//!
//! Loads persisted records in historical shapes and checks that they come
//! out as a clean element list that round-trips through a snapshot.

use canvas_core::{Document, ElementId, ElementKind, Snapshot, Template, TextBaseline};
use pretty_assertions::assert_eq;

fn fixture(name: &str) -> serde_json::Value {
    let text = match name {
        "legacy_builder" => include_str!("fixtures/legacy_builder.json"),
        other => panic!("unknown fixture {other}"),
    };
    serde_json::from_str(text).unwrap()
}

// ─── Probing ────────────────────────────────────────────────────────────

#[test]
fn string_encoded_builder_canvas() {
    let t = Template::from_tree(&fixture("legacy_builder")).unwrap();
    assert_eq!(t.source, "builderData.canvas.objects");
    assert_eq!(t.background.as_deref(), Some("#f4f4f4"));
    assert_eq!(t.elements.len(), 3);
    assert_eq!(t.report.skipped, vec!["sparkle".to_string()]);
}

// ─── Normalization ──────────────────────────────────────────────────────

#[test]
fn legacy_fields_are_repaired() {
    let t = Template::from_tree(&fixture("legacy_builder")).unwrap();

    let headline = &t.elements[0];
    assert!(matches!(headline.kind, ElementKind::IText(_)));
    let text = headline.text().unwrap();
    assert_eq!(text.text_baseline, TextBaseline::Alphabetic);
    assert!(text.styles.is_empty());

    // `Rect` without an id gets a generated one
    assert!(matches!(t.elements[1].kind, ElementKind::Rect { .. }));
    assert!(t.elements[1].id.as_str().starts_with("rect_"));

    let badge = &t.elements[2];
    assert_eq!(badge.id, ElementId::intern("badge"));
    assert_eq!(badge.children().len(), 2);
    assert!(badge.children()[1].id.as_str().starts_with("text_"));

    assert_eq!(t.report.types_renamed, 2);
    assert_eq!(t.report.ids_assigned, 2);
    assert_eq!(t.report.styles_added, 2);
}

#[test]
fn normalized_template_survives_snapshot() {
    let t = Template::from_tree(&fixture("legacy_builder")).unwrap();
    let doc = Document {
        objects: t.elements.clone(),
        background: t.background.clone(),
    };
    let snap = Snapshot::capture(&doc).unwrap();
    assert_eq!(snap.element_count(), 3);
    assert_eq!(snap.document().unwrap(), doc);
}
