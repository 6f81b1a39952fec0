//! Integration tests: history guards and bounds (canvas-session).
//!
//! Checks the log's standing rules against a live engine: it never goes
//! empty once ready, ignores everything before content is loaded, stays
//! within capacity, and restores byte-identical documents.

mod common;

use canvas_core::{CanvasEngine, Element, ElementId};
use canvas_session::{
    RestoreOutcome, SaveCause, SaveOutcome, SessionConfig, SessionState, ShortcutAction,
    SkipReason,
};
use common::*;
use kurbo::{Point, Vec2};
use pretty_assertions::assert_eq;

const TILE_0: Point = Point::new(50.0, 50.0);

// ─── Non-empty log ──────────────────────────────────────────────────────

#[test]
fn log_stays_non_empty_after_deleting_everything() {
    let mut session = ready_session();
    assert!(session.perform(ShortcutAction::SelectAll));
    assert!(session.perform(ShortcutAction::Delete));

    let doc = session.engine().unwrap().serialize().unwrap();
    assert_eq!(doc.element_count(), 0);
    // the empty canvas is not a revision
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().current().unwrap().element_count(), 40);
    assert!(session.history().entries().all(|s| !s.is_empty()));
}

// ─── Before ready ───────────────────────────────────────────────────────

#[test]
fn nothing_is_recorded_before_content_loads() {
    let mut session = awaiting_session(SessionConfig::default());

    engine(&mut session)
        .add_element(Element::rect("early", 0.0, 0.0, 10.0, 10.0))
        .unwrap();
    session.pump();
    assert!(session.history().is_empty());

    assert_eq!(
        session.save(SaveCause::UserCommand),
        SaveOutcome::Skipped(SkipReason::NotReady(SessionState::AwaitingContent))
    );
    assert_eq!(
        session.undo(),
        RestoreOutcome::Skipped(SkipReason::NotReady(SessionState::AwaitingContent))
    );
    assert_eq!(
        session.redo(),
        RestoreOutcome::Skipped(SkipReason::NotReady(SessionState::AwaitingContent))
    );
    assert!(!session.perform(ShortcutAction::SelectAll));

    // populate replaces whatever was placed early
    session.populate(starter_template()).unwrap();
    let doc = session.engine().unwrap().serialize().unwrap();
    assert_eq!(doc.element_count(), 40);
    assert!(doc.find(ElementId::intern("early")).is_none());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn programmatic_saves_are_never_recorded() {
    let mut session = ready_session();
    engine(&mut session).set_background(Some("#123456".into()));
    assert_eq!(
        session.save(SaveCause::Programmatic),
        SaveOutcome::Skipped(SkipReason::Programmatic)
    );
    assert_eq!(session.history().len(), 1);
}

// ─── Capacity ───────────────────────────────────────────────────────────

#[test]
fn oldest_entries_are_evicted_at_capacity() {
    let config = SessionConfig {
        history_capacity: 3,
        ..SessionConfig::default()
    };
    let mut session = ready_session_with(config, starter_template());
    engine(&mut session).click(TILE_0);
    session.pump();

    for _ in 0..4 {
        session.handle_key("ArrowRight", false, false, false, false);
    }
    let status = session.history_status();
    assert_eq!(status.len, 3);
    assert_eq!(status.cursor, Some(2));

    // the oldest surviving entry is the second nudge
    let oldest = session.history().entries().next().unwrap().document().unwrap();
    let tile = oldest.find(ElementId::intern("tile-0")).unwrap();
    assert_eq!(tile.geometry.left, 22.0);

    assert!(session.undo().is_started());
    assert!(session.undo().is_started());
    assert_eq!(
        session.undo(),
        RestoreOutcome::Skipped(SkipReason::NothingToUndo)
    );
}

// ─── Failed restores ───────────────────────────────────────────────────

#[test]
fn failed_undo_leaves_history_where_it_was() {
    let mut session = ready_session();
    engine(&mut session).drag(TILE_0, Vec2::new(25.0, 5.0));
    session.pump();
    let before = session.history_status();
    assert_eq!(before.cursor, Some(1));

    session.engine_mut().unwrap().dispose();
    assert!(matches!(session.undo(), RestoreOutcome::Failed(_)));

    assert_eq!(session.history_status(), before);
    assert!(session.history_status().can_undo);
    assert!(!session.history().is_restoring());
}

// ─── Fidelity ───────────────────────────────────────────────────────────

#[test]
fn restores_are_byte_identical_to_recorded_entries() {
    let mut session = ready_session();
    engine(&mut session).drag(TILE_0, Vec2::new(25.0, 5.0));
    session.pump();
    engine(&mut session).click(Point::new(150.0, 50.0));
    session.pump();
    engine(&mut session).scale_selection(2.0, 1.0);
    session.pump();
    assert_eq!(session.history().len(), 3);

    let recorded: Vec<String> = session
        .history()
        .entries()
        .map(|s| s.json().to_string())
        .collect();

    session.undo();
    assert_eq!(canvas_json(&session), recorded[1]);
    session.undo();
    assert_eq!(canvas_json(&session), recorded[0]);
    session.redo();
    session.redo();
    assert_eq!(canvas_json(&session), recorded[2]);

    // restores never add entries
    assert_eq!(session.history().len(), 3);
}
