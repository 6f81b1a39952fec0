//! Integration tests: end-to-end session flow (canvas-session).
//!
//! Drives a session backed by the reference engine through starter content
//! loading, pointer gestures, undo/redo, and teardown.

mod common;

use canvas_core::{CanvasEngine, Element, ElementId};
use canvas_session::{
    RestoreOutcome, SaveOutcome, SessionConfig, SessionNotice, SessionState, SkipReason,
};
use common::*;
use kurbo::{Point, Vec2};
use pretty_assertions::assert_eq;

const TILE_0: Point = Point::new(50.0, 50.0);
const EMPTY: Point = Point::new(780.0, 590.0);

// ─── Starter content ────────────────────────────────────────────────────

#[test]
fn populate_records_one_snapshot_and_unlocks_history() {
    let mut session = awaiting_session(SessionConfig::default());
    let (notices, _sub) = record_notices(&session);

    let outcome = session.populate(starter_template()).unwrap();
    assert_eq!(outcome, SaveOutcome::Recorded { index: 0 });
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.history().len(), 1);
    assert_eq!(session.history().current().unwrap().element_count(), 40);

    let kinds: Vec<_> = notices.borrow().iter().map(SessionNotice::kind).collect();
    assert_eq!(kinds, vec!["state", "history", "document"]);
}

#[test]
fn populate_normalizes_legacy_content() {
    let session = ready_session();
    let doc = session.engine().unwrap().serialize().unwrap();
    assert_eq!(doc.background.as_deref(), Some("#ffffff"));
    let rotated = doc.find(ElementId::intern("tile-5")).unwrap();
    assert_eq!(rotated.geometry.angle, 0.0);
    let caption = doc.find(ElementId::intern("caption-0")).unwrap();
    assert_eq!(caption.text().unwrap().font_weight, "600");
}

#[test]
fn empty_template_is_ready_with_empty_log() {
    let mut session = awaiting_session(SessionConfig::default());
    let outcome = session.populate(template_of(vec![])).unwrap();
    assert_eq!(outcome, SaveOutcome::Skipped(SkipReason::Empty));
    assert_eq!(session.state(), SessionState::Ready);
    assert!(session.history().is_empty());

    // the first real addition becomes the first entry
    engine(&mut session)
        .add_element(Element::rect("late", 0.0, 0.0, 10.0, 10.0))
        .unwrap();
    session.pump();
    assert_eq!(session.history().len(), 1);
}

#[test]
fn populate_twice_is_rejected() {
    let mut session = ready_session();
    assert!(session.populate(starter_template()).is_err());
    assert_eq!(session.history().len(), 1);
}

// ─── Gestures ───────────────────────────────────────────────────────────

#[test]
fn drag_undo_redo_over_forty_elements() {
    let mut session = ready_session();
    assert_eq!(session.history().cursor(), Some(0));
    let original = canvas_json(&session);

    engine(&mut session).drag(TILE_0, Vec2::new(100.0, 30.0));
    session.pump();
    assert_eq!(session.history().len(), 2);
    assert_eq!(session.history().cursor(), Some(1));
    let moved = canvas_json(&session);
    assert_ne!(moved, original);

    assert_eq!(session.undo(), RestoreOutcome::Started { index: 0 });
    assert!(!session.history().is_restoring());
    assert_eq!(session.history().cursor(), Some(0));
    assert_eq!(canvas_json(&session), original);

    assert_eq!(session.redo(), RestoreOutcome::Started { index: 1 });
    assert_eq!(session.history().cursor(), Some(1));
    assert_eq!(canvas_json(&session), moved);
    assert_eq!(session.history().len(), 2);
}

#[test]
fn click_without_drag_then_empty_click_records_nothing() {
    let mut session = ready_session();
    engine(&mut session).click(TILE_0);
    session.pump();
    assert_eq!(session.selection().ids(), &[ElementId::intern("tile-0")]);

    engine(&mut session).click(EMPTY);
    session.pump();
    assert!(session.selection().is_empty());
    assert_eq!(session.history().len(), 1);
}

#[test]
fn scale_gesture_is_recorded() {
    let mut session = ready_session();
    engine(&mut session).click(TILE_0);
    session.pump();
    engine(&mut session).scale_selection(1.5, 1.5);
    session.pump();
    assert_eq!(session.history().len(), 2);
}

#[test]
fn locked_rotation_records_nothing() {
    let mut session = ready_session();
    engine(&mut session).click(TILE_0);
    session.pump();
    engine(&mut session).rotate_selection(30.0);
    session.pump();
    assert_eq!(session.history().len(), 1);
}

#[test]
fn hover_never_reaches_the_session() {
    let mut session = ready_session();
    engine(&mut session).pointer_over(TILE_0);
    assert_eq!(session.pending_events(), 0);
}

#[test]
fn toolbar_follows_selection() {
    let mut session = ready_session();
    let (notices, _sub) = record_notices(&session);

    engine(&mut session).click(Point::new(50.0, 400.0));
    session.pump();
    let toolbar = session.toolbar();
    assert!(toolbar.visible);
    // tile-24 spans (20, 350)..(90, 410); the toolbar sits above it
    assert_eq!(toolbar.anchor, Point::new(102.0, 294.0));

    engine(&mut session).click(EMPTY);
    session.pump();
    assert!(!session.toolbar().visible);
    assert!(
        notices
            .borrow()
            .iter()
            .any(|n| matches!(n, SessionNotice::Toolbar(p) if !p.visible))
    );
}

// ─── History edge cases ─────────────────────────────────────────────────

#[test]
fn restore_requests_while_loading_are_dropped() {
    let mut session = ready_session();
    let original = canvas_json(&session);
    engine(&mut session).drag(TILE_0, Vec2::new(40.0, 0.0));
    session.pump();
    engine(&mut session).set_deferred_loads(true);

    assert!(session.undo().is_started());
    assert!(session.history().is_restoring());
    assert_eq!(session.undo(), RestoreOutcome::Skipped(SkipReason::Restoring));
    assert_eq!(session.redo(), RestoreOutcome::Skipped(SkipReason::Restoring));

    assert!(engine(&mut session).complete_load());
    session.pump();
    assert!(!session.history().is_restoring());
    assert_eq!(canvas_json(&session), original);
    assert_eq!(session.history().len(), 2);
}

#[test]
fn explicit_user_command_is_recorded() {
    let mut session = ready_session();
    engine(&mut session).set_background(Some("#000000".into()));
    assert!(session.commit_user_change().is_recorded());
    assert_eq!(session.history().len(), 2);
    // nothing changed since
    assert_eq!(
        session.commit_user_change(),
        SaveOutcome::Skipped(SkipReason::Duplicate)
    );
}

#[test]
fn new_edit_after_undo_drops_redo_tail() {
    let mut session = ready_session();
    engine(&mut session).drag(TILE_0, Vec2::new(10.0, 0.0));
    session.pump();
    engine(&mut session).drag(Point::new(60.0, 50.0), Vec2::new(10.0, 0.0));
    session.pump();
    assert_eq!(session.history().len(), 3);

    session.undo();
    assert!(session.history_status().can_redo);
    engine(&mut session).drag(TILE_0, Vec2::new(0.0, 15.0));
    session.pump();
    assert_eq!(session.history().len(), 3);
    assert!(!session.history_status().can_redo);
}

// ─── Teardown ───────────────────────────────────────────────────────────

#[test]
fn dispose_detaches_and_clears() {
    let mut session = ready_session();
    let (notices, _sub) = record_notices(&session);
    session.dispose();
    session.dispose();

    assert_eq!(session.state(), SessionState::Disposed);
    assert!(session.engine().is_none());
    assert!(session.history().is_empty());
    assert_eq!(
        session.save(canvas_session::SaveCause::UserCommand),
        SaveOutcome::Skipped(SkipReason::Disposed)
    );
    assert_eq!(session.undo(), RestoreOutcome::Skipped(SkipReason::Disposed));

    let transitions = notices
        .borrow()
        .iter()
        .filter(|n| matches!(n, SessionNotice::StateChanged { .. }))
        .count();
    assert_eq!(transitions, 1);
}

#[test]
fn unusable_engine_keeps_session_initializing() {
    init_logs();
    let mut session = canvas_session::CanvasSession::new(SessionConfig::default());
    session.begin().unwrap();
    let mut dead = canvas_engine::SceneEngine::default();
    dead.dispose();
    assert!(session.attach_engine(dead).is_err());
    assert_eq!(session.state(), SessionState::Initializing);
    assert!(session.lifecycle().last_error().is_some());
}
