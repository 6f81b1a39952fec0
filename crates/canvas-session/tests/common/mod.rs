//! Shared setup for session integration tests.

#![allow(dead_code)]

use canvas_core::{Element, Template};
use canvas_engine::SceneEngine;
use canvas_session::{CanvasSession, SessionConfig, SessionNotice};
use std::cell::RefCell;
use std::rc::Rc;

pub fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn starter_tree() -> serde_json::Value {
    serde_json::from_str(include_str!("../fixtures/starter_40.json")).unwrap()
}

pub fn starter_template() -> Template {
    Template::from_tree(&starter_tree()).unwrap()
}

pub fn template_of(elements: Vec<Element>) -> Template {
    Template {
        elements,
        background: None,
        source: "objects".to_string(),
        report: Default::default(),
    }
}

/// A session with an attached engine, still awaiting content.
pub fn awaiting_session(config: SessionConfig) -> CanvasSession<SceneEngine> {
    init_logs();
    let mut session = CanvasSession::new(config);
    session.begin().unwrap();
    session.attach_engine(SceneEngine::default()).unwrap();
    session
}

/// A ready session populated with `template`.
pub fn ready_session_with(config: SessionConfig, template: Template) -> CanvasSession<SceneEngine> {
    let mut session = awaiting_session(config);
    session.populate(template).unwrap();
    session
}

/// A ready session populated with the 40-element starter grid.
pub fn ready_session() -> CanvasSession<SceneEngine> {
    ready_session_with(SessionConfig::default(), starter_template())
}

pub fn engine(session: &mut CanvasSession<SceneEngine>) -> &mut SceneEngine {
    session.engine_mut().unwrap()
}

/// Serialized document currently on the canvas.
pub fn canvas_json(session: &CanvasSession<SceneEngine>) -> String {
    use canvas_core::CanvasEngine;
    let doc = session.engine().unwrap().serialize().unwrap();
    serde_json::to_string(&doc).unwrap()
}

/// Collects every notice the session publishes.
pub fn record_notices(
    session: &CanvasSession<SceneEngine>,
) -> (Rc<RefCell<Vec<SessionNotice>>>, canvas_core::Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&log);
    let sub = session
        .notices()
        .subscribe(move |n: &SessionNotice| sink.borrow_mut().push(n.clone()));
    (log, sub)
}
