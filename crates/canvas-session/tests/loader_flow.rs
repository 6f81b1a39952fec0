//! Integration tests: starter content loading (canvas-session).
//!
//! Runs the loader against scripted fetchers on a single-threaded runtime,
//! the way the browser bridge drives it.

mod common;

use canvas_session::{
    CanvasSession, ContentLoader, DocumentFetcher, FetchError, LoadError, SessionConfig,
    SessionNotice, SessionState, TemplateId,
};
use common::*;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::cell::{Cell, RefCell};

/// Returns the starter grid after yielding once, so a second request can
/// arrive while the first is in flight.
struct SlowFetcher;

impl DocumentFetcher for SlowFetcher {
    async fn fetch_document(&self, _id: &TemplateId) -> Result<Value, FetchError> {
        tokio::task::yield_now().await;
        Ok(starter_tree())
    }
}

/// Fails the first request, then serves the starter grid.
struct FlakyFetcher {
    attempts: Cell<u32>,
}

impl DocumentFetcher for FlakyFetcher {
    async fn fetch_document(&self, _id: &TemplateId) -> Result<Value, FetchError> {
        let attempt = self.attempts.get() + 1;
        self.attempts.set(attempt);
        if attempt == 1 {
            Err(FetchError::Transport("connection reset".into()))
        } else {
            Ok(starter_tree())
        }
    }
}

struct Fixed(Value);

impl DocumentFetcher for Fixed {
    async fn fetch_document(&self, _id: &TemplateId) -> Result<Value, FetchError> {
        Ok(self.0.clone())
    }
}

// ─── Success ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "current_thread")]
async fn load_populates_and_reports() {
    let session = RefCell::new(awaiting_session(SessionConfig::default()));
    let loader = ContentLoader::new(SlowFetcher);

    let report = loader
        .load(&session, TemplateId::from("tpl-starter"))
        .await
        .unwrap();
    assert_eq!(report.source, "canvasData.objects");
    assert_eq!(report.elements, 40);
    assert!(report.snapshot.is_recorded());
    assert!(loader.is_loaded());

    let session = session.borrow();
    assert_eq!(session.state(), SessionState::Ready);
    assert_eq!(session.history().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn concurrent_request_for_same_template_is_rejected() {
    let session = RefCell::new(awaiting_session(SessionConfig::default()));
    let loader = ContentLoader::new(SlowFetcher);
    let id = TemplateId::from("tpl-starter");

    let (first, second) = tokio::join!(
        loader.load(&session, id.clone()),
        loader.load(&session, id.clone()),
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(LoadError::InFlight(ref rejected)) if *rejected == id));
    assert!(!loader.is_in_flight(&id));
    assert_eq!(session.borrow().history().len(), 1);

    let again = loader.load(&session, id).await;
    assert!(matches!(again, Err(LoadError::AlreadyLoaded)));
}

// ─── Failure ────────────────────────────────────────────────────────────

#[tokio::test(flavor = "current_thread")]
async fn failed_fetch_keeps_awaiting_content_and_allows_retry() {
    let session = RefCell::new(awaiting_session(SessionConfig::default()));
    let (notices, _sub) = record_notices(&session.borrow());
    let loader = ContentLoader::new(FlakyFetcher {
        attempts: Cell::new(0),
    });
    let id = TemplateId::from("tpl-starter");

    let failed = loader.load(&session, id.clone()).await;
    assert!(matches!(failed, Err(LoadError::Fetch(FetchError::Transport(_)))));
    assert_eq!(session.borrow().state(), SessionState::AwaitingContent);
    assert!(session.borrow().history().is_empty());
    assert!(!loader.is_in_flight(&id));
    assert!(!loader.is_loaded());
    assert!(
        notices
            .borrow()
            .iter()
            .any(|n| matches!(n, SessionNotice::LoadFailed { .. }))
    );

    loader.load(&session, id).await.unwrap();
    assert_eq!(session.borrow().state(), SessionState::Ready);
}

#[tokio::test(flavor = "current_thread")]
async fn unrecognized_tree_is_a_load_failure() {
    let session = RefCell::new(awaiting_session(SessionConfig::default()));
    let loader = ContentLoader::new(Fixed(json!({"title": "blank"})));

    let result = loader.load(&session, TemplateId::from("tpl-blank")).await;
    assert!(matches!(result, Err(LoadError::Template(_))));
    assert_eq!(session.borrow().state(), SessionState::AwaitingContent);
    assert!(session.borrow().lifecycle().last_error().is_some());
}

#[tokio::test(flavor = "current_thread")]
async fn load_before_engine_is_rejected() {
    init_logs();
    let mut session = CanvasSession::<canvas_engine::SceneEngine>::new(SessionConfig::default());
    session.begin().unwrap();
    let session = RefCell::new(session);
    let loader = ContentLoader::new(SlowFetcher);

    let result = loader.load(&session, TemplateId::from("tpl-starter")).await;
    assert!(matches!(
        result,
        Err(LoadError::NotAwaitingContent(SessionState::Initializing))
    ));
    assert!(!loader.is_loaded());
}
