//! One-shot starter content loading.
//!
//! A [`ContentLoader`] belongs to one session. It fetches a persisted
//! document tree through a [`DocumentFetcher`], normalizes it into a
//! [`Template`], and hands it to [`CanvasSession::populate`], which puts it
//! on the canvas, records the first snapshot and unlocks history.
//!
//! The session is borrowed only before and after the fetch, never across
//! the await, so engine events and user input keep flowing while the
//! request is in flight.

use crate::history::SaveOutcome;
use crate::lifecycle::{LifecycleError, SessionState};
use crate::session::CanvasSession;
use canvas_core::{CanvasEngine, EngineError, NormalizeReport, Template, TemplateError};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use thiserror::Error;

/// Identifier of a persisted template record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TemplateId(String);

impl TemplateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TemplateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TemplateId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("template {0} not found")]
    NotFound(TemplateId),
    #[error("fetch failed: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("starter content was already loaded")]
    AlreadyLoaded,
    #[error("template {0} is already being loaded")]
    InFlight(TemplateId),
    #[error("session is {0}, not awaiting content")]
    NotAwaitingContent(SessionState),
    #[error("engine is not available")]
    EngineUnavailable,
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

/// Source of persisted document trees.
pub trait DocumentFetcher {
    fn fetch_document(&self, id: &TemplateId) -> impl Future<Output = Result<Value, FetchError>>;
}

/// What a successful load did.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadReport {
    pub template: TemplateId,
    /// Dotted path the elements were found at.
    pub source: String,
    pub elements: usize,
    pub normalized: NormalizeReport,
    pub snapshot: SaveOutcome,
}

pub struct ContentLoader<F> {
    fetcher: F,
    in_flight: RefCell<HashSet<TemplateId>>,
    loaded: Cell<bool>,
}

/// Releases an in-flight marker however the load ends.
struct InFlightGuard<'a> {
    set: &'a RefCell<HashSet<TemplateId>>,
    id: TemplateId,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.borrow_mut().remove(&self.id);
    }
}

impl<F: DocumentFetcher> ContentLoader<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            in_flight: RefCell::new(HashSet::new()),
            loaded: Cell::new(false),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.get()
    }

    pub fn is_in_flight(&self, id: &TemplateId) -> bool {
        self.in_flight.borrow().contains(id)
    }

    /// Fetch `id` and populate the session with it.
    pub async fn load<E: CanvasEngine>(
        &self,
        session: &RefCell<CanvasSession<E>>,
        id: TemplateId,
    ) -> Result<LoadReport, LoadError> {
        if self.loaded.get() {
            return Err(LoadError::AlreadyLoaded);
        }
        {
            let session = session.borrow();
            let state = session.state();
            if state != SessionState::AwaitingContent {
                return Err(LoadError::NotAwaitingContent(state));
            }
            if !session.engine_live() {
                return Err(LoadError::EngineUnavailable);
            }
        }
        if !self.in_flight.borrow_mut().insert(id.clone()) {
            log::debug!("loader: {id} already in flight");
            return Err(LoadError::InFlight(id));
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            id: id.clone(),
        };

        log::info!("loader: fetching template {id}");
        let tree = match self.fetcher.fetch_document(&id).await {
            Ok(tree) => tree,
            Err(err) => {
                session.borrow_mut().content_failed(err.to_string());
                return Err(err.into());
            }
        };

        let template = match Template::from_tree(&tree) {
            Ok(template) => template,
            Err(err) => {
                session.borrow_mut().content_failed(err.to_string());
                return Err(err.into());
            }
        };

        let source = template.source.clone();
        let elements = template.elements.len();
        let normalized = template.report.clone();
        let snapshot = session.borrow_mut().populate(template)?;
        self.loaded.set(true);

        Ok(LoadReport {
            template: id,
            source,
            elements,
            normalized,
            snapshot,
        })
    }
}
