//! The editing session: wires an engine to history, classification,
//! selection tracking and input handling.
//!
//! The engine's bus handler only enqueues events; [`CanvasSession::pump`]
//! drains the queue and does the work. Engine calls made while handling
//! an event (entering text editing, restoring a snapshot) therefore never
//! re-enter the session, they just add to the queue.

use crate::classifier::{MutationClassifier, MutationKind};
use crate::config::SessionConfig;
use crate::history::{History, HistoryStatus, RestoreOutcome, SaveCause, SaveOutcome, SkipReason};
use crate::interaction::{Interaction, duplicate, nudge_delta};
use crate::lifecycle::{Lifecycle, LifecycleError, SessionState, Transition};
use crate::loader::LoadError;
use crate::selection::Selection;
use crate::shortcuts::ShortcutAction;
use crate::toolbar::{ToolbarCoordinator, ToolbarPlacement};
use canvas_core::{
    CanvasEngine, Disposer, ElementId, EngineEvent, EngineEventKind, EventBus, Template, ZOrder,
};
use serde_json::{Value, json};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use thiserror::Error;

// ─── Notices ─────────────────────────────────────────────────────────────

/// What the session tells UI consumers.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    HistoryChanged(HistoryStatus),
    /// The document at the history cursor changed (new save or restore).
    DocumentChanged {
        json: Rc<str>,
    },
    Toolbar(ToolbarPlacement),
    TextEditing {
        id: Option<ElementId>,
    },
    LoadFailed {
        message: String,
    },
    EngineUnavailable {
        message: String,
    },
}

impl SessionNotice {
    pub fn kind(&self) -> &'static str {
        match self {
            SessionNotice::StateChanged { .. } => "state",
            SessionNotice::HistoryChanged(_) => "history",
            SessionNotice::DocumentChanged { .. } => "document",
            SessionNotice::Toolbar(_) => "toolbar",
            SessionNotice::TextEditing { .. } => "text-editing",
            SessionNotice::LoadFailed { .. } => "load-failed",
            SessionNotice::EngineUnavailable { .. } => "engine-unavailable",
        }
    }

    /// JSON form for hosts that cannot receive Rust values.
    pub fn to_json(&self) -> Value {
        let payload = match self {
            SessionNotice::StateChanged { from, to } => json!({"from": from, "to": to}),
            SessionNotice::HistoryChanged(status) => json!(status),
            SessionNotice::DocumentChanged { json } => {
                serde_json::from_str(json).unwrap_or(Value::Null)
            }
            SessionNotice::Toolbar(p) => json!({
                "x": p.anchor.x,
                "y": p.anchor.y,
                "side": p.side.as_str(),
                "visible": p.visible,
            }),
            SessionNotice::TextEditing { id } => json!({"id": id}),
            SessionNotice::LoadFailed { message } | SessionNotice::EngineUnavailable { message } => {
                json!({"message": message})
            }
        };
        json!({"kind": self.kind(), "payload": payload})
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("engine unavailable: {0}")]
    EngineUnavailable(String),
}

type Inbox = Rc<RefCell<VecDeque<EngineEvent>>>;

// ─── Session ─────────────────────────────────────────────────────────────

pub struct CanvasSession<E: CanvasEngine> {
    config: SessionConfig,
    lifecycle: Lifecycle,
    history: History,
    classifier: MutationClassifier,
    selection: Selection,
    toolbar: ToolbarCoordinator,
    interaction: Interaction,
    engine: Option<E>,
    inbox: Inbox,
    disposer: Disposer,
    notices: EventBus<SessionNotice>,
}

impl<E: CanvasEngine> CanvasSession<E> {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            history: History::new(config.history_capacity),
            classifier: MutationClassifier::new(config.transform_settle_ms),
            toolbar: ToolbarCoordinator::new(config.toolbar.clone()),
            config,
            lifecycle: Lifecycle::new(),
            selection: Selection::default(),
            interaction: Interaction::new(),
            engine: None,
            inbox: Rc::new(RefCell::new(VecDeque::new())),
            disposer: Disposer::new(),
            notices: EventBus::new(),
        }
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.lifecycle.state()
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_status(&self) -> HistoryStatus {
        self.history.status()
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toolbar(&self) -> ToolbarPlacement {
        self.toolbar.current()
    }

    pub fn editing(&self) -> Option<ElementId> {
        self.interaction.editing()
    }

    pub fn engine(&self) -> Option<&E> {
        self.engine.as_ref()
    }

    /// Direct engine access for input the engine handles itself (pointer
    /// gestures). Call [`CanvasSession::pump`] afterwards.
    pub fn engine_mut(&mut self) -> Option<&mut E> {
        self.engine.as_mut()
    }

    pub fn engine_live(&self) -> bool {
        self.engine.as_ref().is_some_and(|e| e.is_live())
    }

    pub fn notices(&self) -> &EventBus<SessionNotice> {
        &self.notices
    }

    /// Events waiting for [`CanvasSession::pump`].
    pub fn pending_events(&self) -> usize {
        self.inbox.borrow().len()
    }

    fn publish(&self, notice: SessionNotice) {
        self.notices.emit(&notice);
    }

    fn publish_transition(&self, transition: Transition) {
        self.publish(SessionNotice::StateChanged {
            from: transition.from,
            to: transition.to,
        });
    }

    fn publish_history(&self) {
        self.publish(SessionNotice::HistoryChanged(self.history.status()));
        if let Some(current) = self.history.current() {
            self.publish(SessionNotice::DocumentChanged {
                json: current.shared_json(),
            });
        }
    }

    // ─── Lifecycle ───────────────────────────────────────────────────────

    /// Start acquiring an engine.
    pub fn begin(&mut self) -> Result<(), SessionError> {
        let transition = self.lifecycle.begin_initializing()?;
        self.publish_transition(transition);
        Ok(())
    }

    /// Hand over a ready engine. Subscribes to its events and moves the
    /// session to `AwaitingContent`.
    pub fn attach_engine(&mut self, engine: E) -> Result<(), SessionError> {
        if self.lifecycle.state() != SessionState::Initializing {
            return Err(LifecycleError::InvalidTransition {
                from: self.lifecycle.state(),
                to: SessionState::AwaitingContent,
            }
            .into());
        }
        if !engine.is_live() {
            let message = "engine handle is not live".to_string();
            self.engine_failed(message.clone());
            return Err(SessionError::EngineUnavailable(message));
        }

        let inbox = Rc::clone(&self.inbox);
        let subscription = engine.events().subscribe(move |event: &EngineEvent| {
            if event.kind.is_hover() {
                return;
            }
            inbox.borrow_mut().push_back(event.clone());
        });
        self.disposer.add(subscription);
        self.engine = Some(engine);

        let transition = self.lifecycle.engine_ready()?;
        log::info!("session: engine attached");
        self.publish_transition(transition);
        Ok(())
    }

    /// Engine acquisition failed; the session stays in `Initializing`.
    pub fn engine_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.lifecycle.engine_failed(message.clone());
        self.publish(SessionNotice::EngineUnavailable { message });
    }

    /// Content fetch failed; the session stays in `AwaitingContent`.
    pub fn content_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.lifecycle.content_failed(message.clone());
        self.publish(SessionNotice::LoadFailed { message });
    }

    /// Put the starter content on the canvas, record it as the first
    /// history entry and move to `Ready`.
    ///
    /// A template without elements still makes the session ready, with an
    /// empty log.
    pub fn populate(&mut self, template: Template) -> Result<SaveOutcome, LoadError> {
        let state = self.lifecycle.state();
        if state != SessionState::AwaitingContent {
            return Err(LoadError::NotAwaitingContent(state));
        }
        let Some(engine) = self.engine.as_mut().filter(|e| e.is_live()) else {
            return Err(LoadError::EngineUnavailable);
        };

        let count = template.elements.len();
        self.history.begin_guard();
        engine.clear();
        let inserted = engine.add_elements(template.elements);
        engine.set_background(template.background);
        self.pump();
        self.history.finish_restore();

        if let Err(err) = inserted {
            self.content_failed(err.to_string());
            return Err(err.into());
        }

        let Some(engine) = self.engine.as_ref() else {
            return Err(LoadError::EngineUnavailable);
        };
        let outcome = self
            .history
            .save_state(engine, &self.lifecycle, SaveCause::Forced);
        let transition = self.lifecycle.content_loaded()?;
        log::info!(
            "session: starter content loaded from {} ({count} elements)",
            template.source
        );
        self.publish_transition(transition);
        self.publish_history();
        Ok(outcome)
    }

    /// Tear everything down. Idempotent.
    pub fn dispose(&mut self) {
        let Some(transition) = self.lifecycle.dispose() else {
            return;
        };
        let detached = self.disposer.unsubscribe_all();
        self.inbox.borrow_mut().clear();
        self.history.clear();
        self.selection.clear();
        self.classifier.reset();
        self.interaction.set_editing(None);
        self.toolbar.hide();
        if let Some(mut engine) = self.engine.take() {
            engine.dispose();
        }
        log::info!("session: disposed ({detached} listeners detached)");
        self.publish_transition(transition);
    }

    // ─── Event processing ────────────────────────────────────────────────

    /// Process every queued engine event. Returns how many were handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        loop {
            let next = self.inbox.borrow_mut().pop_front();
            let Some(event) = next else {
                break;
            };
            self.handle_event(&event);
            handled += 1;
        }
        handled
    }

    fn handle_event(&mut self, event: &EngineEvent) {
        log::trace!("session: {} at {}ms", event.wire_name(), event.time_ms);
        self.observe(event);

        let kind = self
            .classifier
            .classify(event, &self.selection, self.history.is_restoring());

        if let EngineEventKind::ElementModified { id, geometry } = &event.kind
            && self.selection.contains(*id)
        {
            self.selection.refresh(*id, geometry.clone());
            if kind == MutationKind::Transform {
                self.refresh_toolbar();
            }
        }

        if let Some(cause) = kind.save_cause() {
            self.save(cause);
        }
    }

    /// Side effects that run for every event, recorded or not.
    fn observe(&mut self, event: &EngineEvent) {
        match &event.kind {
            EngineEventKind::SelectionCreated { ids } | EngineEventKind::SelectionUpdated { ids } => {
                if let Some(engine) = self.engine.as_ref() {
                    self.selection = Selection::capture(engine, ids);
                }
                self.refresh_toolbar();
            }
            EngineEventKind::SelectionCleared => {
                self.selection.clear();
                let placement = self.toolbar.hide();
                self.publish(SessionNotice::Toolbar(placement));
            }
            EngineEventKind::ElementRemoved { id } => self.selection.forget(*id),
            EngineEventKind::TextEditingEntered { id } => {
                self.interaction.set_editing(Some(*id));
                self.publish(SessionNotice::TextEditing { id: Some(*id) });
            }
            EngineEventKind::TextEditingExited { .. } => {
                self.interaction.set_editing(None);
                self.publish(SessionNotice::TextEditing { id: None });
            }
            EngineEventKind::DoubleClick { target, .. } => {
                let Some(engine) = self.engine.as_mut() else {
                    return;
                };
                if let Some(id) = self.interaction.double_click_target(&*engine, *target)
                    && let Err(err) = engine.enter_text_editing(id)
                {
                    log::warn!("session: cannot edit {id}: {err}");
                }
            }
            EngineEventKind::DocumentLoaded => {
                if self.history.finish_restore() {
                    log::debug!("session: restore complete");
                    self.publish_history();
                }
            }
            _ => {}
        }
    }

    fn refresh_toolbar(&mut self) {
        let Some(engine) = self.engine.as_ref() else {
            return;
        };
        let placement = self.toolbar.on_selection(engine, self.selection.ids());
        self.publish(SessionNotice::Toolbar(placement));
    }

    // ─── History ─────────────────────────────────────────────────────────

    /// Record the engine's current document.
    pub fn save(&mut self, cause: SaveCause) -> SaveOutcome {
        if self.lifecycle.is_disposed() {
            return SaveOutcome::Skipped(SkipReason::Disposed);
        }
        let Some(engine) = self.engine.as_ref() else {
            log::debug!("session: save ({cause:?}) without an engine");
            return SaveOutcome::Skipped(SkipReason::EngineUnavailable);
        };
        let outcome = self.history.save_state(engine, &self.lifecycle, cause);
        if outcome.is_recorded() {
            self.publish_history();
        }
        outcome
    }

    /// Record a change made by an explicit host action (property panel,
    /// toolbar button) that the engine does not report as a gesture.
    pub fn commit_user_change(&mut self) -> SaveOutcome {
        self.save(SaveCause::UserCommand)
    }

    pub fn undo(&mut self) -> RestoreOutcome {
        if self.lifecycle.is_disposed() {
            return RestoreOutcome::Skipped(SkipReason::Disposed);
        }
        let Some(engine) = self.engine.as_mut() else {
            return RestoreOutcome::Skipped(SkipReason::EngineUnavailable);
        };
        let outcome = self.history.undo(engine, &self.lifecycle);
        self.after_restore(&outcome);
        outcome
    }

    pub fn redo(&mut self) -> RestoreOutcome {
        if self.lifecycle.is_disposed() {
            return RestoreOutcome::Skipped(SkipReason::Disposed);
        }
        let Some(engine) = self.engine.as_mut() else {
            return RestoreOutcome::Skipped(SkipReason::EngineUnavailable);
        };
        let outcome = self.history.redo(engine, &self.lifecycle);
        self.after_restore(&outcome);
        outcome
    }

    fn after_restore(&mut self, outcome: &RestoreOutcome) {
        match outcome {
            RestoreOutcome::Started { .. } => {
                // synchronous engines have already queued `document:loaded`
                self.pump();
            }
            RestoreOutcome::Failed(_) | RestoreOutcome::Unrecoverable => {
                self.publish(SessionNotice::HistoryChanged(self.history.status()));
            }
            RestoreOutcome::Skipped(_) => {}
        }
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Route a key press. Returns the action taken, if the key was bound.
    pub fn handle_key(
        &mut self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Option<ShortcutAction> {
        let action = self.interaction.route_key(key, ctrl, shift, alt, meta)?;
        self.perform(action).then_some(action)
    }

    /// Run a shortcut action. Returns `false` when it was ignored.
    pub fn perform(&mut self, action: ShortcutAction) -> bool {
        match action {
            ShortcutAction::Undo => return self.undo().is_started(),
            ShortcutAction::Redo => return self.redo().is_started(),
            _ => {}
        }
        if !self.lifecycle.is_ready() || self.history.is_restoring() {
            log::debug!("session: {action:?} ignored while {}", self.lifecycle.state());
            return false;
        }
        let selected: Vec<ElementId> = self.selection.ids().to_vec();
        let offset = self.config.duplicate_offset;
        let Some(engine) = self.engine.as_mut() else {
            return false;
        };

        let done = match action {
            ShortcutAction::Undo | ShortcutAction::Redo => false,
            ShortcutAction::Delete => {
                if selected.is_empty() {
                    false
                } else {
                    self.history.begin_guard();
                    for &id in &selected {
                        if let Err(err) = engine.remove_element(id) {
                            log::warn!("session: delete {id}: {err}");
                        }
                    }
                    self.finish_batch(SaveCause::Structural);
                    true
                }
            }
            ShortcutAction::SelectAll => match engine.serialize() {
                Ok(document) => {
                    let ids: Vec<ElementId> = document.objects.iter().map(|el| el.id).collect();
                    engine.select(&ids);
                    true
                }
                Err(err) => {
                    log::warn!("session: select all: {err}");
                    false
                }
            },
            ShortcutAction::Duplicate => {
                let copies: Vec<_> = selected
                    .iter()
                    .filter_map(|&id| engine.element(id))
                    .map(|el| duplicate(&el, offset))
                    .collect();
                if copies.is_empty() {
                    false
                } else {
                    let ids: Vec<ElementId> = copies.iter().map(|el| el.id).collect();
                    self.history.begin_guard();
                    let added = engine.add_elements(copies);
                    if let Err(err) = &added {
                        log::warn!("session: duplicate: {err}");
                    } else {
                        engine.select(&ids);
                    }
                    self.finish_batch(SaveCause::Structural);
                    added.is_ok()
                }
            }
            ShortcutAction::Nudge { dx, dy, large } => {
                if selected.is_empty() {
                    false
                } else {
                    engine.translate_elements(&selected, nudge_delta(dx, dy, large, &self.config));
                    true
                }
            }
            ShortcutAction::SendBackward => reorder_all(engine, &selected, ZOrder::Backward),
            ShortcutAction::BringForward => reorder_all(engine, &selected, ZOrder::Forward),
            ShortcutAction::SendToBack => reorder_all(engine, &selected, ZOrder::ToBack),
            ShortcutAction::BringToFront => reorder_all(engine, &selected, ZOrder::ToFront),
            ShortcutAction::Deselect => {
                engine.clear_selection();
                true
            }
            ShortcutAction::ExitTextEditing => {
                engine.exit_text_editing();
                true
            }
        };
        self.pump();
        done
    }

    /// Close a guarded multi-element change: drain its events unrecorded,
    /// then record the result once.
    fn finish_batch(&mut self, cause: SaveCause) {
        self.pump();
        self.history.finish_restore();
        self.save(cause);
    }
}

fn reorder_all<E: CanvasEngine>(engine: &mut E, ids: &[ElementId], order: ZOrder) -> bool {
    ids.iter()
        .fold(false, |changed, &id| engine.reorder(id, order) || changed)
}

impl<E: CanvasEngine> Drop for CanvasSession<E> {
    fn drop(&mut self) {
        self.dispose();
    }
}
