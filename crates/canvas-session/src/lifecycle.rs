//! Session lifecycle state machine.
//!
//! ```text
//! Uninitialized ─► Initializing ─► AwaitingContent ─► Ready
//!        └──────────────┴────────────────┴─────────────┴──► Disposed
//! ```
//!
//! History operations are only permitted in `Ready`; everything else is a
//! logged no-op.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Uninitialized,
    Initializing,
    AwaitingContent,
    Ready,
    Disposed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Initializing => "initializing",
            SessionState::AwaitingContent => "awaiting-content",
            SessionState::Ready => "ready",
            SessionState::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Operations gated on the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Undo,
    Redo,
    Restore,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("session is already {0}")]
    AlreadyInitialized(SessionState),
    #[error("session has been disposed")]
    Disposed,
    #[error("cannot go from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },
}

/// A state change, for observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: SessionState,
    pub to: SessionState,
}

#[derive(Debug, Clone)]
pub struct Lifecycle {
    state: SessionState,
    last_error: Option<String>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            last_error: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == SessionState::Ready
    }

    pub fn is_disposed(&self) -> bool {
        self.state == SessionState::Disposed
    }

    /// Message of the most recent engine or content failure.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn advance(
        &mut self,
        expected: SessionState,
        to: SessionState,
    ) -> Result<Transition, LifecycleError> {
        let from = self.state;
        if from == SessionState::Disposed {
            return Err(LifecycleError::Disposed);
        }
        if from != expected {
            return Err(LifecycleError::InvalidTransition { from, to });
        }
        self.state = to;
        log::debug!("lifecycle: {from} -> {to}");
        Ok(Transition { from, to })
    }

    /// Start acquiring the engine. Only allowed once.
    pub fn begin_initializing(&mut self) -> Result<Transition, LifecycleError> {
        match self.state {
            SessionState::Uninitialized => {
                self.advance(SessionState::Uninitialized, SessionState::Initializing)
            }
            SessionState::Disposed => Err(LifecycleError::Disposed),
            other => Err(LifecycleError::AlreadyInitialized(other)),
        }
    }

    /// The engine reported ready.
    pub fn engine_ready(&mut self) -> Result<Transition, LifecycleError> {
        let transition = self.advance(SessionState::Initializing, SessionState::AwaitingContent)?;
        self.last_error = None;
        Ok(transition)
    }

    /// Engine acquisition failed. The session stays in `Initializing` so
    /// the host can retry.
    pub fn engine_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("lifecycle: engine unavailable: {message}");
        self.last_error = Some(message);
    }

    /// Starter content is in place and the first snapshot was recorded.
    pub fn content_loaded(&mut self) -> Result<Transition, LifecycleError> {
        let transition = self.advance(SessionState::AwaitingContent, SessionState::Ready)?;
        self.last_error = None;
        Ok(transition)
    }

    /// Content fetch failed. The session stays in `AwaitingContent`.
    pub fn content_failed(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::warn!("lifecycle: content load failed: {message}");
        self.last_error = Some(message);
    }

    /// Move to `Disposed`. Returns `None` if already disposed.
    pub fn dispose(&mut self) -> Option<Transition> {
        if self.state == SessionState::Disposed {
            return None;
        }
        let from = self.state;
        self.state = SessionState::Disposed;
        log::debug!("lifecycle: {from} -> disposed");
        Some(Transition {
            from,
            to: SessionState::Disposed,
        })
    }

    /// Whether `op` may run now. Refusals are logged, not raised.
    pub fn permits(&self, op: Operation) -> bool {
        let allowed = self.state == SessionState::Ready;
        if !allowed {
            log::debug!("lifecycle: {op:?} ignored while {}", self.state);
        }
        allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path() {
        let mut lc = Lifecycle::new();
        assert!(!lc.permits(Operation::Save));
        lc.begin_initializing().unwrap();
        lc.engine_ready().unwrap();
        assert!(!lc.permits(Operation::Undo));
        assert!(!lc.permits(Operation::Restore));
        let t = lc.content_loaded().unwrap();
        assert_eq!(
            t,
            Transition {
                from: SessionState::AwaitingContent,
                to: SessionState::Ready
            }
        );
        assert!(lc.permits(Operation::Redo));
        assert!(lc.permits(Operation::Restore));
    }

    #[test]
    fn reentry_is_rejected() {
        let mut lc = Lifecycle::new();
        lc.begin_initializing().unwrap();
        assert_eq!(
            lc.begin_initializing(),
            Err(LifecycleError::AlreadyInitialized(SessionState::Initializing))
        );
    }

    #[test]
    fn content_loaded_only_once() {
        let mut lc = Lifecycle::new();
        lc.begin_initializing().unwrap();
        lc.engine_ready().unwrap();
        lc.content_loaded().unwrap();
        assert!(matches!(
            lc.content_loaded(),
            Err(LifecycleError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn failures_keep_state() {
        let mut lc = Lifecycle::new();
        lc.begin_initializing().unwrap();
        lc.engine_failed("no canvas element");
        assert_eq!(lc.state(), SessionState::Initializing);
        assert_eq!(lc.last_error(), Some("no canvas element"));

        lc.engine_ready().unwrap();
        assert_eq!(lc.last_error(), None);
        lc.content_failed("404");
        assert_eq!(lc.state(), SessionState::AwaitingContent);
    }

    #[test]
    fn dispose_is_idempotent_and_terminal() {
        let mut lc = Lifecycle::new();
        assert!(lc.dispose().is_some());
        assert!(lc.dispose().is_none());
        assert_eq!(lc.begin_initializing(), Err(LifecycleError::Disposed));
        assert!(!lc.permits(Operation::Save));
    }
}
