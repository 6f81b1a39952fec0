//! Decides whether an engine event is a recordable mutation.
//!
//! The engine reports `element:modified` after every pointer release, even
//! a plain click that moved nothing. A modification only counts when a
//! transform gesture (`element:moving|scaling|rotating`) was seen since the
//! last selection change and has not expired, or when the element's
//! geometry no longer matches the selection fingerprint.
//!
//! Gesture flags expire `transform_settle_ms` after the pointer is
//! released. Expiry is evaluated lazily against event timestamps, so the
//! classifier needs no timer.

use crate::history::SaveCause;
use crate::selection::Selection;
use canvas_core::{EngineEvent, EngineEventKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Structural,
    Transform,
    Noise,
}

impl MutationKind {
    pub fn save_cause(self) -> Option<SaveCause> {
        match self {
            MutationKind::Structural => Some(SaveCause::Structural),
            MutationKind::Transform => Some(SaveCause::Transform),
            MutationKind::Noise => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MutationClassifier {
    settle_ms: f64,
    dragging: bool,
    scaling: bool,
    /// Engine time after which the flags no longer count.
    expires_at: Option<f64>,
}

impl MutationClassifier {
    pub fn new(settle_ms: f64) -> Self {
        Self {
            settle_ms,
            dragging: false,
            scaling: false,
            expires_at: None,
        }
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn is_scaling(&self) -> bool {
        self.scaling
    }

    pub fn reset(&mut self) {
        self.dragging = false;
        self.scaling = false;
        self.expires_at = None;
    }

    fn gesture_live(&self, now: f64) -> bool {
        (self.dragging || self.scaling) && self.expires_at.is_none_or(|t| now <= t)
    }

    /// Classify one event. `restoring` is the history guard: nothing that
    /// happens while a snapshot is being loaded is a user mutation.
    pub fn classify(
        &mut self,
        event: &EngineEvent,
        selection: &Selection,
        restoring: bool,
    ) -> MutationKind {
        use EngineEventKind as K;

        if restoring {
            if matches!(
                event.kind,
                K::SelectionCreated { .. } | K::SelectionUpdated { .. } | K::SelectionCleared
            ) {
                self.reset();
            }
            return MutationKind::Noise;
        }

        match &event.kind {
            K::ElementAdded { .. } | K::ElementRemoved { .. } | K::ElementReordered { .. } => {
                MutationKind::Structural
            }
            K::TextEditingExited { .. } => MutationKind::Structural,
            K::Moving { .. } => {
                self.dragging = true;
                self.expires_at = None;
                MutationKind::Noise
            }
            K::Scaling { .. } | K::Rotating { .. } => {
                self.scaling = true;
                self.expires_at = None;
                MutationKind::Noise
            }
            K::PointerUp { .. } => {
                if self.dragging || self.scaling {
                    self.expires_at = Some(event.time_ms + self.settle_ms);
                }
                MutationKind::Noise
            }
            K::ElementModified { id, geometry } => {
                let gesture = self.gesture_live(event.time_ms);
                let moved = selection.differs(*id, geometry);
                self.reset();
                if gesture || moved {
                    log::trace!(
                        "classifier: {id} modified (gesture: {gesture}, moved: {moved})"
                    );
                    MutationKind::Transform
                } else {
                    MutationKind::Noise
                }
            }
            K::SelectionCreated { .. } | K::SelectionUpdated { .. } | K::SelectionCleared => {
                self.reset();
                MutationKind::Noise
            }
            K::PointerDown { .. }
            | K::PointerMove { .. }
            | K::PointerOver { .. }
            | K::PointerOut { .. }
            | K::DoubleClick { .. }
            | K::TextEditingEntered { .. }
            | K::DocumentLoaded => MutationKind::Noise,
        }
    }
}
