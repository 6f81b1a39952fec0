//! Bounded undo/redo log of document snapshots.
//!
//! Every accepted save appends a full [`Snapshot`] of the engine's document
//! after the cursor (discarding any redo tail). Undo and redo move the
//! cursor and hand the target snapshot back to the engine. The log never
//! records an empty document and never restores one.
//!
//! Restores are two-phase: [`History::undo`] / [`History::redo`] start an
//! engine load and set the `restoring` guard; the session clears it with
//! [`History::finish_restore`] when the engine reports the load complete.
//! Events fired by the engine while the guard is up must not be recorded.

use crate::lifecycle::{Lifecycle, Operation, SessionState};
use canvas_core::{CanvasEngine, Snapshot};
use serde::Serialize;
use std::collections::VecDeque;

/// Why a save was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveCause {
    /// Bypasses the readiness gate. Used once, to record the loaded
    /// starter content.
    Forced,
    /// Elements were added, removed, reordered, or text was committed.
    Structural,
    /// A move/scale gesture or a keyboard nudge finished.
    Transform,
    /// Explicit host action (property panel, toolbar button).
    UserCommand,
    /// A change not attributable to the user. Never recorded.
    Programmatic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NotReady(SessionState),
    Disposed,
    Restoring,
    Programmatic,
    EngineUnavailable,
    /// The document has no elements.
    Empty,
    /// Byte-identical to the entry at the cursor.
    Duplicate,
    /// Nothing to move to in the requested direction.
    NothingToUndo,
    NothingToRedo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    Recorded { index: usize },
    Skipped(SkipReason),
}

impl SaveOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, SaveOutcome::Recorded { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// The engine is loading the snapshot at `index`.
    Started { index: usize },
    Skipped(SkipReason),
    /// The engine refused the document.
    Failed(String),
    /// No valid snapshot at or before the requested index.
    Unrecoverable,
}

impl RestoreOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, RestoreOutcome::Started { .. })
    }
}

/// Read-only view of the log for UI consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryStatus {
    pub can_undo: bool,
    pub can_redo: bool,
    pub len: usize,
    pub cursor: Option<usize>,
}

#[derive(Debug)]
pub struct History {
    entries: VecDeque<Snapshot>,
    cursor: Option<usize>,
    capacity: usize,
    restoring: bool,
}

impl History {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            cursor: None,
            capacity,
            restoring: false,
        }
    }

    /// Log seeded with arbitrary entries, including empty ones the save
    /// path would refuse. The cursor is placed on the last entry.
    #[cfg(test)]
    fn with_entries(capacity: usize, entries: impl IntoIterator<Item = Snapshot>) -> Self {
        let mut history = Self::new(capacity);
        history.entries.extend(entries);
        while history.entries.len() > history.capacity {
            history.entries.pop_front();
        }
        history.cursor = history.entries.len().checked_sub(1);
        history
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn is_restoring(&self) -> bool {
        self.restoring
    }

    pub fn entries(&self) -> impl Iterator<Item = &Snapshot> {
        self.entries.iter()
    }

    /// Snapshot at the cursor.
    pub fn current(&self) -> Option<&Snapshot> {
        self.cursor.and_then(|c| self.entries.get(c))
    }

    /// Raise the guard around a bulk engine change that must not be recorded.
    pub fn begin_guard(&mut self) -> bool {
        !std::mem::replace(&mut self.restoring, true)
    }

    /// Drop the guard. Returns whether a restore was in progress.
    pub fn finish_restore(&mut self) -> bool {
        std::mem::replace(&mut self.restoring, false)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = None;
        self.restoring = false;
    }

    // ─── Save ────────────────────────────────────────────────────────────

    /// Capture the engine's document and append it after the cursor.
    pub fn save_state<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &E,
        lifecycle: &Lifecycle,
        cause: SaveCause,
    ) -> SaveOutcome {
        let forced = cause == SaveCause::Forced;
        let skip = if lifecycle.is_disposed() {
            Some(SkipReason::Disposed)
        } else if !forced && !lifecycle.permits(Operation::Save) {
            Some(SkipReason::NotReady(lifecycle.state()))
        } else if cause == SaveCause::Programmatic {
            Some(SkipReason::Programmatic)
        } else if self.restoring && !forced {
            Some(SkipReason::Restoring)
        } else if !engine.is_live() {
            Some(SkipReason::EngineUnavailable)
        } else {
            None
        };
        if let Some(reason) = skip {
            log::debug!("history: save ({cause:?}) skipped: {reason:?}");
            return SaveOutcome::Skipped(reason);
        }

        let snapshot = match engine.serialize() {
            Ok(document) => match Snapshot::capture(&document) {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    log::error!("history: snapshot serialization failed: {err}");
                    return SaveOutcome::Skipped(SkipReason::EngineUnavailable);
                }
            },
            Err(err) => {
                log::warn!("history: engine could not serialize: {err}");
                return SaveOutcome::Skipped(SkipReason::EngineUnavailable);
            }
        };

        if snapshot.is_empty() {
            log::debug!("history: save ({cause:?}) skipped: document has no elements");
            return SaveOutcome::Skipped(SkipReason::Empty);
        }
        if self.current().is_some_and(|cur| cur.same_content(&snapshot)) {
            log::trace!("history: save ({cause:?}) skipped: unchanged");
            return SaveOutcome::Skipped(SkipReason::Duplicate);
        }

        let index = self.push(snapshot);
        log::debug!(
            "history: recorded #{index} ({cause:?}), {} entries",
            self.entries.len()
        );
        SaveOutcome::Recorded { index }
    }

    fn push(&mut self, snapshot: Snapshot) -> usize {
        let keep = self.cursor.map_or(0, |c| c + 1);
        self.entries.truncate(keep);
        self.entries.push_back(snapshot);
        if self.entries.len() > self.capacity {
            self.entries.pop_front();
            log::trace!("history: evicted oldest entry");
        }
        let index = self.entries.len() - 1;
        self.cursor = Some(index);
        index
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    /// Nearest non-empty entry before the cursor.
    fn undo_target(&self) -> Option<usize> {
        let cursor = self.cursor?;
        (0..cursor).rev().find(|&i| !self.entries[i].is_empty())
    }

    /// Nearest non-empty entry after the cursor.
    fn redo_target(&self) -> Option<usize> {
        let start = self.cursor.map_or(0, |c| c + 1);
        (start..self.entries.len()).find(|&i| !self.entries[i].is_empty())
    }

    pub fn can_undo(&self) -> bool {
        self.undo_target().is_some()
    }

    pub fn can_redo(&self) -> bool {
        self.redo_target().is_some()
    }

    pub fn status(&self) -> HistoryStatus {
        HistoryStatus {
            can_undo: self.can_undo(),
            can_redo: self.can_redo(),
            len: self.entries.len(),
            cursor: self.cursor,
        }
    }

    fn navigation_blocked(&self, lifecycle: &Lifecycle, op: Operation) -> Option<SkipReason> {
        if lifecycle.is_disposed() {
            return Some(SkipReason::Disposed);
        }
        if !lifecycle.permits(op) {
            return Some(SkipReason::NotReady(lifecycle.state()));
        }
        if self.restoring {
            log::debug!("history: {op:?} dropped, restore already in progress");
            return Some(SkipReason::Restoring);
        }
        None
    }

    pub fn undo<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        lifecycle: &Lifecycle,
    ) -> RestoreOutcome {
        if let Some(reason) = self.navigation_blocked(lifecycle, Operation::Undo) {
            return RestoreOutcome::Skipped(reason);
        }
        let Some(target) = self.undo_target() else {
            return RestoreOutcome::Skipped(SkipReason::NothingToUndo);
        };
        if let Some(cursor) = self.cursor {
            for skipped in (target + 1)..cursor {
                log::warn!("history: undo skipped empty entry #{skipped}");
            }
        }
        self.load_entry(engine, target)
    }

    pub fn redo<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        lifecycle: &Lifecycle,
    ) -> RestoreOutcome {
        if let Some(reason) = self.navigation_blocked(lifecycle, Operation::Redo) {
            return RestoreOutcome::Skipped(reason);
        }
        let Some(target) = self.redo_target() else {
            return RestoreOutcome::Skipped(SkipReason::NothingToRedo);
        };
        let start = self.cursor.map_or(0, |c| c + 1);
        for skipped in start..target {
            log::warn!("history: redo skipped empty entry #{skipped}");
        }
        self.load_entry(engine, target)
    }

    /// Load the snapshot at `index` into the engine, falling back to the
    /// nearest earlier valid entry if it is empty or unreadable.
    pub fn restore<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        lifecycle: &Lifecycle,
        index: usize,
    ) -> RestoreOutcome {
        if let Some(reason) = self.navigation_blocked(lifecycle, Operation::Restore) {
            log::debug!("history: restore of #{index} skipped: {reason:?}");
            return RestoreOutcome::Skipped(reason);
        }
        self.load_entry(engine, index)
    }

    /// The cursor moves only once the engine has accepted the document.
    fn load_entry<E: CanvasEngine + ?Sized>(
        &mut self,
        engine: &mut E,
        index: usize,
    ) -> RestoreOutcome {
        let upper = index.min(self.entries.len().saturating_sub(1));
        let mut found = None;
        for i in (0..=upper).rev() {
            let Some(snapshot) = self.entries.get(i) else {
                continue;
            };
            if snapshot.is_empty() {
                log::warn!("history: refusing to restore empty entry #{i}");
                continue;
            }
            match snapshot.document() {
                Ok(document) => {
                    found = Some((i, document));
                    break;
                }
                Err(err) => log::warn!("history: entry #{i} is unreadable: {err}"),
            }
        }

        let Some((target, document)) = found else {
            log::error!("history: unrecoverable, no valid snapshot at or before #{index}");
            return RestoreOutcome::Unrecoverable;
        };
        if target != index {
            log::warn!("history: restoring #{target} instead of #{index}");
        }

        self.restoring = true;
        match engine.load_document(document) {
            Ok(()) => {
                self.cursor = Some(target);
                log::debug!("history: restoring #{target}");
                RestoreOutcome::Started { index: target }
            }
            Err(err) => {
                self.restoring = false;
                log::error!("history: engine rejected snapshot #{target}: {err}");
                RestoreOutcome::Failed(err.to_string())
            }
        }
    }
}
