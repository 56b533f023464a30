#![forbid(unsafe_code)]

//! Snapshot-based undo/redo for the mock room.
//!
//! Each entry captures before/after snapshots of whatever one batch
//! changed. Undoing applies the befores; redoing applies the afters.
//! That models the observable contract of the real client's
//! operation-based history — one entry per batch, undone individually,
//! redo cleared by new entries — without reverse-operation bookkeeping.

use liveroom_core::{Json, JsonObject};

/// What one history entry changed, as before/after snapshots.
#[derive(Debug, Clone, Default)]
pub struct HistoryEntry {
    /// Storage root snapshots, when the batch changed storage.
    pub storage: Option<(Json, Json)>,
    /// Presence snapshots, when the batch changed presence with the
    /// add-to-history option.
    pub presence: Option<(JsonObject, JsonObject)>,
}

impl HistoryEntry {
    /// Whether the entry records no change at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.storage.is_none() && self.presence.is_none()
    }
}

/// The undo and redo stacks.
#[derive(Debug, Default)]
pub struct HistoryStack {
    undo: Vec<HistoryEntry>,
    redo: Vec<HistoryEntry>,
}

impl HistoryStack {
    /// Empty stacks.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new entry. Clears the redo stack: a fresh local change
    /// invalidates anything previously undone.
    pub fn record(&mut self, entry: HistoryEntry) {
        self.undo.push(entry);
        self.redo.clear();
    }

    /// Whether there is anything to undo.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    /// Whether there is anything to redo.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    /// Pop the most recent entry onto the redo stack and return it;
    /// the caller applies its before-snapshots.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo.pop()?;
        self.redo.push(entry.clone());
        Some(entry)
    }

    /// Pop the most recently undone entry back onto the undo stack and
    /// return it; the caller applies its after-snapshots.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo.pop()?;
        self.undo.push(entry.clone());
        Some(entry)
    }

    /// Number of undoable entries.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.undo.len()
    }
}
