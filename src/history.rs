//! Bounded linear undo/redo history of [`UndoableEdit`]s.
//!
//! Entries before the cursor can be undone, entries after it redone.
//! Recording a new edit discards the redo tail; pushing past capacity evicts
//! the oldest entry. Consecutive same-session annotation (or comment) edits
//! on one node collapse into a single entry.

use std::collections::{HashSet, VecDeque};

use tracing::{debug, warn};

use crate::constants::DEFAULT_HISTORY_CAPACITY;
use crate::edit::{SessionId, UndoableEdit};
use crate::error::{Error, Result};
use crate::model::GameModel;

pub struct EditHistory {
    entries: VecDeque<UndoableEdit>,
    /// Number of entries currently applied.
    cursor: usize,
    capacity: usize,
    next_session: u64,
}

impl Default for EditHistory {
    fn default() -> Self {
        Self::new()
    }
}

impl EditHistory {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// A history keeping at most `capacity` entries (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            cursor: 0,
            capacity: capacity.max(1),
            next_session: 0,
        }
    }

    /// A fresh session id for a gesture whose edits should undo together.
    pub fn begin_session(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId::new(self.next_session)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.entries.len()
    }

    /// The entry the next undo would revert.
    pub fn peek_undo(&self) -> Option<&UndoableEdit> {
        self.cursor.checked_sub(1).and_then(|i| self.entries.get(i))
    }

    /// The entry the next redo would re-apply.
    pub fn peek_redo(&self) -> Option<&UndoableEdit> {
        self.entries.get(self.cursor)
    }

    /// Perform `edit` against `model` and record it.
    ///
    /// An edit whose perform fails (an illegal move, a stale target) is not
    /// recorded and the history is left as it was.
    pub fn apply(&mut self, model: &mut GameModel, mut edit: UndoableEdit) -> Result<()> {
        edit.perform(model)?;
        self.record(model, edit)
    }

    /// Record an edit that has already been performed.
    pub fn record(&mut self, model: &mut GameModel, edit: UndoableEdit) -> Result<()> {
        if !edit.is_performed() {
            return Err(Error::NotPerformed);
        }

        let discarded: Vec<UndoableEdit> = self.entries.drain(self.cursor..).collect();
        if !discarded.is_empty() {
            debug!(count = discarded.len(), "discarded redo entries");
        }

        let edit = match self.entries.back_mut() {
            Some(top) => match top.try_merge(edit) {
                Ok(()) => {
                    debug!(edit = %top, "merged edit into previous entry");
                    self.release(model, discarded);
                    return Ok(());
                }
                Err(edit) => edit,
            },
            None => edit,
        };

        debug!(edit = %edit, "recorded edit");
        self.entries.push_back(edit);
        let mut dropped = discarded;
        while self.entries.len() > self.capacity {
            if let Some(oldest) = self.entries.pop_front() {
                debug!(edit = %oldest, "evicted oldest entry");
                dropped.push(oldest);
            }
        }
        self.cursor = self.entries.len();
        self.release(model, dropped);
        Ok(())
    }

    /// Undo the most recent applied entry. Returns false if there is none.
    ///
    /// If the entry no longer fits the tree it is dropped from the history
    /// and the error is returned.
    pub fn undo(&mut self, model: &mut GameModel) -> Result<bool> {
        let Some(i) = self.cursor.checked_sub(1) else {
            return Ok(false);
        };
        match self.entries[i].undo(model) {
            Ok(()) => {
                self.cursor = i;
                Ok(true)
            }
            Err(e) if e.is_structural() => {
                warn!(error = %e, "dropping entry that can no longer be undone");
                let dropped: Vec<UndoableEdit> = self.entries.remove(i).into_iter().collect();
                self.cursor = i;
                self.release(model, dropped);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Redo the next undone entry. Returns false if there is none.
    ///
    /// If the entry no longer fits the tree, it and every later entry are
    /// dropped and the error is returned.
    pub fn redo(&mut self, model: &mut GameModel) -> Result<bool> {
        let i = self.cursor;
        let Some(entry) = self.entries.get_mut(i) else {
            return Ok(false);
        };
        match entry.perform(model) {
            Ok(()) => {
                self.cursor = i + 1;
                Ok(true)
            }
            Err(e) if e.is_structural() => {
                warn!(error = %e, "dropping redo entries that can no longer be applied");
                let dropped: Vec<UndoableEdit> = self.entries.drain(i..).collect();
                self.release(model, dropped);
                Err(e)
            }
            Err(e) => Err(e),
        }
    }

    /// Forget every entry.
    pub fn clear(&mut self, model: &mut GameModel) {
        let dropped: Vec<UndoableEdit> = self.entries.drain(..).collect();
        self.cursor = 0;
        self.release(model, dropped);
    }

    /// Free detached subtrees only the dropped edits could have re-inserted.
    fn release(&self, model: &mut GameModel, dropped: Vec<UndoableEdit>) {
        if dropped.is_empty() {
            return;
        }
        let retained: HashSet<_> = self
            .entries
            .iter()
            .flat_map(UndoableEdit::referenced_nodes)
            .collect();
        for node in dropped.iter().flat_map(UndoableEdit::referenced_nodes) {
            if model.tree().subtree(node).iter().any(|n| retained.contains(n)) {
                continue;
            }
            let freed = model.release_detached(node);
            if !freed.is_empty() {
                debug!(node = %node, count = freed.len(), "released detached subtree");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GameConfig;
    use crate::tree::Marker;

    fn model() -> GameModel {
        GameModel::new(GameConfig::new().with_size(9)).unwrap()
    }

    #[test]
    fn test_undo_redo_empty() {
        let mut m = model();
        let mut h = EditHistory::new();
        assert!(!h.undo(&mut m).unwrap());
        assert!(!h.redo(&mut m).unwrap());
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let mut m = model();
        let mut h = EditHistory::with_capacity(2);
        for x in 0..3 {
            h.apply(&mut m, UndoableEdit::play(x, 0)).unwrap();
        }
        assert_eq!(h.len(), 2);
        assert!(h.undo(&mut m).unwrap());
        assert!(h.undo(&mut m).unwrap());
        assert!(!h.undo(&mut m).unwrap());
        // The first move was evicted, so it stays on the board
        assert_eq!(m.tree().node_count(), 2);
    }

    #[test]
    fn test_new_edit_clears_redo() {
        let mut m = model();
        let mut h = EditHistory::new();
        h.apply(&mut m, UndoableEdit::play(0, 0)).unwrap();
        h.apply(&mut m, UndoableEdit::play(1, 0)).unwrap();
        h.undo(&mut m).unwrap();
        assert!(h.can_redo());
        h.apply(&mut m, UndoableEdit::play(2, 0)).unwrap();
        assert!(!h.can_redo());
        assert_eq!(h.len(), 2);
    }

    #[test]
    fn test_discarded_redo_releases_node() {
        let mut m = model();
        let mut h = EditHistory::new();
        h.apply(&mut m, UndoableEdit::play(0, 0)).unwrap();
        let undone = m.current();
        h.undo(&mut m).unwrap();
        assert!(m.tree().get(undone).is_some());
        h.apply(&mut m, UndoableEdit::play(1, 0)).unwrap();
        assert!(m.tree().get(undone).is_none());
    }

    #[test]
    fn test_capacity_zero_is_clamped() {
        let h = EditHistory::with_capacity(0);
        assert_eq!(h.capacity(), 1);
    }

    #[test]
    fn test_record_requires_performed_edit() {
        let mut m = model();
        let mut h = EditHistory::new();
        assert_eq!(
            h.record(&mut m, UndoableEdit::play(0, 0)),
            Err(Error::NotPerformed)
        );
        assert!(h.is_empty());
    }

    #[test]
    fn test_sessions_are_distinct() {
        let mut h = EditHistory::new();
        assert_ne!(h.begin_session(), h.begin_session());
    }

    #[test]
    fn test_merge_only_at_top() {
        let mut m = model();
        let mut h = EditHistory::new();
        let root = m.root();
        let s = h.begin_session();
        h.apply(&mut m, UndoableEdit::add_marker(root, (0, 0), Marker::Triangle, s))
            .unwrap();
        h.apply(&mut m, UndoableEdit::play(4, 4)).unwrap();
        // Same session and node, but a move sits in between
        h.apply(&mut m, UndoableEdit::add_marker(root, (1, 0), Marker::Triangle, s))
            .unwrap();
        assert_eq!(h.len(), 3);
    }
}
