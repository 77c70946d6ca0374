//! Snapshot-based undo/redo.
//!
//! The tracker keeps a bounded list of whole-tree snapshots and a cursor
//! into it. Entry 0 is the baseline taken at construction. Change
//! notifications from the tree only mark the history dirty; the dirty state
//! becomes an entry once the debounce window has passed without further
//! changes ([`HistoryTracker::poll`]) or when a discrete action forces it
//! ([`HistoryTracker::flush`]).

use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Duration;

use web_time::Instant;

use crate::error::TreeError;
use crate::notify::SubscriptionId;
use crate::platform::Clock;
use crate::tree::{ContentTree, Snapshot};

#[derive(Clone, Debug)]
struct HistoryEntry {
    seq: u64,
    snapshot: Snapshot,
}

/// Undo/redo stack of tree snapshots with change debouncing.
pub struct HistoryTracker {
    entries: VecDeque<HistoryEntry>,
    cursor: usize,
    capacity: usize,
    debounce: Duration,
    next_seq: u64,
    /// Time of the latest change not yet recorded.
    pending: Rc<Cell<Option<Instant>>>,
    clock: Rc<dyn Clock>,
    subscription: Option<SubscriptionId>,
}

impl std::fmt::Debug for HistoryTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HistoryTracker")
            .field("entries", &self.entries.len())
            .field("cursor", &self.cursor)
            .field("capacity", &self.capacity)
            .field("pending", &self.pending.get().is_some())
            .finish()
    }
}

impl HistoryTracker {
    /// Record `tree` as the baseline and subscribe to its changes.
    pub fn new(
        tree: &mut ContentTree,
        capacity: usize,
        debounce: Duration,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, TreeError> {
        let mut history = Self {
            entries: VecDeque::with_capacity(capacity.min(64)),
            cursor: 0,
            capacity: capacity.max(1),
            debounce,
            next_seq: 0,
            pending: Rc::new(Cell::new(None)),
            clock,
            subscription: None,
        };
        history.record_state(tree)?;
        history.attach(tree);
        Ok(history)
    }

    /// Listen for committed changes on `tree`. Replaces any previous
    /// subscription on the same tree.
    pub fn attach(&mut self, tree: &mut ContentTree) {
        self.detach(tree);
        let pending = Rc::clone(&self.pending);
        let clock = Rc::clone(&self.clock);
        let id = tree.on_structural_change(move |change| {
            if change.is_recordable() {
                pending.set(Some(clock.now()));
            }
        });
        self.subscription = Some(id);
    }

    pub fn detach(&mut self, tree: &mut ContentTree) {
        if let Some(id) = self.subscription.take() {
            tree.unsubscribe(id);
        }
    }

    /// Push the current tree as a new entry, discarding any redo future and
    /// evicting the oldest entries past capacity.
    pub fn record_state(&mut self, tree: &ContentTree) -> Result<(), TreeError> {
        let snapshot = tree.serialize()?;
        self.entries.truncate(self.cursor + 1);
        self.entries.push_back(HistoryEntry {
            seq: self.next_seq,
            snapshot,
        });
        self.next_seq += 1;
        while self.entries.len() > self.capacity {
            self.entries.pop_front();
        }
        self.cursor = self.entries.len() - 1;
        self.pending.set(None);
        tracing::debug!(
            seq = self.next_seq - 1,
            cursor = self.cursor,
            len = self.entries.len(),
            "recorded history entry"
        );
        Ok(())
    }

    /// Mark the tree dirty without a notification (e.g. a collaborator
    /// edited through a path that does not emit).
    pub fn note_change(&mut self) {
        self.pending.set(Some(self.clock.now()));
    }

    pub fn has_pending(&self) -> bool {
        self.pending.get().is_some()
    }

    /// When a pending change becomes due, for hosts scheduling a timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.get().map(|at| at + self.debounce)
    }

    /// Record the pending change if the debounce window has elapsed.
    pub fn poll(&mut self, tree: &ContentTree) -> Result<bool, TreeError> {
        let Some(last) = self.pending.get() else {
            return Ok(false);
        };
        if self.clock.now().saturating_duration_since(last) < self.debounce {
            return Ok(false);
        }
        self.record_state(tree)?;
        Ok(true)
    }

    /// Record the pending change right away, if there is one.
    pub fn flush(&mut self, tree: &ContentTree) -> Result<bool, TreeError> {
        if !self.has_pending() {
            return Ok(false);
        }
        self.record_state(tree)?;
        Ok(true)
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0 || self.has_pending()
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.entries.len() && !self.has_pending()
    }

    /// Step back one entry. `Ok(false)` at the start of history.
    ///
    /// If the snapshot fails to restore, the step is aborted: the error is
    /// returned and both the tree and the cursor are unchanged.
    pub fn undo(&mut self, tree: &mut ContentTree) -> Result<bool, TreeError> {
        self.flush(tree)?;
        if self.cursor == 0 {
            tracing::trace!("undo at start of history");
            return Ok(false);
        }
        self.step_to(tree, self.cursor - 1)
    }

    /// Step forward one entry. `Ok(false)` at the end of history.
    pub fn redo(&mut self, tree: &mut ContentTree) -> Result<bool, TreeError> {
        self.flush(tree)?;
        if self.cursor + 1 >= self.entries.len() {
            tracing::trace!("redo at end of history");
            return Ok(false);
        }
        self.step_to(tree, self.cursor + 1)
    }

    /// Drop every entry and take `tree` as the new baseline.
    pub fn clear_history(&mut self, tree: &ContentTree) -> Result<(), TreeError> {
        self.entries.clear();
        self.cursor = 0;
        self.record_state(tree)
    }

    /// Number of entries, baseline included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number of the entry under the cursor. Strictly increasing
    /// over the tracker's lifetime.
    pub fn current_seq(&self) -> Option<u64> {
        self.entries.get(self.cursor).map(|e| e.seq)
    }

    fn step_to(&mut self, tree: &mut ContentTree, cursor: usize) -> Result<bool, TreeError> {
        let Some(entry) = self.entries.get(cursor) else {
            return Ok(false);
        };
        if let Err(e) = tree.restore(&entry.snapshot) {
            tracing::warn!(seq = entry.seq, error = %e, "history snapshot failed to restore");
            return Err(e);
        }
        self.cursor = cursor;
        self.pending.set(None);
        tracing::debug!(cursor, seq = entry.seq, "history step");
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{Node, NodeKind, StyleProperty};
    use crate::platform::ManualClock;

    const DEBOUNCE: Duration = Duration::from_millis(300);

    fn make_history(capacity: usize) -> (ContentTree, HistoryTracker, Rc<ManualClock>) {
        let mut tree = ContentTree::new();
        let clock = Rc::new(ManualClock::new());
        let history = HistoryTracker::new(&mut tree, capacity, DEBOUNCE, clock.clone()).unwrap();
        (tree, history, clock)
    }

    fn add_block(tree: &mut ContentTree) -> crate::node::NodeId {
        let root = tree.root_id();
        tree.insert(Node::new(NodeKind::Block), root, usize::MAX)
            .unwrap()
    }

    #[test]
    fn test_baseline_recorded() {
        let (_, history, _) = make_history(50);
        assert_eq!(history.len(), 1);
        assert!(!history.can_undo());
        assert!(!history.can_redo());
    }

    #[test]
    fn test_undo_redo_boundaries_are_noops() {
        let (mut tree, mut history, _) = make_history(50);
        assert!(!history.undo(&mut tree).unwrap());
        assert!(!history.redo(&mut tree).unwrap());
        assert_eq!(history.cursor(), 0);
    }

    #[test]
    fn test_burst_coalesces_into_one_entry() {
        let (mut tree, mut history, clock) = make_history(50);
        let block = add_block(&mut tree);
        for i in 0..20 {
            clock.advance(Duration::from_millis(10));
            tree.set_style(block, StyleProperty::Height, &format!("{i}px"))
                .unwrap();
            assert!(!history.poll(&tree).unwrap());
        }
        clock.advance(Duration::from_millis(299));
        assert!(!history.poll(&tree).unwrap());
        clock.advance(Duration::from_millis(1));
        assert!(history.poll(&tree).unwrap());
        assert_eq!(history.len(), 2);
        assert!(!history.poll(&tree).unwrap());
    }

    #[test]
    fn test_undo_flushes_pending_first() {
        let (mut tree, mut history, _) = make_history(50);
        add_block(&mut tree);
        assert!(history.has_pending());
        assert!(history.undo(&mut tree).unwrap());
        assert!(tree.is_empty());
        assert!(history.redo(&mut tree).unwrap());
        assert_eq!(tree.root().children.len(), 1);
    }

    #[test]
    fn test_record_truncates_redo_future() {
        let (mut tree, mut history, _) = make_history(50);
        add_block(&mut tree);
        history.flush(&tree).unwrap();
        add_block(&mut tree);
        history.flush(&tree).unwrap();
        history.undo(&mut tree).unwrap();
        assert!(history.can_redo());

        add_block(&mut tree);
        history.flush(&tree).unwrap();
        assert!(!history.can_redo());
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let (mut tree, mut history, _) = make_history(3);
        for _ in 0..5 {
            add_block(&mut tree);
            history.flush(&tree).unwrap();
        }
        assert_eq!(history.len(), 3);
        assert!(history.undo(&mut tree).unwrap());
        assert!(history.undo(&mut tree).unwrap());
        assert!(!history.undo(&mut tree).unwrap());
        assert_eq!(tree.root().children.len(), 3);
    }

    #[test]
    fn test_restore_does_not_mark_dirty() {
        let (mut tree, mut history, _) = make_history(50);
        add_block(&mut tree);
        history.flush(&tree).unwrap();
        history.undo(&mut tree).unwrap();
        assert!(!history.has_pending());
        assert!(history.can_redo());
    }

    #[test]
    fn test_sequence_numbers_increase() {
        let (mut tree, mut history, _) = make_history(50);
        let first = history.current_seq().unwrap();
        add_block(&mut tree);
        history.flush(&tree).unwrap();
        assert!(history.current_seq().unwrap() > first);
    }

    #[test]
    fn test_next_deadline_tracks_latest_change() {
        let (mut tree, history, clock) = make_history(50);
        assert!(history.next_deadline().is_none());
        add_block(&mut tree);
        let first = history.next_deadline().unwrap();
        clock.advance(Duration::from_millis(100));
        add_block(&mut tree);
        assert_eq!(history.next_deadline().unwrap() - first, Duration::from_millis(100));
    }
}
