//! Change notifications.
//!
//! The tree and the mode controller publish events through a [`Listeners`]
//! list. Callbacks receive the event by reference and cannot reach back into
//! the publisher, so a notification can never re-enter a mutation.

use std::fmt;

use crate::node::NodeId;
use crate::tree::Position;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An ordered list of callbacks for events of type `E`.
pub struct Listeners<E> {
    entries: Vec<(SubscriptionId, Box<dyn FnMut(&E)>)>,
    next_id: u64,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }
}

impl<E> fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.entries.len())
            .finish()
    }
}

impl<E> Listeners<E> {
    pub fn subscribe(&mut self, callback: impl FnMut(&E) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, Box::new(callback)));
        id
    }

    /// Returns false if the subscription was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(sid, _)| *sid != id);
        self.entries.len() != before
    }

    pub fn emit(&mut self, event: &E) {
        for (_, callback) in self.entries.iter_mut() {
            callback(event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A committed change to the content tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeChange {
    Inserted { id: NodeId, at: Position },
    Removed { id: NodeId, from: Position, count: usize },
    Moved { id: NodeId, from: Position, to: Position },
    /// Column layout of a block was rebuilt.
    ColumnsChanged { block: NodeId, count: usize },
    Restyled { id: NodeId },
    ContentChanged { id: NodeId },
    /// The whole tree was swapped out (undo, redo, load).
    Replaced,
}

impl TreeChange {
    /// Insert, remove, move and column changes alter the shape of the tree.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            TreeChange::Inserted { .. }
                | TreeChange::Removed { .. }
                | TreeChange::Moved { .. }
                | TreeChange::ColumnsChanged { .. }
        )
    }

    /// Whether this change should eventually produce a history entry.
    pub fn is_recordable(&self) -> bool {
        !matches!(self, TreeChange::Replaced)
    }
}
