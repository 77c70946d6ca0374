//! The content tree model.
//!
//! [`ContentTree`] owns every node of the page. All structural mutation goes
//! through its API, which checks the containment grammar before touching
//! anything and publishes a [`TreeChange`] after every committed mutation.
//! Views are projections of this tree and never the other way around.

use serde::{Deserialize, Serialize};

use crate::error::TreeError;
use crate::node::{
    Content, Node, NodeId, NodeKind, StyleProperty, Styles, check_containment, validate_subtree,
};
use crate::notify::{Listeners, SubscriptionId, TreeChange};
use crate::sanitize::{sanitize_attrs, sanitize_markup};

/// Location of a node: its parent and index among the parent's children.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub parent: NodeId,
    pub index: usize,
}

/// Serialized form of a whole tree, used by history and persistence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot(String);

impl Snapshot {
    /// Wrap serialized snapshot text (from storage or the network).
    pub fn from_json(json: impl Into<String>) -> Self {
        Self(json.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    next_id: u64,
    root: &'a Node,
}

#[derive(Deserialize)]
struct SnapshotDoc {
    version: u32,
    #[serde(default)]
    next_id: u64,
    root: Node,
}

/// The canonical page tree.
#[derive(Debug)]
pub struct ContentTree {
    root: Node,
    next_id: u64,
    listeners: Listeners<TreeChange>,
}

impl Default for ContentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentTree {
    /// Create a tree holding only an empty root canvas.
    pub fn new() -> Self {
        let mut root = Node::new(NodeKind::Root);
        root.id = NodeId(1);
        Self {
            root,
            next_id: 2,
            listeners: Listeners::default(),
        }
    }

    // === Reads ===

    pub fn root(&self) -> &Node {
        &self.root
    }

    pub fn root_id(&self) -> NodeId {
        self.root.id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.root.find(id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Total number of nodes, root included.
    pub fn len(&self) -> usize {
        self.root.subtree_len()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Parent and index of a node. `None` for the root and for stale ids.
    pub fn position_of(&self, id: NodeId) -> Option<Position> {
        let path = self.path_to(id)?;
        let (&index, parent_path) = path.split_last()?;
        let parent = self.node_at(parent_path)?;
        Some(Position {
            parent: parent.id,
            index,
        })
    }

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.position_of(id).map(|p| p.parent)
    }

    /// Ids from `id` up to the root, innermost first. Empty for stale ids.
    pub fn ancestors_inclusive(&self, id: NodeId) -> Vec<NodeId> {
        let Some(path) = self.path_to(id) else {
            return Vec::new();
        };
        let mut ids = Vec::with_capacity(path.len() + 1);
        let mut node = &self.root;
        ids.push(node.id);
        for &i in &path {
            node = &node.children[i];
            ids.push(node.id);
        }
        ids.reverse();
        ids
    }

    /// Lazily iterate nodes matching `predicate` in document order.
    ///
    /// The iterator borrows the tree, so it is always finite; call again to
    /// restart.
    pub fn query<P>(&self, predicate: P) -> Query<'_, P>
    where
        P: FnMut(&Node) -> bool,
    {
        Query {
            stack: vec![&self.root],
            predicate,
        }
    }

    // === Notifications ===

    /// Register a callback fired after every committed change.
    pub fn on_structural_change(
        &mut self,
        callback: impl FnMut(&TreeChange) + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub(crate) fn emit(&mut self, change: TreeChange) {
        tracing::trace!(?change, "tree change");
        self.listeners.emit(&change);
    }

    // === Structural mutation ===

    /// Insert a detached node (and its subtree) into `into` at `at`.
    ///
    /// `at` is clamped to the container's child count. Every node of the
    /// inserted subtree gets a fresh id; the new id of `node` is returned.
    pub fn insert(&mut self, mut node: Node, into: NodeId, at: usize) -> Result<NodeId, TreeError> {
        let container = self.get(into).ok_or(TreeError::StaleReference(into))?;
        check_containment(container, node.kind, None)?;
        validate_subtree(&node)?;
        sanitize_subtree(&mut node)?;

        self.assign_fresh_ids(&mut node)?;
        let id = node.id;

        let children = self.children_mut(into)?;
        let index = at.min(children.len());
        children.insert(index, node);

        let at = Position {
            parent: into,
            index,
        };
        tracing::debug!(%id, parent = %into, index, "inserted node");
        self.emit(TreeChange::Inserted { id, at });
        Ok(id)
    }

    /// Detach a node and its subtree.
    ///
    /// Removing a node that is no longer in the tree is a no-op returning
    /// `Ok(None)`.
    pub fn remove(&mut self, id: NodeId) -> Result<Option<Node>, TreeError> {
        if id == self.root.id {
            return Err(TreeError::RootImmutable);
        }
        let Some(from) = self.position_of(id) else {
            tracing::trace!(%id, "remove of stale node ignored");
            return Ok(None);
        };

        let node = self.children_mut(from.parent)?.remove(from.index);
        let count = node.subtree_len();
        tracing::debug!(%id, parent = %from.parent, index = from.index, count, "removed node");
        self.emit(TreeChange::Removed { id, from, count });
        Ok(Some(node))
    }

    /// Atomically move a node to `into` at `at`.
    ///
    /// `at` indexes the container's children with the moved node left out,
    /// so it can be fed straight from the geometry resolver. If validation
    /// fails, the tree is untouched.
    pub fn move_node(
        &mut self,
        id: NodeId,
        into: NodeId,
        at: usize,
    ) -> Result<Position, TreeError> {
        if id == self.root.id {
            return Err(TreeError::RootImmutable);
        }
        let from = self.position_of(id).ok_or(TreeError::StaleReference(id))?;
        let node = self.get(id).ok_or(TreeError::StaleReference(id))?;
        if node.contains(into) {
            return Err(TreeError::CyclicMove(id));
        }
        let kind = node.kind;
        let container = self.get(into).ok_or(TreeError::StaleReference(into))?;
        check_containment(container, kind, Some(id))?;

        let node = self.children_mut(from.parent)?.remove(from.index);
        let index = match self.children_mut(into) {
            Ok(children) => {
                let index = at.min(children.len());
                children.insert(index, node);
                index
            }
            Err(e) => {
                // Validated above; put it back rather than lose it.
                if let Ok(children) = self.children_mut(from.parent) {
                    children.insert(from.index, node);
                }
                return Err(e);
            }
        };

        let to = Position {
            parent: into,
            index,
        };
        if to != from {
            tracing::debug!(%id, ?from, ?to, "moved node");
            self.emit(TreeChange::Moved { id, from, to });
        }
        Ok(to)
    }

    /// Insert a deep copy of a node right after it. Returns the copy's id.
    pub fn duplicate(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        if id == self.root.id {
            return Err(TreeError::RootImmutable);
        }
        let pos = self.position_of(id).ok_or(TreeError::StaleReference(id))?;
        let copy = self.get(id).ok_or(TreeError::StaleReference(id))?.clone();
        self.insert(copy, pos.parent, pos.index + 1)
    }

    // === Content setters (used by style/code/settings editors) ===

    pub fn set_style(
        &mut self,
        id: NodeId,
        prop: StyleProperty,
        value: &str,
    ) -> Result<(), TreeError> {
        let node = self.root.find_mut(id).ok_or(TreeError::StaleReference(id))?;
        node.styles.set(prop, value);
        self.emit(TreeChange::Restyled { id });
        Ok(())
    }

    pub fn set_styles(&mut self, id: NodeId, styles: Styles) -> Result<(), TreeError> {
        let node = self.root.find_mut(id).ok_or(TreeError::StaleReference(id))?;
        node.styles = styles;
        self.emit(TreeChange::Restyled { id });
        Ok(())
    }

    /// Replace a node's payload. Snippet markup and settings are sanitized
    /// on the way in.
    pub fn set_content(&mut self, id: NodeId, mut content: Content) -> Result<(), TreeError> {
        let kind = self.get(id).ok_or(TreeError::StaleReference(id))?.kind;
        if !content.fits(kind) {
            return Err(TreeError::PayloadMismatch(kind));
        }
        sanitize_content(&mut content)?;
        let node = self.root.find_mut(id).ok_or(TreeError::StaleReference(id))?;
        node.content = content;
        self.emit(TreeChange::ContentChanged { id });
        Ok(())
    }

    // === Snapshots ===

    pub fn serialize(&self) -> Result<Snapshot, TreeError> {
        let doc = SnapshotRef {
            version: SNAPSHOT_VERSION,
            next_id: self.next_id,
            root: &self.root,
        };
        Ok(Snapshot(serde_json::to_string(&doc)?))
    }

    /// Build a tree from a snapshot, validating the whole structure.
    ///
    /// Snippet content is sanitized again, since snapshots may come from
    /// outside the editor.
    pub fn deserialize(snapshot: &Snapshot) -> Result<Self, TreeError> {
        let mut doc: SnapshotDoc = serde_json::from_str(snapshot.as_str())?;
        if doc.version > SNAPSHOT_VERSION {
            return Err(TreeError::InvalidSnapshot(format!(
                "unsupported snapshot version {}",
                doc.version
            )));
        }
        if doc.root.kind != NodeKind::Root {
            return Err(TreeError::InvalidSnapshot(format!(
                "top-level node is a {}",
                doc.root.kind
            )));
        }
        validate_subtree(&doc.root)?;

        let mut seen = std::collections::HashSet::new();
        let mut max_id: u64 = 0;
        let mut bad_id = None;
        doc.root.for_each(&mut |n| {
            max_id = max_id.max(n.id.0);
            if n.id.is_pending() || !seen.insert(n.id) {
                bad_id.get_or_insert(n.id);
            }
        });
        if let Some(id) = bad_id {
            return Err(TreeError::InvalidSnapshot(format!(
                "node id {id} is missing or duplicated"
            )));
        }

        let next_id = max_id
            .checked_add(1)
            .ok_or_else(|| TreeError::InvalidSnapshot(format!("node id {max_id} leaves no room")))?
            .max(doc.next_id);
        sanitize_subtree(&mut doc.root)
            .map_err(|e| TreeError::InvalidSnapshot(e.to_string()))?;

        Ok(Self {
            root: doc.root,
            next_id,
            listeners: Listeners::default(),
        })
    }

    /// Replace the live tree with a snapshot, keeping subscribers.
    ///
    /// On error the current tree is left exactly as it was.
    pub fn restore(&mut self, snapshot: &Snapshot) -> Result<(), TreeError> {
        let fresh = Self::deserialize(snapshot)?;
        self.root = fresh.root;
        self.next_id = fresh.next_id;
        self.emit(TreeChange::Replaced);
        Ok(())
    }

    // === Internals ===

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.root.find_mut(id)
    }

    pub(crate) fn assign_fresh_ids(&mut self, node: &mut Node) -> Result<(), TreeError> {
        self.next_id = allocate_ids(node, self.next_id, |_| true)?;
        Ok(())
    }

    /// Swap out a node's children wholesale. Pending ids in the new list are
    /// assigned; existing ids are kept. Callers validate beforehand.
    pub(crate) fn replace_children(
        &mut self,
        id: NodeId,
        mut children: Vec<Node>,
    ) -> Result<(), TreeError> {
        let mut next = self.next_id;
        for child in &mut children {
            next = allocate_ids(child, next, |n| n.id.is_pending())?;
        }
        *self.children_mut(id)? = children;
        self.next_id = next;
        Ok(())
    }

    fn children_mut(&mut self, id: NodeId) -> Result<&mut Vec<Node>, TreeError> {
        self.root
            .find_mut(id)
            .map(|n| &mut n.children)
            .ok_or(TreeError::StaleReference(id))
    }

    fn path_to(&self, id: NodeId) -> Option<Vec<usize>> {
        fn walk(node: &Node, id: NodeId, path: &mut Vec<usize>) -> bool {
            if node.id == id {
                return true;
            }
            for (i, child) in node.children.iter().enumerate() {
                path.push(i);
                if walk(child, id, path) {
                    return true;
                }
                path.pop();
            }
            false
        }

        let mut path = Vec::new();
        walk(&self.root, id, &mut path).then_some(path)
    }

    fn node_at(&self, path: &[usize]) -> Option<&Node> {
        path.iter()
            .try_fold(&self.root, |node, &i| node.children.get(i))
    }
}

/// Number the nodes of `node` selected by `pick`, starting at `next`.
/// Returns the next free id.
fn allocate_ids(
    node: &mut Node,
    mut next: u64,
    pick: impl Fn(&Node) -> bool,
) -> Result<u64, TreeError> {
    let mut exhausted = false;
    node.for_each_mut(&mut |n| {
        if exhausted || !pick(n) {
            return;
        }
        match next.checked_add(1) {
            Some(after) => {
                n.id = NodeId(next);
                next = after;
            }
            None => exhausted = true,
        }
    });
    if exhausted {
        return Err(TreeError::IdsExhausted);
    }
    Ok(next)
}

fn sanitize_content(content: &mut Content) -> Result<(), TreeError> {
    if let Content::Snippet(snippet) = content {
        snippet.markup = sanitize_markup(&snippet.markup)?;
        snippet.attrs = sanitize_attrs(&snippet.attrs);
    }
    Ok(())
}

fn sanitize_subtree(node: &mut Node) -> Result<(), TreeError> {
    let mut result = Ok(());
    node.for_each_mut(&mut |n| {
        if result.is_ok() {
            result = sanitize_content(&mut n.content);
        }
    });
    result
}

/// Lazy pre-order search over the tree. See [`ContentTree::query`].
#[derive(Clone)]
pub struct Query<'a, P> {
    stack: Vec<&'a Node>,
    predicate: P,
}

impl<'a, P> Iterator for Query<'a, P>
where
    P: FnMut(&Node) -> bool,
{
    type Item = &'a Node;

    fn next(&mut self) -> Option<&'a Node> {
        while let Some(node) = self.stack.pop() {
            self.stack.extend(node.children.iter().rev());
            if (self.predicate)(node) {
                return Some(node);
            }
        }
        None
    }
}
