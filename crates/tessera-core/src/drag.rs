//! Drag session controller.
//!
//! One gesture at a time moves through
//! `Idle -> Armed -> Dragging -> {Committing | Cancelling} -> Idle`.
//! `Committing` and `Cancelling` only exist for the duration of a
//! [`DragController::drop`] or [`DragController::cancel`] call.
//!
//! The tree is never touched while hovering. An existing node stays where it
//! is until the drop commits, so a cancelled gesture leaves the tree exactly
//! as it was.

use smol_str::SmolStr;

use crate::factory::{NodeFactory, Template};
use crate::geometry::{ChildBox, ContainerLayout, Feedback, InsertionPoint, Point};
use crate::node::{NodeId, NodeKind, check_containment};
use crate::palette::PaletteEntry;
use crate::platform::LayoutProbe;
use crate::tree::{ContentTree, Position};

/// What the pointer went down on.
#[derive(Clone, Debug, PartialEq)]
pub enum DragSource {
    /// A palette item.
    Palette(PaletteEntry),
    /// The drag handle of a node already on the page.
    Handle(NodeId),
    /// An image file dragged in from outside the page.
    ImageFile { name: SmolStr },
}

/// Where a new item comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum NewItem {
    /// Built by the factory; `None` means the kind's default.
    Template(Option<Template>),
    /// Inserted as a placeholder image, filled in later by the host.
    ImageFile(SmolStr),
}

#[derive(Clone, Debug, PartialEq)]
pub enum Provenance {
    New(NewItem),
    /// A node already in the tree, with its position when the drag began.
    Existing { node: NodeId, origin: Position },
}

/// A classified drag payload.
#[derive(Clone, Debug, PartialEq)]
pub struct DragPayload {
    pub kind: NodeKind,
    pub provenance: Provenance,
}

impl DragPayload {
    /// The node being relocated, for existing-node drags.
    pub fn existing(&self) -> Option<NodeId> {
        match self.provenance {
            Provenance::Existing { node, .. } => Some(node),
            Provenance::New(_) => None,
        }
    }
}

/// A legal place to drop the current payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DropTarget {
    pub container: NodeId,
    pub point: InsertionPoint,
}

/// State of one in-flight gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct DragSession {
    /// `None` when the source could not be classified; such a session never
    /// finds a target.
    payload: Option<DragPayload>,
    target: Option<DropTarget>,
    feedback: Feedback,
    pointer: Point,
}

impl DragSession {
    pub fn payload(&self) -> Option<&DragPayload> {
        self.payload.as_ref()
    }

    pub fn target(&self) -> Option<DropTarget> {
        self.target
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }

    pub fn pointer(&self) -> Point {
        self.pointer
    }

    fn clear_target(&mut self) {
        self.target = None;
        self.feedback = Feedback::None;
    }
}

/// Observable phase of the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DragPhase {
    Idle,
    Armed,
    Dragging,
    Committing,
    Cancelling,
}

#[derive(Clone, Debug, PartialEq)]
enum Gesture {
    Idle,
    Armed { source: DragSource, origin: Point },
    Dragging(DragSession),
}

/// Severity of a transient notice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Warning,
}

/// Short-lived, non-blocking message for the user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }
}

/// How a gesture ended.
#[derive(Clone, Debug, PartialEq)]
pub enum DropOutcome {
    /// A new node was inserted.
    Inserted {
        id: NodeId,
        at: Position,
        /// The node is an image placeholder awaiting its file.
        pending_image: bool,
    },
    /// An existing node was relocated.
    Moved {
        id: NodeId,
        from: Position,
        to: Position,
    },
    /// An existing node stayed (or was put back) where it started.
    SnappedBack { id: NodeId, notice: Option<Notice> },
    /// A new item was dropped nowhere useful.
    Discarded { notice: Option<Notice> },
    /// No gesture was in progress.
    Ignored,
}

impl DropOutcome {
    /// Whether the tree changed.
    pub fn is_commit(&self) -> bool {
        match self {
            DropOutcome::Inserted { .. } => true,
            DropOutcome::Moved { from, to, .. } => from != to,
            _ => false,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            DropOutcome::SnappedBack { notice, .. } | DropOutcome::Discarded { notice } => {
                notice.as_ref()
            }
            _ => None,
        }
    }
}

const SNAP_BACK_MESSAGE: &str = "That element can't be placed there";

/// Drives one drag gesture at a time.
#[derive(Clone, Debug)]
pub struct DragController {
    gesture: Gesture,
    threshold: f64,
    enabled: bool,
}

impl DragController {
    pub fn new(threshold: f64) -> Self {
        Self {
            gesture: Gesture::Idle,
            threshold,
            enabled: true,
        }
    }

    pub fn phase(&self) -> DragPhase {
        match self.gesture {
            Gesture::Idle => DragPhase::Idle,
            Gesture::Armed { .. } => DragPhase::Armed,
            Gesture::Dragging(_) => DragPhase::Dragging,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.gesture, Gesture::Idle)
    }

    pub fn session(&self) -> Option<&DragSession> {
        match &self.gesture {
            Gesture::Dragging(session) => Some(session),
            _ => None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Gate new gestures. Does not end one already in flight; callers cancel
    /// first.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Pointer went down on a drag source. Returns whether the controller
    /// armed.
    ///
    /// A second pointer-down while a gesture is in flight is ignored and the
    /// first gesture carries on.
    pub fn pointer_down(&mut self, source: DragSource, at: Point) -> bool {
        if !self.enabled {
            tracing::trace!("drag disabled, pointer-down ignored");
            return false;
        }
        if !self.is_idle() {
            tracing::warn!(phase = ?self.phase(), "pointer-down during active gesture ignored");
            return false;
        }
        tracing::debug!(?source, "armed");
        self.gesture = Gesture::Armed { source, origin: at };
        true
    }

    /// Pointer released without a drag. Armed decays to Idle; returns true
    /// if that happened. A drag in flight is ended by `drop` or `cancel`.
    pub fn pointer_up(&mut self) -> bool {
        if matches!(self.gesture, Gesture::Armed { .. }) {
            tracing::debug!("click on drag source, disarmed");
            self.gesture = Gesture::Idle;
            return true;
        }
        false
    }

    /// The host's native drag protocol started a drag. Promotes Armed to
    /// Dragging regardless of travel.
    pub fn native_drag_start(&mut self, tree: &ContentTree) -> bool {
        let Gesture::Armed { origin, .. } = &self.gesture else {
            return false;
        };
        let origin = *origin;
        self.begin(tree, origin);
        true
    }

    /// Track the pointer. Returns the feedback to render.
    pub fn pointer_move(
        &mut self,
        at: Point,
        tree: &ContentTree,
        probe: &dyn LayoutProbe,
    ) -> Feedback {
        if let Gesture::Armed { origin, .. } = &self.gesture {
            if at.distance(*origin) < self.threshold {
                return Feedback::None;
            }
            self.begin(tree, at);
        }
        let Gesture::Dragging(session) = &mut self.gesture else {
            return Feedback::None;
        };
        hover(session, at, tree, probe);
        session.feedback.clone()
    }

    /// Pointer left the canvas. Feedback clears; the gesture continues.
    pub fn pointer_leave_canvas(&mut self) -> Feedback {
        if let Gesture::Dragging(session) = &mut self.gesture {
            tracing::trace!("pointer left canvas");
            session.clear_target();
        }
        Feedback::None
    }

    /// End the gesture with a drop.
    pub fn drop(&mut self, tree: &mut ContentTree, factory: &NodeFactory) -> DropOutcome {
        let session = match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Dragging(session) => session,
            Gesture::Armed { .. } => {
                tracing::debug!("drop before drag started, disarmed");
                return DropOutcome::Ignored;
            }
            Gesture::Idle => return DropOutcome::Ignored,
        };

        match (session.payload, session.target) {
            (Some(payload), Some(target)) => {
                trace_phase(DragPhase::Committing);
                commit(payload, target, tree, factory)
            }
            (payload, _) => {
                trace_phase(DragPhase::Cancelling);
                let notice = Some(Notice::warning(SNAP_BACK_MESSAGE));
                settle_cancelled(payload.as_ref(), tree, notice)
            }
        }
    }

    /// Abort the gesture (Escape, drop outside any canvas, mode switch).
    pub fn cancel(&mut self, tree: &mut ContentTree) -> DropOutcome {
        match std::mem::replace(&mut self.gesture, Gesture::Idle) {
            Gesture::Dragging(session) => {
                trace_phase(DragPhase::Cancelling);
                settle_cancelled(session.payload.as_ref(), tree, None)
            }
            Gesture::Armed { .. } => {
                tracing::debug!("armed gesture cancelled");
                DropOutcome::Ignored
            }
            Gesture::Idle => DropOutcome::Ignored,
        }
    }

    fn begin(&mut self, tree: &ContentTree, at: Point) {
        let Gesture::Armed { source, .. } = std::mem::replace(&mut self.gesture, Gesture::Idle)
        else {
            return;
        };
        let payload = classify(source, tree);
        match &payload {
            Some(p) => tracing::debug!(kind = %p.kind, provenance = ?p.provenance, "dragging"),
            None => tracing::warn!("drag source could not be classified"),
        }
        self.gesture = Gesture::Dragging(DragSession {
            payload,
            target: None,
            feedback: Feedback::None,
            pointer: at,
        });
    }
}

fn trace_phase(phase: DragPhase) {
    tracing::debug!(?phase, "drag phase");
}

/// Work out kind and provenance of a drag source.
pub fn classify(source: DragSource, tree: &ContentTree) -> Option<DragPayload> {
    match source {
        DragSource::Palette(entry) => entry.kind.is_draggable().then(|| DragPayload {
            kind: entry.kind,
            provenance: Provenance::New(NewItem::Template(Some(entry.template))),
        }),
        DragSource::Handle(id) => {
            let node = tree.get(id)?;
            if !node.kind.is_draggable() {
                return None;
            }
            let origin = tree.position_of(id)?;
            Some(DragPayload {
                kind: node.kind,
                provenance: Provenance::Existing { node: id, origin },
            })
        }
        DragSource::ImageFile { name } => Some(DragPayload {
            kind: NodeKind::Snippet,
            provenance: Provenance::New(NewItem::ImageFile(name)),
        }),
    }
}

/// Innermost legal container for `payload` at or above `hit`, skipping the
/// dragged node's own subtree.
pub fn find_target_container(
    tree: &ContentTree,
    hit: NodeId,
    payload: &DragPayload,
) -> Option<NodeId> {
    let dragged = payload.existing();
    let chain = tree.ancestors_inclusive(hit);
    let start = dragged
        .and_then(|d| chain.iter().position(|id| *id == d))
        .map_or(0, |i| i + 1);
    chain[start..].iter().copied().find(|id| {
        tree.get(*id)
            .is_some_and(|node| check_containment(node, payload.kind, dragged).is_ok())
    })
}

/// Measure a container and its direct children through the probe.
pub fn measure(
    tree: &ContentTree,
    container: NodeId,
    probe: &dyn LayoutProbe,
) -> Option<ContainerLayout> {
    let node = tree.get(container)?;
    let rect = probe.rect_of(container)?;
    let children = node
        .children
        .iter()
        .filter_map(|c| probe.rect_of(c.id).map(|rect| ChildBox { id: c.id, rect }))
        .collect();
    Some(ContainerLayout {
        id: container,
        rect,
        children,
    })
}

fn hover(session: &mut DragSession, at: Point, tree: &ContentTree, probe: &dyn LayoutProbe) {
    session.pointer = at;
    let Some(payload) = &session.payload else {
        session.clear_target();
        return;
    };
    let Some(hit) = probe.node_at(at) else {
        session.clear_target();
        return;
    };
    let layout = find_target_container(tree, hit, payload)
        .and_then(|container| measure(tree, container, probe));
    let Some(layout) = layout else {
        tracing::trace!(%hit, kind = %payload.kind, "no legal container under pointer");
        session.clear_target();
        return;
    };

    let exclude = payload.existing();
    let point = layout.resolve(at.y, exclude);
    tracing::trace!(container = %layout.id, ?point, "hover");
    session.target = Some(DropTarget {
        container: layout.id,
        point,
    });
    session.feedback = layout.feedback(point, exclude);
}

fn commit(
    payload: DragPayload,
    target: DropTarget,
    tree: &mut ContentTree,
    factory: &NodeFactory,
) -> DropOutcome {
    let index = target.point.index();
    match payload.provenance {
        Provenance::New(item) => {
            let (node, pending_image) = match &item {
                NewItem::Template(template) => {
                    (factory.create(payload.kind, template.as_ref()), false)
                }
                NewItem::ImageFile(name) => (factory.image_placeholder(name), true),
            };
            match tree.insert(node, target.container, index) {
                Ok(id) => {
                    let at = tree.position_of(id).unwrap_or(Position {
                        parent: target.container,
                        index,
                    });
                    tracing::debug!(%id, ?at, "drop inserted new node");
                    DropOutcome::Inserted {
                        id,
                        at,
                        pending_image,
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        container = %target.container,
                        "insert rejected on drop"
                    );
                    DropOutcome::Discarded {
                        notice: Some(Notice::warning(SNAP_BACK_MESSAGE)),
                    }
                }
            }
        }
        Provenance::Existing { node, origin } => {
            match tree.move_node(node, target.container, index) {
                Ok(to) => {
                    tracing::debug!(%node, from = ?origin, ?to, "drop moved node");
                    DropOutcome::Moved {
                        id: node,
                        from: origin,
                        to,
                    }
                }
                Err(e) if !tree.contains(node) => {
                    tracing::debug!(%node, error = %e, "dragged node vanished mid-gesture");
                    DropOutcome::Discarded { notice: None }
                }
                Err(e) => {
                    tracing::warn!(%node, error = %e, "move rejected on drop, snapping back");
                    restore_origin(tree, node, origin);
                    DropOutcome::SnappedBack {
                        id: node,
                        notice: Some(Notice::warning(SNAP_BACK_MESSAGE)),
                    }
                }
            }
        }
    }
}

fn settle_cancelled(
    payload: Option<&DragPayload>,
    tree: &mut ContentTree,
    notice: Option<Notice>,
) -> DropOutcome {
    match payload.map(|p| &p.provenance) {
        Some(Provenance::Existing { node, origin }) => {
            if !tree.contains(*node) {
                return DropOutcome::Discarded { notice: None };
            }
            restore_origin(tree, *node, *origin);
            tracing::debug!(%node, ?origin, "snapped back");
            DropOutcome::SnappedBack { id: *node, notice }
        }
        // Nothing was inserted for a new item; dropping it nowhere is silent.
        _ => DropOutcome::Discarded { notice: None },
    }
}

fn restore_origin(tree: &mut ContentTree, node: NodeId, origin: Position) {
    if tree.position_of(node) == Some(origin) {
        return;
    }
    if let Err(e) = tree.move_node(node, origin.parent, origin.index) {
        tracing::warn!(%node, ?origin, error = %e, "could not restore original position");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::node::{Node, SnippetContent, SnippetKind};
    use crate::platform::RectLayout;

    fn text(markup: &str) -> Node {
        Node::snippet(SnippetContent::new(SnippetKind::Text, markup))
    }

    fn palette_snippet() -> DragSource {
        DragSource::Palette(PaletteEntry {
            id: "text".into(),
            name: "Text".into(),
            kind: NodeKind::Snippet,
            template: Template::Markup("<p>New</p>".into()),
            preview: Default::default(),
        })
    }

    /// Root with one empty block at 0..100 and one block with two snippets
    /// at 100..200.
    fn page() -> (ContentTree, RectLayout, NodeId, NodeId, Vec<NodeId>) {
        let mut tree = ContentTree::new();
        let root = tree.root_id();
        let empty = tree.insert(Node::new(NodeKind::Block), root, 0).unwrap();
        let full = tree
            .insert(
                Node::new(NodeKind::Block)
                    .with_child(text("<p>a</p>"))
                    .with_child(text("<p>b</p>")),
                root,
                1,
            )
            .unwrap();
        let snippets: Vec<NodeId> = tree.get(full).unwrap().children.iter().map(|c| c.id).collect();
        let layout = RectLayout::new()
            .with(root, Rect::new(0.0, 0.0, 400.0, 300.0))
            .with(empty, Rect::new(0.0, 0.0, 400.0, 100.0))
            .with(full, Rect::new(0.0, 100.0, 400.0, 100.0))
            .with(snippets[0], Rect::new(0.0, 100.0, 400.0, 50.0))
            .with(snippets[1], Rect::new(0.0, 150.0, 400.0, 50.0));
        (tree, layout, empty, full, snippets)
    }

    #[test]
    fn test_click_does_not_start_drag() {
        let (tree, layout, _, _, snippets) = page();
        let mut drag = DragController::new(4.0);
        assert!(drag.pointer_down(DragSource::Handle(snippets[0]), Point::new(10.0, 110.0)));
        assert_eq!(drag.phase(), DragPhase::Armed);
        // jitter below threshold
        let feedback = drag.pointer_move(Point::new(11.0, 111.0), &tree, &layout);
        assert!(feedback.is_none());
        assert_eq!(drag.phase(), DragPhase::Armed);
        assert!(drag.pointer_up());
        assert_eq!(drag.phase(), DragPhase::Idle);
    }

    #[test]
    fn test_second_pointer_down_is_ignored() {
        let (_, _, _, _, snippets) = page();
        let mut drag = DragController::new(4.0);
        assert!(drag.pointer_down(DragSource::Handle(snippets[0]), Point::default()));
        assert!(!drag.pointer_down(palette_snippet(), Point::default()));
        assert_eq!(drag.phase(), DragPhase::Armed);
    }

    #[test]
    fn test_disabled_controller_does_not_arm() {
        let mut drag = DragController::new(4.0);
        drag.set_enabled(false);
        assert!(!drag.pointer_down(palette_snippet(), Point::default()));
        assert!(drag.is_idle());
    }

    #[test]
    fn test_palette_drop_into_empty_block() {
        let (mut tree, layout, empty, _, _) = page();
        let mut drag = DragController::new(4.0);
        drag.pointer_down(palette_snippet(), Point::new(500.0, 0.0));
        let feedback = drag.pointer_move(Point::new(50.0, 50.0), &tree, &layout);
        assert!(matches!(feedback, Feedback::Overlay { container, .. } if container == empty));

        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        let DropOutcome::Inserted { id, at, pending_image } = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        assert!(!pending_image);
        assert_eq!(at, Position { parent: empty, index: 0 });
        assert_eq!(tree.get(empty).unwrap().children.len(), 1);
        assert_eq!(tree.get(empty).unwrap().children[0].id, id);
        assert!(drag.is_idle());
    }

    #[test]
    fn test_innermost_container_wins() {
        let (tree, layout, _, full, _) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(palette_snippet(), Point::default());
        // over the second snippet's lower half: snippet cannot contain a
        // snippet, its block can
        let feedback = drag.pointer_move(Point::new(10.0, 190.0), &tree, &layout);
        assert_eq!(feedback.container(), Some(full));
        let target = drag.session().unwrap().target().unwrap();
        assert_eq!(target.point, InsertionPoint::Append { index: 2 });
    }

    /// Root holding a two-column block at 0..200 (a snippet in the left
    /// column, the right column empty) and a loose block at 200..300.
    fn columned_page() -> (ContentTree, RectLayout, [NodeId; 4]) {
        let mut tree = ContentTree::new();
        let root = tree.root_id();
        let columned = tree
            .insert(
                Node::new(NodeKind::Block)
                    .with_child(Node::new(NodeKind::Column).with_child(text("<p>a</p>")))
                    .with_child(Node::new(NodeKind::Column)),
                root,
                0,
            )
            .unwrap();
        let loose = tree
            .insert(Node::new(NodeKind::Block).with_child(text("<p>b</p>")), root, 1)
            .unwrap();
        let columns: Vec<NodeId> = tree
            .get(columned)
            .unwrap()
            .children
            .iter()
            .map(|c| c.id)
            .collect();
        let left_snippet = tree.get(columns[0]).unwrap().children[0].id;
        let layout = RectLayout::new()
            .with(root, Rect::new(0.0, 0.0, 400.0, 400.0))
            .with(columned, Rect::new(0.0, 0.0, 400.0, 200.0))
            .with(columns[0], Rect::new(0.0, 0.0, 200.0, 200.0))
            .with(columns[1], Rect::new(200.0, 0.0, 200.0, 200.0))
            .with(left_snippet, Rect::new(0.0, 0.0, 200.0, 50.0))
            .with(loose, Rect::new(0.0, 200.0, 400.0, 100.0));
        (tree, layout, [columned, columns[0], columns[1], loose])
    }

    #[test]
    fn test_snippet_over_nested_column_targets_the_column() {
        let (tree, layout, [columned, left, right, _]) = columned_page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(palette_snippet(), Point::default());

        // over the left column's snippet: the snippet cannot hold it, the
        // column can, and the columned block is never reached
        let feedback = drag.pointer_move(Point::new(50.0, 40.0), &tree, &layout);
        assert_eq!(feedback.container(), Some(left));
        let target = drag.session().unwrap().target().unwrap();
        assert_eq!(target.point, InsertionPoint::Append { index: 1 });

        // over the empty right column
        let feedback = drag.pointer_move(Point::new(300.0, 100.0), &tree, &layout);
        assert!(matches!(feedback, Feedback::Overlay { container, .. } if container == right));
        assert_ne!(feedback.container(), Some(columned));
    }

    #[test]
    fn test_block_over_nested_column_lands_in_the_column() {
        let (mut tree, layout, [columned, _, right, loose]) = columned_page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(loose), Point::new(10.0, 250.0));
        let feedback = drag.pointer_move(Point::new(300.0, 100.0), &tree, &layout);
        assert_eq!(feedback.container(), Some(right));

        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        assert_eq!(
            outcome,
            DropOutcome::Moved {
                id: loose,
                from: Position { parent: tree.root_id(), index: 1 },
                to: Position { parent: right, index: 0 },
            }
        );
        assert_eq!(tree.position_of(loose), Some(Position { parent: right, index: 0 }));
        assert_eq!(tree.position_of(columned).unwrap().parent, tree.root_id());
        assert_eq!(tree.get(tree.root_id()).unwrap().children.len(), 1);
    }

    #[test]
    fn test_drop_on_bare_root_snaps_back() {
        let (mut tree, layout, _, full, snippets) = page();
        let before = tree.serialize().unwrap();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(snippets[1]), Point::default());
        // below every block: only the root is under the pointer
        let feedback = drag.pointer_move(Point::new(10.0, 250.0), &tree, &layout);
        assert!(feedback.is_none());
        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        assert!(matches!(outcome, DropOutcome::SnappedBack { id, .. } if id == snippets[1]));
        assert!(outcome.notice().is_some());
        assert_eq!(tree.position_of(snippets[1]), Some(Position { parent: full, index: 1 }));
        assert_eq!(tree.serialize().unwrap(), before);
    }

    #[test]
    fn test_move_existing_snippet_between_blocks() {
        let (mut tree, layout, empty, full, snippets) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(snippets[0]), Point::default());
        drag.pointer_move(Point::new(10.0, 20.0), &tree, &layout);
        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        assert_eq!(
            outcome,
            DropOutcome::Moved {
                id: snippets[0],
                from: Position { parent: full, index: 0 },
                to: Position { parent: empty, index: 0 },
            }
        );
        assert!(outcome.is_commit());
    }

    #[test]
    fn test_dragged_block_cannot_target_itself() {
        let (tree, layout, _, full, _) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(full), Point::default());
        // pointer over one of the dragged block's own snippets: skip the
        // dragged subtree and land on the root
        drag.pointer_move(Point::new(10.0, 120.0), &tree, &layout);
        let target = drag.session().unwrap().target().unwrap();
        assert_eq!(target.container, tree.root_id());
    }

    #[test]
    fn test_leaving_canvas_clears_feedback_but_keeps_gesture() {
        let (tree, layout, _, _, _) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(palette_snippet(), Point::default());
        assert!(!drag.pointer_move(Point::new(50.0, 50.0), &tree, &layout).is_none());
        assert!(drag.pointer_leave_canvas().is_none());
        assert_eq!(drag.phase(), DragPhase::Dragging);
        assert!(drag.session().unwrap().target().is_none());

        let outside = drag.pointer_move(Point::new(900.0, 900.0), &tree, &layout);
        assert!(outside.is_none());
    }

    #[test]
    fn test_new_item_without_target_is_discarded_quietly() {
        let (mut tree, _, _, _, _) = page();
        let before = tree.len();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(palette_snippet(), Point::default());
        assert!(drag.native_drag_start(&tree));
        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        assert_eq!(outcome, DropOutcome::Discarded { notice: None });
        assert_eq!(tree.len(), before);
    }

    #[test]
    fn test_unclassifiable_source_never_targets() {
        let (mut tree, layout, _, _, _) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(NodeId(999)), Point::default());
        assert!(drag.pointer_move(Point::new(50.0, 50.0), &tree, &layout).is_none());
        assert!(drag.session().unwrap().payload().is_none());
        assert_eq!(
            drag.drop(&mut tree, &NodeFactory::default()),
            DropOutcome::Discarded { notice: None }
        );
    }

    #[test]
    fn test_image_file_drop_inserts_placeholder() {
        let (mut tree, layout, empty, _, _) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(
            DragSource::ImageFile {
                name: "cat.png".into(),
            },
            Point::default(),
        );
        drag.pointer_move(Point::new(50.0, 50.0), &tree, &layout);
        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        let DropOutcome::Inserted { id, pending_image, .. } = outcome else {
            panic!("expected insert, got {outcome:?}");
        };
        assert!(pending_image);
        assert_eq!(tree.parent_of(id), Some(empty));
        assert_eq!(tree.get(id).unwrap().snippet_kind(), Some(SnippetKind::Image));
    }

    #[test]
    fn test_cancel_restores_existing_node() {
        let (mut tree, layout, _, full, snippets) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(snippets[1]), Point::default());
        drag.pointer_move(Point::new(10.0, 20.0), &tree, &layout);
        let outcome = drag.cancel(&mut tree);
        assert_eq!(
            outcome,
            DropOutcome::SnappedBack {
                id: snippets[1],
                notice: None
            }
        );
        assert_eq!(tree.parent_of(snippets[1]), Some(full));
        assert!(drag.is_idle());
    }

    #[test]
    fn test_node_deleted_mid_gesture_is_noop() {
        let (mut tree, layout, _, _, snippets) = page();
        let mut drag = DragController::new(0.0);
        drag.pointer_down(DragSource::Handle(snippets[0]), Point::default());
        drag.pointer_move(Point::new(10.0, 20.0), &tree, &layout);
        tree.remove(snippets[0]).unwrap();
        let outcome = drag.drop(&mut tree, &NodeFactory::default());
        assert_eq!(outcome, DropOutcome::Discarded { notice: None });
    }
}
