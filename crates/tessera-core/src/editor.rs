//! The page editor: one owner for the tree and the components around it.
//!
//! Dependencies run one way. Components never hold a reference back to the
//! editor; collaborators such as style panels and image pipelines get a
//! narrow capability trait ([`ContentEditing`], [`StructureEditing`]) instead
//! of the whole editor.

use std::rc::Rc;

use web_time::Instant;

use crate::columns::set_column_count;
use crate::config::EditorConfig;
use crate::drag::{DragController, DragPhase, DragSession, DragSource, DropOutcome, Notice};
use crate::error::TreeError;
use crate::factory::{NodeFactory, Template};
use crate::geometry::{Feedback, Point};
use crate::history::HistoryTracker;
use crate::mode::{ClickAction, EditorMode, ModeChange, ModeController};
use crate::node::{Affordance, Content, Node, NodeId, NodeKind, SnippetKind, StyleProperty, Styles};
use crate::notify::{SubscriptionId, TreeChange};
use crate::palette::{PaletteCatalog, PaletteEntry};
use crate::platform::{Clock, ConfirmPrompt, LayoutProbe, SystemClock};
use crate::projection::{RenderOptions, render_html};
use crate::sanitize::is_script_url;
use crate::tree::{ContentTree, Position, Snapshot};

/// Capability handed to style, code and settings editors.
pub trait ContentEditing {
    fn node(&self, id: NodeId) -> Option<&Node>;

    fn set_style(&mut self, id: NodeId, prop: StyleProperty, value: &str) -> Result<(), TreeError>;

    fn set_styles(&mut self, id: NodeId, styles: Styles) -> Result<(), TreeError>;

    /// Replace a node's payload. Snippet markup is sanitized.
    fn set_content(&mut self, id: NodeId, content: Content) -> Result<(), TreeError>;
}

/// Capability handed to panels that add, move or remove elements.
pub trait StructureEditing {
    fn insert_new(
        &mut self,
        kind: NodeKind,
        template: Option<&Template>,
        into: NodeId,
        at: usize,
    ) -> Result<NodeId, TreeError>;

    fn move_node(&mut self, id: NodeId, into: NodeId, at: usize) -> Result<Position, TreeError>;

    /// Delete after confirmation. `Ok(false)` if declined or already gone.
    fn delete(&mut self, id: NodeId, prompt: &dyn ConfirmPrompt) -> Result<bool, TreeError>;

    fn duplicate(&mut self, id: NodeId) -> Result<NodeId, TreeError>;
}

/// Owns the content tree and drives every component around it.
pub struct PageEditor {
    config: EditorConfig,
    tree: ContentTree,
    history: HistoryTracker,
    mode: ModeController,
    drag: DragController,
    factory: NodeFactory,
    palette: Box<dyn PaletteCatalog>,
    clock: Rc<dyn Clock>,
    notice: Option<(Notice, Instant)>,
}

impl std::fmt::Debug for PageEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageEditor")
            .field("mode", &self.mode.mode())
            .field("nodes", &self.tree.len())
            .field("history", &self.history)
            .field("drag", &self.drag.phase())
            .finish()
    }
}

impl PageEditor {
    pub fn new(config: EditorConfig, palette: Box<dyn PaletteCatalog>) -> Result<Self, TreeError> {
        Self::with_clock(config, palette, Rc::new(SystemClock))
    }

    /// Create an editor with an empty page and an explicit clock.
    pub fn with_clock(
        config: EditorConfig,
        palette: Box<dyn PaletteCatalog>,
        clock: Rc<dyn Clock>,
    ) -> Result<Self, TreeError> {
        let config = config.validated()?;
        let mut tree = ContentTree::new();
        let history = HistoryTracker::new(
            &mut tree,
            config.history_capacity,
            config.debounce(),
            Rc::clone(&clock),
        )?;
        Ok(Self {
            factory: NodeFactory::new(&config),
            drag: DragController::new(config.drag_threshold_px),
            mode: ModeController::default(),
            tree,
            history,
            palette,
            clock,
            notice: None,
            config,
        })
    }

    // === Accessors ===

    pub fn tree(&self) -> &ContentTree {
        &self.tree
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryTracker {
        &self.history
    }

    pub fn mode(&self) -> EditorMode {
        self.mode.mode()
    }

    pub fn factory(&self) -> &NodeFactory {
        &self.factory
    }

    pub fn drag_phase(&self) -> DragPhase {
        self.drag.phase()
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.session()
    }

    pub fn palette_entries(&self, kind: NodeKind) -> Vec<PaletteEntry> {
        self.palette.list_available(kind)
    }

    // === Subscriptions ===

    pub fn on_structural_change(
        &mut self,
        callback: impl FnMut(&TreeChange) + 'static,
    ) -> SubscriptionId {
        self.tree.on_structural_change(callback)
    }

    pub fn on_mode_change(
        &mut self,
        callback: impl FnMut(&ModeChange) + 'static,
    ) -> SubscriptionId {
        self.mode.on_mode_change(callback)
    }

    // === Persistence ===

    pub fn snapshot(&self) -> Result<Snapshot, TreeError> {
        self.tree.serialize()
    }

    /// Replace the page with a saved snapshot and start a fresh history.
    pub fn load(&mut self, snapshot: &Snapshot) -> Result<(), TreeError> {
        self.cancel_drag();
        self.tree.restore(snapshot)?;
        self.history.clear_history(&self.tree)
    }

    // === Mode ===

    /// Switch mode. Leaving edit mode cancels any gesture in flight.
    pub fn set_mode(&mut self, mode: EditorMode) -> bool {
        if mode == EditorMode::Display && !self.drag.is_idle() {
            self.cancel_drag();
        }
        let changed = self.mode.set_mode(mode);
        self.drag.set_enabled(self.mode.allows_drag());
        changed
    }

    pub fn toggle_mode(&mut self) -> EditorMode {
        self.set_mode(self.mode.mode().toggled());
        self.mode.mode()
    }

    /// Route a click on a node or one of its controls.
    pub fn click(&self, id: NodeId, affordance: Option<Affordance>) -> ClickAction {
        match self.tree.get(id) {
            Some(node) => self.mode.click(node, affordance),
            None => ClickAction::Nothing,
        }
    }

    pub fn is_content_editable(&self, id: NodeId) -> bool {
        self.tree
            .get(id)
            .is_some_and(|node| self.mode.is_content_editable(node))
    }

    // === Drag ===

    pub fn pointer_down(&mut self, source: DragSource, at: Point) -> bool {
        self.drag.pointer_down(source, at)
    }

    /// Arm a drag for a palette entry by id.
    pub fn start_palette_drag(&mut self, entry_id: &str, at: Point) -> bool {
        match self.palette.find(entry_id) {
            Some(entry) => self.drag.pointer_down(DragSource::Palette(entry), at),
            None => {
                tracing::warn!(entry_id, "unknown palette entry");
                false
            }
        }
    }

    pub fn pointer_move(&mut self, at: Point, probe: &dyn LayoutProbe) -> Feedback {
        self.drag.pointer_move(at, &self.tree, probe)
    }

    pub fn pointer_up(&mut self) -> bool {
        self.drag.pointer_up()
    }

    pub fn native_drag_start(&mut self) -> bool {
        self.drag.native_drag_start(&self.tree)
    }

    pub fn pointer_leave_canvas(&mut self) -> Feedback {
        self.drag.pointer_leave_canvas()
    }

    pub fn drop(&mut self) -> DropOutcome {
        self.flush_history();
        let outcome = self.drag.drop(&mut self.tree, &self.factory);
        self.after_gesture(&outcome);
        outcome
    }

    pub fn cancel_drag(&mut self) -> DropOutcome {
        let outcome = self.drag.cancel(&mut self.tree);
        self.after_gesture(&outcome);
        outcome
    }

    fn after_gesture(&mut self, outcome: &DropOutcome) {
        if outcome.is_commit() {
            self.flush_history();
        }
        if let Some(notice) = outcome.notice() {
            self.post_notice(notice.clone());
        }
    }

    // === Structure ===

    /// Change a block's column count. See [`crate::columns`].
    pub fn set_columns(&mut self, block: NodeId, count: usize) -> Result<(), TreeError> {
        self.flush_history();
        set_column_count(&mut self.tree, block, count)?;
        self.flush_history();
        Ok(())
    }

    /// Patch a pending image placeholder once its file is available.
    pub fn fill_image(&mut self, id: NodeId, src: &str) -> Result<(), TreeError> {
        let node = self.tree.get(id).ok_or(TreeError::StaleReference(id))?;
        let Some(current) = node.content.as_snippet() else {
            return Err(TreeError::PayloadMismatch(node.kind));
        };
        if current.kind != SnippetKind::Image {
            return Err(TreeError::PayloadMismatch(node.kind));
        }
        if is_script_url(src) {
            return Err(TreeError::MalformedTemplate(
                "image source is a script url".into(),
            ));
        }
        let mut content = current.clone();
        let alt = content.attr("alt").unwrap_or_default().to_owned();
        content.attrs.shift_remove("pending");
        content.attrs.insert("src".into(), src.to_owned());
        content.markup = format!(
            r#"<img src="{}" alt="{}">"#,
            v_htmlescape::escape(src),
            v_htmlescape::escape(&alt)
        );
        self.flush_history();
        self.tree.set_content(id, Content::Snippet(content))?;
        self.flush_history();
        Ok(())
    }

    // === History ===

    pub fn undo(&mut self) -> Result<bool, TreeError> {
        self.cancel_drag();
        self.history.undo(&mut self.tree)
    }

    pub fn redo(&mut self) -> Result<bool, TreeError> {
        self.cancel_drag();
        self.history.redo(&mut self.tree)
    }

    /// Timer hook: record debounced changes that have gone quiet.
    pub fn tick(&mut self) -> Result<bool, TreeError> {
        if self
            .notice
            .as_ref()
            .is_some_and(|(_, posted)| self.clock.now() >= *posted + self.config.notice_ttl())
        {
            self.notice = None;
        }
        self.history.poll(&self.tree)
    }

    /// When [`PageEditor::tick`] next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        let notice = self
            .notice
            .as_ref()
            .map(|(_, posted)| *posted + self.config.notice_ttl());
        match (self.history.next_deadline(), notice) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Structural actions call this both before and after they mutate, so a
    /// pending edit keeps its own entry.
    fn flush_history(&mut self) {
        if let Err(e) = self.history.flush(&self.tree) {
            tracing::warn!(error = %e, "failed to record history entry");
        }
    }

    // === Notices ===

    /// The transient notice currently showing, if it has not expired.
    pub fn notice(&self) -> Option<&Notice> {
        let (notice, posted) = self.notice.as_ref()?;
        (self.clock.now() < *posted + self.config.notice_ttl()).then_some(notice)
    }

    pub fn post_notice(&mut self, notice: Notice) {
        tracing::debug!(message = %notice.message, "notice");
        self.notice = Some((notice, self.clock.now()));
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    // === Rendering ===

    /// Markup for the live canvas in the current mode.
    pub fn render(&self) -> String {
        render_html(&self.tree, RenderOptions::for_mode(self.mode.mode()))
    }

    /// Publishable markup with no editor controls or ids.
    pub fn export_html(&self) -> String {
        render_html(&self.tree, RenderOptions::export())
    }
}

impl ContentEditing for PageEditor {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    fn set_style(&mut self, id: NodeId, prop: StyleProperty, value: &str) -> Result<(), TreeError> {
        self.tree.set_style(id, prop, value)
    }

    fn set_styles(&mut self, id: NodeId, styles: Styles) -> Result<(), TreeError> {
        self.tree.set_styles(id, styles)
    }

    fn set_content(&mut self, id: NodeId, content: Content) -> Result<(), TreeError> {
        self.tree.set_content(id, content)
    }
}

impl StructureEditing for PageEditor {
    fn insert_new(
        &mut self,
        kind: NodeKind,
        template: Option<&Template>,
        into: NodeId,
        at: usize,
    ) -> Result<NodeId, TreeError> {
        let node = self.factory.create(kind, template);
        self.flush_history();
        let id = self.tree.insert(node, into, at)?;
        self.flush_history();
        Ok(id)
    }

    fn move_node(&mut self, id: NodeId, into: NodeId, at: usize) -> Result<Position, TreeError> {
        self.flush_history();
        let to = self.tree.move_node(id, into, at)?;
        self.flush_history();
        Ok(to)
    }

    fn delete(&mut self, id: NodeId, prompt: &dyn ConfirmPrompt) -> Result<bool, TreeError> {
        if id == self.tree.root_id() {
            return Err(TreeError::RootImmutable);
        }
        let Some(node) = self.tree.get(id) else {
            tracing::debug!(%id, "delete of stale node ignored");
            return Ok(false);
        };
        if self.config.confirm_delete {
            let message = format!("Delete this {} and everything inside it?", node.kind);
            if !prompt.confirm(&message) {
                tracing::debug!(%id, "delete declined");
                return Ok(false);
            }
        }
        self.flush_history();
        let removed = self.tree.remove(id)?;
        self.flush_history();
        Ok(removed.is_some())
    }

    fn duplicate(&mut self, id: NodeId) -> Result<NodeId, TreeError> {
        self.flush_history();
        let copy = self.tree.duplicate(id)?;
        self.flush_history();
        Ok(copy)
    }
}
