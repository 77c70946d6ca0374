//! Edit/Display mode and click routing.
//!
//! Mode only decides which affordances are live. Switching never touches
//! the tree.

use serde::{Deserialize, Serialize};

use crate::node::{Affordance, Node, NodeId, NodeKind, SnippetKind};
use crate::notify::{Listeners, SubscriptionId};
use crate::sanitize::is_script_url;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditorMode {
    #[default]
    Edit,
    Display,
}

impl EditorMode {
    pub fn toggled(self) -> Self {
        match self {
            EditorMode::Edit => EditorMode::Display,
            EditorMode::Display => EditorMode::Edit,
        }
    }
}

/// Fired when the mode flips.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModeChange {
    pub from: EditorMode,
    pub to: EditorMode,
}

/// Which settings editor a click opens.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsPanel {
    Page,
    Style,
    Column,
    Code,
    Button,
    Image,
    Video,
}

impl SettingsPanel {
    /// Panel for a node's settings affordance.
    pub fn for_node(node: &Node) -> Self {
        match node.kind {
            NodeKind::Root => SettingsPanel::Page,
            NodeKind::Section | NodeKind::Block => SettingsPanel::Style,
            NodeKind::Column => SettingsPanel::Column,
            NodeKind::Snippet => match node.snippet_kind() {
                Some(SnippetKind::Button) => SettingsPanel::Button,
                Some(SnippetKind::Image) => SettingsPanel::Image,
                Some(SnippetKind::Video) => SettingsPanel::Video,
                _ => SettingsPanel::Style,
            },
        }
    }
}

/// What a click should do, decided from the mode, the node and which
/// affordance (if any) was hit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClickAction {
    OpenSettings { id: NodeId, panel: SettingsPanel },
    /// Put the node's text region into inline editing.
    EditInline { id: NodeId },
    /// Follow the node's configured link.
    Navigate { url: String },
    Duplicate { id: NodeId },
    /// Delete after confirmation.
    RequestDelete { id: NodeId },
    Nothing,
}

/// Owns the current mode and notifies listeners when it changes.
#[derive(Debug, Default)]
pub struct ModeController {
    mode: EditorMode,
    listeners: Listeners<ModeChange>,
}

impl ModeController {
    pub fn new(mode: EditorMode) -> Self {
        Self {
            mode,
            listeners: Listeners::default(),
        }
    }

    pub fn mode(&self) -> EditorMode {
        self.mode
    }

    pub fn is_edit(&self) -> bool {
        self.mode == EditorMode::Edit
    }

    /// Switch mode. Returns false (and notifies nobody) if unchanged.
    pub fn set_mode(&mut self, mode: EditorMode) -> bool {
        if mode == self.mode {
            return false;
        }
        let change = ModeChange {
            from: self.mode,
            to: mode,
        };
        self.mode = mode;
        tracing::debug!(from = ?change.from, to = ?change.to, "mode changed");
        self.listeners.emit(&change);
        true
    }

    pub fn toggle(&mut self) -> EditorMode {
        self.set_mode(self.mode.toggled());
        self.mode
    }

    pub fn on_mode_change(
        &mut self,
        callback: impl FnMut(&ModeChange) + 'static,
    ) -> SubscriptionId {
        self.listeners.subscribe(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn allows_drag(&self) -> bool {
        self.is_edit()
    }

    /// Whether a node's own text region accepts direct typing.
    pub fn is_content_editable(&self, node: &Node) -> bool {
        self.is_edit() && node.snippet_kind().is_some_and(SnippetKind::is_inline_editable)
    }

    /// Control affordances to render around a node.
    pub fn affordances(&self, kind: NodeKind) -> &'static [Affordance] {
        match self.mode {
            EditorMode::Edit => Affordance::for_kind(kind),
            EditorMode::Display => &[],
        }
    }

    /// Route a click on `node`. `affordance` is the control that was hit,
    /// or `None` for the node's content.
    pub fn click(&self, node: &Node, affordance: Option<Affordance>) -> ClickAction {
        let id = node.id;
        match (self.mode, affordance) {
            (EditorMode::Display, _) => match link_target(node) {
                Some(url) => ClickAction::Navigate { url },
                None => ClickAction::Nothing,
            },
            (EditorMode::Edit, Some(Affordance::Settings)) => ClickAction::OpenSettings {
                id,
                panel: SettingsPanel::for_node(node),
            },
            (EditorMode::Edit, Some(Affordance::Edit)) => ClickAction::OpenSettings {
                id,
                panel: SettingsPanel::Code,
            },
            (EditorMode::Edit, Some(Affordance::Duplicate)) => ClickAction::Duplicate { id },
            (EditorMode::Edit, Some(Affordance::Delete)) => ClickAction::RequestDelete { id },
            (EditorMode::Edit, Some(Affordance::DragHandle)) => ClickAction::Nothing,
            (EditorMode::Edit, None) => match node.snippet_kind() {
                Some(SnippetKind::Text) => ClickAction::EditInline { id },
                Some(SnippetKind::Button | SnippetKind::Image | SnippetKind::Video) => {
                    ClickAction::OpenSettings {
                        id,
                        panel: SettingsPanel::for_node(node),
                    }
                }
                _ => ClickAction::Nothing,
            },
        }
    }
}

fn link_target(node: &Node) -> Option<String> {
    if node.snippet_kind() != Some(SnippetKind::Button) {
        return None;
    }
    let href = node.content.as_snippet()?.href()?.trim();
    if is_script_url(href) {
        tracing::warn!(id = %node.id, "refusing to follow a script url");
        return None;
    }
    (!href.is_empty() && href != "#").then(|| href.to_owned())
}
