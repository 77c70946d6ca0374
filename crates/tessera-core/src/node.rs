//! Content tree node types and the containment grammar.
//!
//! A page is a rooted, ordered tree:
//!
//! - `Root` holds `Section`s and `Block`s
//! - `Section` holds `Block`s
//! - `Block` holds either `Column`s or `Snippet`s (never a mix of the two)
//! - `Column` holds `Snippet`s and nested `Block`s
//! - `Snippet` is a leaf
//!
//! The grammar lives here and only here; [`ContentTree`](crate::ContentTree)
//! consults it on every structural mutation.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::TreeError;

/// Identifier of a node, unique within one tree instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Placeholder id carried by detached nodes until the tree adopts them.
    pub const PENDING: NodeId = NodeId(0);

    pub fn is_pending(self) -> bool {
        self == Self::PENDING
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    /// Parses the `n{number}` form used in `data-node-id` attributes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.strip_prefix('n').unwrap_or(s).parse().map(NodeId)
    }
}

/// The closed set of node kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Root,
    Section,
    Block,
    Column,
    Snippet,
}

impl NodeKind {
    /// Kind-level containment rule, ignoring the current children of the
    /// parent. See [`check_containment`] for the full check.
    pub fn can_contain(self, child: NodeKind) -> bool {
        use NodeKind::*;
        matches!(
            (self, child),
            (Root, Section)
                | (Root, Block)
                | (Section, Block)
                | (Block, Snippet)
                | (Block, Column)
                | (Column, Snippet)
                | (Column, Block)
        )
    }

    /// Whether nodes of this kind can be picked up and dragged.
    pub fn is_draggable(self) -> bool {
        matches!(self, NodeKind::Section | NodeKind::Block | NodeKind::Snippet)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Root => "root",
            NodeKind::Section => "section",
            NodeKind::Block => "block",
            NodeKind::Column => "column",
            NodeKind::Snippet => "snippet",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Subtype of a snippet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnippetKind {
    #[default]
    Text,
    Image,
    Video,
    Button,
    Custom,
}

impl SnippetKind {
    /// Text snippets are edited directly in the canvas.
    pub fn is_inline_editable(self) -> bool {
        matches!(self, SnippetKind::Text)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SnippetKind::Text => "text",
            SnippetKind::Image => "image",
            SnippetKind::Video => "video",
            SnippetKind::Button => "button",
            SnippetKind::Custom => "custom",
        }
    }
}

/// Style properties an editor may set on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleProperty {
    Padding,
    Margin,
    Border,
    Background,
    Width,
    Height,
    Display,
    Visibility,
    Transition,
}

impl StyleProperty {
    pub const ALL: [StyleProperty; 9] = [
        StyleProperty::Padding,
        StyleProperty::Margin,
        StyleProperty::Border,
        StyleProperty::Background,
        StyleProperty::Width,
        StyleProperty::Height,
        StyleProperty::Display,
        StyleProperty::Visibility,
        StyleProperty::Transition,
    ];

    pub fn css_name(self) -> &'static str {
        match self {
            StyleProperty::Padding => "padding",
            StyleProperty::Margin => "margin",
            StyleProperty::Border => "border",
            StyleProperty::Background => "background",
            StyleProperty::Width => "width",
            StyleProperty::Height => "height",
            StyleProperty::Display => "display",
            StyleProperty::Visibility => "visibility",
            StyleProperty::Transition => "transition",
        }
    }

    pub fn from_css_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.css_name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Style mapping of a node. Keys are unique, order carries no meaning.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Styles(IndexMap<StyleProperty, SmolStr>);

impl Styles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, prop: StyleProperty) -> Option<&str> {
        self.0.get(&prop).map(SmolStr::as_str)
    }

    /// Set a property. An empty value removes it.
    pub fn set(&mut self, prop: StyleProperty, value: impl Into<SmolStr>) {
        let value = value.into();
        if value.trim().is_empty() {
            self.0.shift_remove(&prop);
        } else {
            self.0.insert(prop, value);
        }
    }

    pub fn remove(&mut self, prop: StyleProperty) -> Option<SmolStr> {
        self.0.shift_remove(&prop)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (StyleProperty, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Render as an inline `style` attribute value.
    pub fn to_css(&self) -> String {
        self.iter()
            .map(|(k, v)| format!("{}: {};", k.css_name(), v))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Payload of a snippet node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetContent {
    pub kind: SnippetKind,
    /// Sanitized markup for the snippet body.
    #[serde(default)]
    pub markup: String,
    /// Settings owned by the subtype editors (`href`, `src`, `alt`, ...).
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<SmolStr, String>,
}

impl SnippetContent {
    pub fn new(kind: SnippetKind, markup: impl Into<String>) -> Self {
        Self {
            kind,
            markup: markup.into(),
            attrs: IndexMap::new(),
        }
    }

    pub fn with_attr(mut self, key: &str, value: impl Into<String>) -> Self {
        self.attrs.insert(SmolStr::new(key), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    /// Navigation target of a button snippet.
    pub fn href(&self) -> Option<&str> {
        self.attr("href").filter(|h| !h.trim().is_empty())
    }
}

/// Payload of a section or block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerContent {
    /// In-page anchor name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<SmolStr>,
    /// Extra class names applied on export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<SmolStr>,
}

/// Kind-dependent node payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Content {
    #[default]
    None,
    Container(ContainerContent),
    Snippet(SnippetContent),
}

impl Content {
    /// Default payload for a kind.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Section | NodeKind::Block => Content::Container(ContainerContent::default()),
            NodeKind::Snippet => Content::Snippet(SnippetContent::default()),
            NodeKind::Root | NodeKind::Column => Content::None,
        }
    }

    pub fn as_snippet(&self) -> Option<&SnippetContent> {
        match self {
            Content::Snippet(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this payload is the right shape for `kind`.
    pub fn fits(&self, kind: NodeKind) -> bool {
        matches!(
            (self, kind),
            (Content::None, NodeKind::Root | NodeKind::Column)
                | (Content::Container(_), NodeKind::Section | NodeKind::Block)
                | (Content::Snippet(_), NodeKind::Snippet)
        )
    }
}

/// A node of the content tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub content: Content,
    #[serde(default, skip_serializing_if = "Styles::is_empty")]
    pub styles: Styles,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    /// Create a detached node with the default payload for its kind.
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: NodeId::PENDING,
            kind,
            content: Content::default_for(kind),
            styles: Styles::new(),
            children: Vec::new(),
        }
    }

    pub fn snippet(content: SnippetContent) -> Self {
        Self {
            content: Content::Snippet(content),
            ..Self::new(NodeKind::Snippet)
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_style(mut self, prop: StyleProperty, value: impl Into<SmolStr>) -> Self {
        self.styles.set(prop, value);
        self
    }

    pub fn snippet_kind(&self) -> Option<SnippetKind> {
        self.content.as_snippet().map(|s| s.kind)
    }

    /// Whether a block currently uses a column layout.
    pub fn has_columns(&self) -> bool {
        self.children.iter().any(|c| c.kind == NodeKind::Column)
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Whether `id` is this node or one of its descendants.
    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    pub fn find(&self, id: NodeId) -> Option<&Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn find_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Visit every node of the subtree in document order.
    pub fn for_each(&self, f: &mut impl FnMut(&Node)) {
        f(self);
        for child in &self.children {
            child.for_each(f);
        }
    }

    pub(crate) fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Node)) {
        f(self);
        for child in &mut self.children {
            child.for_each_mut(f);
        }
    }
}

/// Check that a node of kind `child` may become a child of `parent`, given
/// `parent`'s current children.
///
/// `ignore` excludes one child from the mix check; used when the child being
/// placed is already one of `parent`'s children.
pub fn check_containment(
    parent: &Node,
    child: NodeKind,
    ignore: Option<NodeId>,
) -> Result<(), TreeError> {
    let invalid = || TreeError::InvalidContainment {
        child,
        parent: parent.kind,
    };

    if !parent.kind.can_contain(child) {
        return Err(invalid());
    }

    if parent.kind == NodeKind::Block {
        let mut others = parent.children.iter().filter(|c| Some(c.id) != ignore);
        let mixes = match child {
            NodeKind::Column => others.any(|c| c.kind != NodeKind::Column),
            _ => others.any(|c| c.kind == NodeKind::Column),
        };
        if mixes {
            return Err(invalid());
        }
    }

    Ok(())
}

/// Validate a whole subtree against the grammar.
pub fn validate_subtree(node: &Node) -> Result<(), TreeError> {
    if !node.content.fits(node.kind) {
        return Err(TreeError::InvalidSnapshot(format!(
            "{} {} carries a mismatched payload",
            node.kind, node.id
        )));
    }
    for child in &node.children {
        if !node.kind.can_contain(child.kind) {
            return Err(TreeError::InvalidContainment {
                child: child.kind,
                parent: node.kind,
            });
        }
    }
    if node.kind == NodeKind::Block {
        let columns = node
            .children
            .iter()
            .filter(|c| c.kind == NodeKind::Column)
            .count();
        if columns != 0 && columns != node.children.len() {
            return Err(TreeError::InvalidContainment {
                child: NodeKind::Snippet,
                parent: NodeKind::Block,
            });
        }
    }
    node.children.iter().try_for_each(validate_subtree)
}

/// Per-kind control affordances rendered around a node in edit mode.
///
/// These are view concerns derived from [`NodeKind`]; they are never stored
/// in the tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Affordance {
    DragHandle,
    Edit,
    Settings,
    Duplicate,
    Delete,
}

impl Affordance {
    /// Attribute that marks control markup so exporters can strip it.
    pub const MARKER_ATTR: &'static str = "data-tessera-control";

    pub fn for_kind(kind: NodeKind) -> &'static [Affordance] {
        use Affordance::*;
        match kind {
            NodeKind::Root => &[],
            NodeKind::Column => &[Settings],
            NodeKind::Section | NodeKind::Block => &[DragHandle, Settings, Duplicate, Delete],
            NodeKind::Snippet => &[DragHandle, Edit, Settings, Duplicate, Delete],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Affordance::DragHandle => "drag-handle",
            Affordance::Edit => "edit",
            Affordance::Settings => "settings",
            Affordance::Duplicate => "duplicate",
            Affordance::Delete => "delete",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        [
            Affordance::DragHandle,
            Affordance::Edit,
            Affordance::Settings,
            Affordance::Duplicate,
            Affordance::Delete,
        ]
        .into_iter()
        .find(|a| a.as_str() == s)
    }
}
