//! HTML projection of the content tree.
//!
//! The view is always rebuilt from the tree. In edit mode each element
//! carries `data-node-id`/`data-kind` so the host can map DOM hits back to
//! nodes, and control affordances are emitted as elements tagged with
//! [`Affordance::MARKER_ATTR`]. With everything switched off the output is
//! publishable markup with no editor residue.

use v_htmlescape::escape;

use crate::mode::EditorMode;
use crate::node::{Affordance, Content, Node, NodeKind};
use crate::tree::ContentTree;

/// What to include when rendering.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderOptions {
    /// Emit control elements around each node.
    pub affordances: bool,
    /// Mark inline-editable snippet bodies `contenteditable`.
    pub editable: bool,
    /// Emit `data-node-id`, `data-kind` and `data-snippet`.
    pub node_ids: bool,
}

impl RenderOptions {
    pub fn edit() -> Self {
        Self {
            affordances: true,
            editable: true,
            node_ids: true,
        }
    }

    /// Live page in display mode: ids for hit testing, nothing editable.
    pub fn display() -> Self {
        Self {
            affordances: false,
            editable: false,
            node_ids: true,
        }
    }

    /// Publishable markup.
    pub fn export() -> Self {
        Self {
            affordances: false,
            editable: false,
            node_ids: false,
        }
    }

    pub fn for_mode(mode: EditorMode) -> Self {
        match mode {
            EditorMode::Edit => Self::edit(),
            EditorMode::Display => Self::display(),
        }
    }
}

/// Render the whole tree, root included.
pub fn render_html(tree: &ContentTree, options: RenderOptions) -> String {
    let mut out = String::new();
    render_node(tree.root(), options, &mut out);
    out
}

/// Render one subtree into `out`.
pub fn render_node(node: &Node, options: RenderOptions, out: &mut String) {
    let tag = match node.kind {
        NodeKind::Section => "section",
        _ => "div",
    };

    out.push('<');
    out.push_str(tag);
    out.push_str(" class=\"tessera-");
    out.push_str(node.kind.as_str());
    if let Content::Container(container) = &node.content {
        if let Some(class) = &container.class {
            out.push(' ');
            out.push_str(&escape(class).to_string());
        }
    }
    out.push('"');

    if let Content::Container(container) = &node.content {
        if let Some(anchor) = &container.anchor {
            out.push_str(&format!(" id=\"{}\"", escape(anchor)));
        }
    }
    if options.node_ids {
        out.push_str(&format!(
            " data-node-id=\"{}\" data-kind=\"{}\"",
            node.id, node.kind
        ));
    }
    let snippet = node.content.as_snippet();
    if let Some(snippet) = snippet {
        if options.node_ids {
            out.push_str(&format!(" data-snippet=\"{}\"", snippet.kind.as_str()));
        }
        if options.editable && snippet.kind.is_inline_editable() {
            out.push_str(" contenteditable=\"true\"");
        }
    }
    if !node.styles.is_empty() {
        out.push_str(&format!(" style=\"{}\"", escape(&node.styles.to_css())));
    }
    out.push('>');

    if options.affordances {
        render_controls(Affordance::for_kind(node.kind), out);
    }
    if let Some(snippet) = snippet {
        out.push_str(&snippet.markup);
    }
    for child in &node.children {
        render_node(child, options, out);
    }

    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn render_controls(affordances: &[Affordance], out: &mut String) {
    if affordances.is_empty() {
        return;
    }
    let marker = Affordance::MARKER_ATTR;
    out.push_str(&format!("<div {marker}=\"controls\">"));
    for affordance in affordances {
        let draggable = if *affordance == Affordance::DragHandle {
            " draggable=\"true\""
        } else {
            ""
        };
        out.push_str(&format!(
            "<button type=\"button\" {marker}=\"{}\"{draggable}></button>",
            affordance.as_str()
        ));
    }
    out.push_str("</div>");
}
