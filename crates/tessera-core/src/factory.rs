//! Node factory: builds detached nodes from palette templates.
//!
//! Templates are untrusted. Markup goes through [`sanitize_markup`] and
//! structured drafts are validated against the containment grammar; any
//! template that fails either check is discarded in favour of the default
//! node of the requested kind.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::config::EditorConfig;
use crate::error::TreeError;
use crate::node::{
    ContainerContent, Content, Node, NodeKind, SnippetContent, SnippetKind, StyleProperty, Styles,
    validate_subtree,
};
use crate::sanitize::{
    first_link_attr, is_script_url, sanitize_attrs, sanitize_markup, sniff_snippet_kind,
};

/// Source a new node is built from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "format", content = "body", rename_all = "lowercase")]
pub enum Template {
    /// An HTML fragment. For containers it becomes a custom snippet inside
    /// the smallest valid wrapper.
    Markup(String),
    /// A structured description of a whole subtree.
    Draft(NodeDraft),
}

/// Structured template for one node and its children.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeDraft {
    pub kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<SnippetKind>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub markup: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<SmolStr, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<SmolStr>,
    #[serde(default, skip_serializing_if = "Styles::is_empty")]
    pub styles: Styles,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeDraft>,
}

impl NodeDraft {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            snippet: None,
            markup: String::new(),
            attrs: IndexMap::new(),
            anchor: None,
            styles: Styles::new(),
            children: Vec::new(),
        }
    }

    pub fn snippet(kind: SnippetKind, markup: impl Into<String>) -> Self {
        Self {
            snippet: Some(kind),
            markup: markup.into(),
            ..Self::new(NodeKind::Snippet)
        }
    }

    pub fn with_child(mut self, child: NodeDraft) -> Self {
        self.children.push(child);
        self
    }
}

/// Builds new nodes of a requested kind.
#[derive(Clone, Debug)]
pub struct NodeFactory {
    default_video_embed: String,
}

impl Default for NodeFactory {
    fn default() -> Self {
        Self::new(&EditorConfig::default())
    }
}

impl NodeFactory {
    pub fn new(config: &EditorConfig) -> Self {
        Self {
            default_video_embed: config.default_video_embed.clone(),
        }
    }

    /// Build a node, falling back to the default for `kind` when the
    /// template is rejected.
    pub fn create(&self, kind: NodeKind, template: Option<&Template>) -> Node {
        let Some(template) = template else {
            return self.default_node(kind);
        };
        match self.try_create(kind, template) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(%kind, error = %e, "template rejected, using default node");
                self.default_node(kind)
            }
        }
    }

    /// Build a node from a template without any fallback.
    pub fn try_create(&self, kind: NodeKind, template: &Template) -> Result<Node, TreeError> {
        let node = match template {
            Template::Markup(markup) => self.from_markup(kind, markup)?,
            Template::Draft(draft) => {
                if draft.kind != kind {
                    return Err(TreeError::MalformedTemplate(format!(
                        "template describes a {}, not a {kind}",
                        draft.kind
                    )));
                }
                self.from_draft(draft)?
            }
        };
        validate_subtree(&node)?;
        Ok(node)
    }

    /// Default node of a kind. Containers get a minimal single-column layout.
    pub fn default_node(&self, kind: NodeKind) -> Node {
        match kind {
            NodeKind::Root => Node::new(NodeKind::Root),
            NodeKind::Section => {
                Node::new(NodeKind::Section).with_child(self.default_node(NodeKind::Block))
            }
            NodeKind::Block => {
                Node::new(NodeKind::Block).with_child(self.default_node(NodeKind::Column))
            }
            NodeKind::Column => {
                Node::new(NodeKind::Column).with_style(StyleProperty::Width, "100%")
            }
            NodeKind::Snippet => self.default_snippet(SnippetKind::Text),
        }
    }

    /// Default snippet of a subtype.
    pub fn default_snippet(&self, kind: SnippetKind) -> Node {
        let content = match kind {
            SnippetKind::Text => SnippetContent::new(kind, "<p>Edit this text</p>"),
            SnippetKind::Image => SnippetContent::new(kind, r#"<img src="" alt="">"#),
            SnippetKind::Video => SnippetContent::new(
                kind,
                format!(
                    r#"<iframe src="{}" allowfullscreen></iframe>"#,
                    v_htmlescape::escape(&self.default_video_embed)
                ),
            )
            .with_attr("src", self.default_video_embed.clone()),
            SnippetKind::Button => {
                SnippetContent::new(kind, r##"<a class="btn" href="#">Button</a>"##)
                    .with_attr("href", "#")
            }
            SnippetKind::Custom => SnippetContent::new(kind, ""),
        };
        Node::snippet(content)
    }

    /// Placeholder inserted synchronously for a dropped image file. The
    /// image pipeline patches its content once the file is decoded.
    pub fn image_placeholder(&self, file_name: &str) -> Node {
        let alt = v_htmlescape::escape(file_name).to_string();
        Node::snippet(
            SnippetContent::new(
                SnippetKind::Image,
                format!(r#"<img src="" alt="{alt}" data-pending="true">"#),
            )
            .with_attr("alt", file_name)
            .with_attr("pending", "true"),
        )
    }

    fn from_markup(&self, kind: NodeKind, markup: &str) -> Result<Node, TreeError> {
        let clean = sanitize_markup(markup)?;
        if clean.trim().is_empty() {
            return Err(TreeError::MalformedTemplate("template is empty".into()));
        }
        let custom = || self.snippet(Some(SnippetKind::Custom), clean.clone(), IndexMap::new());
        Ok(match kind {
            NodeKind::Snippet => self.snippet(None, clean.clone(), IndexMap::new()),
            NodeKind::Column => Node::new(NodeKind::Column)
                .with_style(StyleProperty::Width, "100%")
                .with_child(custom()),
            NodeKind::Block => Node::new(NodeKind::Block).with_child(custom()),
            NodeKind::Section => {
                Node::new(NodeKind::Section)
                    .with_child(Node::new(NodeKind::Block).with_child(custom()))
            }
            NodeKind::Root => {
                return Err(TreeError::MalformedTemplate(
                    "the root canvas cannot come from a template".into(),
                ));
            }
        })
    }

    fn from_draft(&self, draft: &NodeDraft) -> Result<Node, TreeError> {
        let mut node = match draft.kind {
            NodeKind::Snippet => {
                let markup = sanitize_markup(&draft.markup)?;
                let attrs = sanitize_attrs(&draft.attrs);
                self.snippet(draft.snippet, markup, attrs)
            }
            NodeKind::Section | NodeKind::Block => {
                let mut node = Node::new(draft.kind);
                node.content = Content::Container(ContainerContent {
                    anchor: draft.anchor.clone(),
                    class: None,
                });
                node
            }
            kind => Node::new(kind),
        };
        node.styles = draft.styles.clone();
        node.children = draft
            .children
            .iter()
            .map(|child| self.from_draft(child))
            .collect::<Result<_, _>>()?;
        Ok(node)
    }

    fn snippet(
        &self,
        hint: Option<SnippetKind>,
        markup: String,
        mut attrs: IndexMap<SmolStr, String>,
    ) -> Node {
        let kind = hint.unwrap_or_else(|| sniff_snippet_kind(&markup));
        if markup.trim().is_empty() {
            let mut node = self.default_snippet(kind);
            if let Content::Snippet(content) = &mut node.content {
                content.attrs.extend(attrs);
            }
            return node;
        }

        let linked = match kind {
            SnippetKind::Button => Some("href"),
            SnippetKind::Image | SnippetKind::Video => Some("src"),
            SnippetKind::Text | SnippetKind::Custom => None,
        };
        if let Some(name) = linked.filter(|name| !attrs.contains_key(*name)) {
            if let Some(value) = first_link_attr(&markup, name).filter(|v| !is_script_url(v)) {
                attrs.insert(SmolStr::new(name), value.to_owned());
            }
        }

        Node::snippet(SnippetContent {
            kind,
            markup,
            attrs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> NodeFactory {
        NodeFactory::default()
    }

    #[test]
    fn test_default_block_is_single_column() {
        let block = factory().create(NodeKind::Block, None);
        assert_eq!(block.kind, NodeKind::Block);
        assert_eq!(block.children.len(), 1);
        assert_eq!(block.children[0].kind, NodeKind::Column);
        assert!(validate_subtree(&block).is_ok());

        let section = factory().create(NodeKind::Section, None);
        assert_eq!(section.children[0].kind, NodeKind::Block);
    }

    #[test]
    fn test_video_default_has_embed() {
        let video = factory().default_snippet(SnippetKind::Video);
        let content = video.content.as_snippet().unwrap();
        assert_eq!(content.kind, SnippetKind::Video);
        assert_eq!(
            content.attr("src"),
            Some(EditorConfig::default().default_video_embed.as_str())
        );

        let draft = Template::Draft(NodeDraft::snippet(SnippetKind::Video, ""));
        let node = factory().create(NodeKind::Snippet, Some(&draft));
        assert!(node.content.as_snippet().unwrap().attr("src").is_some());
    }

    #[test]
    fn test_markup_snippet_is_sniffed_and_sanitized() {
        let template = Template::Markup(
            r#"<a class="btn" href="https://example.com" onclick="track()">Buy</a>"#.into(),
        );
        let node = factory().create(NodeKind::Snippet, Some(&template));
        let content = node.content.as_snippet().unwrap();
        assert_eq!(content.kind, SnippetKind::Button);
        assert_eq!(content.href(), Some("https://example.com"));
        assert!(!content.markup.contains("onclick"));
    }

    #[test]
    fn test_markup_block_wraps_custom_snippet() {
        let template = Template::Markup("<div><p>hi</p></div>".into());
        let node = factory().create(NodeKind::Block, Some(&template));
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].snippet_kind(), Some(SnippetKind::Custom));
    }

    #[test]
    fn test_malformed_template_falls_back() {
        let template = Template::Markup("<p>ok</p><script>steal()".into());
        assert!(matches!(
            factory().try_create(NodeKind::Snippet, &template),
            Err(TreeError::MalformedTemplate(_))
        ));
        let node = factory().create(NodeKind::Snippet, Some(&template));
        assert_eq!(node, factory().default_node(NodeKind::Snippet));
    }

    #[test]
    fn test_draft_must_match_kind_and_grammar() {
        let wrong_kind = Template::Draft(NodeDraft::new(NodeKind::Section));
        assert!(factory().try_create(NodeKind::Block, &wrong_kind).is_err());

        let loose = Template::Draft(
            NodeDraft::new(NodeKind::Section)
                .with_child(NodeDraft::snippet(SnippetKind::Text, "x")),
        );
        assert!(matches!(
            factory().try_create(NodeKind::Section, &loose),
            Err(TreeError::InvalidContainment { .. })
        ));
    }

    #[test]
    fn test_draft_builds_columns() {
        let draft = NodeDraft::new(NodeKind::Block)
            .with_child(
                NodeDraft::new(NodeKind::Column)
                    .with_child(NodeDraft::snippet(SnippetKind::Text, "<p>left</p>")),
            )
            .with_child(NodeDraft::new(NodeKind::Column));
        let node = factory()
            .try_create(NodeKind::Block, &Template::Draft(draft))
            .unwrap();
        assert_eq!(node.subtree_len(), 4);
        assert!(node.has_columns());
    }

    #[test]
    fn test_draft_attrs_drop_handlers_and_script_urls() {
        let mut draft = NodeDraft::snippet(SnippetKind::Button, "<a>Go</a>");
        draft.attrs.insert("href".into(), "JavaScript:alert(1)".into());
        draft.attrs.insert("onClick".into(), "x()".into());
        draft.attrs.insert("target".into(), "_blank".into());
        let node = factory()
            .try_create(NodeKind::Snippet, &Template::Draft(draft))
            .unwrap();
        let content = node.content.as_snippet().unwrap();
        assert_eq!(content.attrs.len(), 1);
        assert_eq!(content.attr("target"), Some("_blank"));
    }

    #[test]
    fn test_image_placeholder_escapes_name() {
        let node = factory().image_placeholder("a\"b.png");
        let content = node.content.as_snippet().unwrap();
        assert_eq!(content.kind, SnippetKind::Image);
        assert_eq!(content.attr("pending"), Some("true"));
        assert!(!content.markup.contains("a\"b"));
    }

    #[test]
    fn test_template_serde_shape() {
        let json = r#"{"format":"markup","body":"<p>x</p>"}"#;
        let template: Template = serde_json::from_str(json).unwrap();
        assert_eq!(template, Template::Markup("<p>x</p>".into()));
    }
}
