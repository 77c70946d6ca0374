//! Palette catalog: the read-only list of things a user can drag in.

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::error::TreeError;
use crate::factory::Template;
use crate::node::NodeKind;

/// How a palette entry is previewed in the panel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreviewKind {
    /// A static thumbnail image.
    #[default]
    Thumbnail,
    /// A glyph with the entry name.
    Icon,
    /// The template rendered live.
    Live,
}

/// One draggable palette item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaletteEntry {
    pub id: SmolStr,
    pub name: SmolStr,
    pub kind: NodeKind,
    pub template: Template,
    #[serde(default)]
    pub preview: PreviewKind,
}

/// Provider of palette entries, queried at panel-render time.
pub trait PaletteCatalog {
    fn list_available(&self, kind: NodeKind) -> Vec<PaletteEntry>;

    /// Look up an entry by id across every draggable kind.
    fn find(&self, id: &str) -> Option<PaletteEntry> {
        [NodeKind::Section, NodeKind::Block, NodeKind::Snippet]
            .into_iter()
            .flat_map(|kind| self.list_available(kind))
            .find(|entry| entry.id == id)
    }
}

/// In-memory catalog, typically loaded from a bundled JSON file.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticCatalog {
    entries: Vec<PaletteEntry>,
}

impl StaticCatalog {
    pub fn new(entries: Vec<PaletteEntry>) -> Self {
        Self { entries }
    }

    /// Parse a JSON array of entries.
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let entries: Vec<PaletteEntry> = serde_json::from_str(json)?;
        if let Some(bad) = entries.iter().find(|e| !e.kind.is_draggable()) {
            return Err(TreeError::MalformedTemplate(format!(
                "palette entry {} has undraggable kind {}",
                bad.id, bad.kind
            )));
        }
        Ok(Self { entries })
    }

    pub fn push(&mut self, entry: PaletteEntry) {
        self.entries.push(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PaletteCatalog for StaticCatalog {
    fn list_available(&self, kind: NodeKind) -> Vec<PaletteEntry> {
        self.entries
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}
