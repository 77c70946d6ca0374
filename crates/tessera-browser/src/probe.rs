//! Layout probing against the rendered canvas.
//!
//! Coordinates are client (viewport) pixels, the same space
//! `MouseEvent.clientX/Y` report in.

use tessera_core::{LayoutProbe, NodeId, Point, Rect};
use web_sys::{Document, Element};

/// Selector matching any element that projects a tree node.
pub const NODE_SELECTOR: &str = "[data-node-id]";

/// Reads node geometry from the live DOM under `canvas`.
#[derive(Debug, Clone)]
pub struct DomLayoutProbe {
    document: Document,
    canvas: Element,
}

impl DomLayoutProbe {
    pub fn new(document: Document, canvas: Element) -> Self {
        Self { document, canvas }
    }

    pub fn canvas(&self) -> &Element {
        &self.canvas
    }

    /// The element projecting `id`, if it is rendered.
    pub fn element_for(&self, id: NodeId) -> Option<Element> {
        if node_id_of(&self.canvas) == Some(id) {
            return Some(self.canvas.clone());
        }
        let selector = format!("[data-node-id=\"{id}\"]");
        self.canvas.query_selector(&selector).ok().flatten()
    }
}

impl LayoutProbe for DomLayoutProbe {
    fn node_at(&self, at: Point) -> Option<NodeId> {
        let hit = self.document.element_from_point(at.x as f32, at.y as f32)?;
        if !self.canvas.contains(Some(&hit)) {
            return None;
        }
        owning_node(&hit)
    }

    fn rect_of(&self, id: NodeId) -> Option<Rect> {
        let el = self.element_for(id)?;
        let r = el.get_bounding_client_rect();
        Some(Rect::new(r.x(), r.y(), r.width(), r.height()))
    }
}

/// The node id carried directly on `el`, if any.
pub fn node_id_of(el: &Element) -> Option<NodeId> {
    el.get_attribute("data-node-id")?.parse().ok()
}

/// The innermost node whose projection contains `el`.
pub fn owning_node(el: &Element) -> Option<NodeId> {
    let owner = el.closest(NODE_SELECTOR).ok().flatten()?;
    node_id_of(&owner)
}
