//! Browser event extraction.
//!
//! Pure conversions from DOM events and targets to the engine's types.
//! Nothing here touches the editor.

use smol_str::SmolStr;
use tessera_core::{Affordance, KeyCombo, Modifiers, NodeId, Point};
use wasm_bindgen::JsCast;
use web_sys::{DataTransfer, Element, Event, KeyboardEvent, MouseEvent};

use crate::probe::owning_node;

/// Attribute carried by palette items outside the canvas.
pub const PALETTE_ATTR: &str = "data-palette-entry";

pub fn point_of(event: &MouseEvent) -> Point {
    Point::new(event.client_x() as f64, event.client_y() as f64)
}

pub fn key_combo(event: &KeyboardEvent) -> KeyCombo {
    KeyCombo::with_modifiers(
        event.key(),
        Modifiers {
            ctrl: event.ctrl_key(),
            alt: event.alt_key(),
            shift: event.shift_key(),
            meta: event.meta_key(),
        },
    )
}

pub fn target_element(event: &Event) -> Option<Element> {
    event.target()?.dyn_into::<Element>().ok()
}

/// What a pointer landed on inside the canvas: the owning node and, if the
/// hit was on one of its controls, which one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanvasHit {
    pub node: NodeId,
    pub control: Option<Affordance>,
}

pub fn canvas_hit(target: &Element) -> Option<CanvasHit> {
    let node = owning_node(target)?;
    let selector = format!("[{}]", Affordance::MARKER_ATTR);
    let control = target
        .closest(&selector)
        .ok()
        .flatten()
        .and_then(|el| el.get_attribute(Affordance::MARKER_ATTR))
        .and_then(|name| Affordance::parse(&name));
    Some(CanvasHit { node, control })
}

/// The palette entry id for a press on a palette item.
pub fn palette_entry(target: &Element) -> Option<SmolStr> {
    let selector = format!("[{PALETTE_ATTR}]");
    let item = target.closest(&selector).ok().flatten()?;
    item.get_attribute(PALETTE_ATTR).map(SmolStr::from)
}

/// Names of image files carried by a native drag.
///
/// During `dragenter`/`dragover` browsers hide the file list, so callers
/// should only rely on this from `drop`. [`carries_files`] works earlier.
pub fn image_files(transfer: &DataTransfer) -> Vec<web_sys::File> {
    let Some(files) = transfer.files() else {
        return Vec::new();
    };
    (0..files.length())
        .filter_map(|i| files.get(i))
        .filter(|f| f.type_().starts_with("image/"))
        .collect()
}

/// Whether a native drag carries files at all.
pub fn carries_files(transfer: &DataTransfer) -> bool {
    transfer.types().iter().any(|t| t.as_string().as_deref() == Some("Files"))
}
