//! Drag feedback elements.
//!
//! Two absolutely positioned elements live beside the canvas: a thin
//! insertion line and a "drop here" overlay. Both are marked as controls
//! so they never show up in exported markup.

use tessera_core::{Affordance, Feedback, Rect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

const LINE_THICKNESS: f64 = 2.0;

pub struct FeedbackLayer {
    line: HtmlElement,
    overlay: HtmlElement,
    shown: Feedback,
}

impl FeedbackLayer {
    /// Create the indicator elements and append them to `host`.
    pub fn attach(document: &Document, host: &Element) -> Result<Self, JsValue> {
        let line = indicator(document, "insertion-line")?;
        let overlay = indicator(document, "drop-overlay")?;
        overlay.set_inner_html("<span>Drop here</span>");
        host.append_child(&line)?;
        host.append_child(&overlay)?;
        Ok(Self {
            line,
            overlay,
            shown: Feedback::None,
        })
    }

    pub fn shown(&self) -> &Feedback {
        &self.shown
    }

    /// Show `feedback`, hiding whatever was shown before. Repeating the
    /// current feedback touches nothing.
    pub fn show(&mut self, feedback: &Feedback) -> Result<(), JsValue> {
        if *feedback == self.shown {
            return Ok(());
        }
        match feedback {
            Feedback::None => {
                hide(&self.line)?;
                hide(&self.overlay)?;
            }
            Feedback::Line { x, y, width, .. } => {
                hide(&self.overlay)?;
                let rect = Rect::new(*x, *y - LINE_THICKNESS / 2.0, *width, LINE_THICKNESS);
                place(&self.line, &rect)?;
            }
            Feedback::Overlay { rect, .. } => {
                hide(&self.line)?;
                place(&self.overlay, rect)?;
            }
        }
        self.shown = feedback.clone();
        Ok(())
    }

    pub fn clear(&mut self) -> Result<(), JsValue> {
        self.show(&Feedback::None)
    }

    pub fn detach(&self) {
        self.line.remove();
        self.overlay.remove();
    }
}

fn indicator(document: &Document, name: &str) -> Result<HtmlElement, JsValue> {
    let el: HtmlElement = document.create_element("div")?.dyn_into()?;
    el.set_attribute(Affordance::MARKER_ATTR, name)?;
    let style = el.style();
    style.set_property("position", "fixed")?;
    style.set_property("pointer-events", "none")?;
    style.set_property("display", "none")?;
    Ok(el)
}

fn hide(el: &HtmlElement) -> Result<(), JsValue> {
    el.style().set_property("display", "none")
}

fn place(el: &HtmlElement, rect: &Rect) -> Result<(), JsValue> {
    let style = el.style();
    style.set_property("left", &format!("{}px", rect.x))?;
    style.set_property("top", &format!("{}px", rect.y))?;
    style.set_property("width", &format!("{}px", rect.width))?;
    style.set_property("height", &format!("{}px", rect.height))?;
    style.set_property("display", "block")
}
