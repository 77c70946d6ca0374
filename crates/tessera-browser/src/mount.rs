//! Mounting a page editor onto a canvas element.
//!
//! [`PageCanvas`] owns the editor, renders it into the canvas and routes
//! DOM events to it. Listeners are removed when the canvas is dropped.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_events::{EventListener, EventListenerOptions};
use smol_str::SmolStr;
use tessera_core::{
    Affordance, ClickAction, ConfirmPrompt, Content, ContentEditing, DragPhase, DragSource,
    DropOutcome, NodeId, Notice, PageAction, PageEditor, SettingsPanel, execute_action,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{DragEvent, Element, Event, EventTarget, HtmlElement, KeyboardEvent, MouseEvent};

use crate::events::{
    canvas_hit, carries_files, image_files, key_combo, palette_entry, point_of, target_element,
};
use crate::feedback::FeedbackLayer;
use crate::platform::platform;
use crate::probe::DomLayoutProbe;

/// How often debounced history and notice expiry are polled.
const TICK_MS: i32 = 100;

/// Confirmation through `window.confirm`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserConfirm;

impl ConfirmPrompt for BrowserConfirm {
    fn confirm(&self, message: &str) -> bool {
        web_sys::window()
            .and_then(|w| w.confirm_with_message(message).ok())
            .unwrap_or(false)
    }
}

type SettingsHook = Rc<dyn Fn(NodeId, SettingsPanel)>;
type NoticeHook = Rc<dyn Fn(&Notice)>;

struct CanvasState {
    editor: PageEditor,
    probe: DomLayoutProbe,
    feedback: FeedbackLayer,
    selected: Option<NodeId>,
    /// File that arrived with a native drop, waiting for its placeholder.
    dropped_file: Option<web_sys::File>,
    on_settings: Option<SettingsHook>,
    on_notice: Option<NoticeHook>,
}

/// Follow-up work that must run after the state borrow is released.
enum Effect {
    Nothing,
    OpenSettings(NodeId, SettingsPanel),
}

type Handler = fn(&mut CanvasState, &Event) -> Result<Effect, JsValue>;

impl CanvasState {
    fn repaint(&self) {
        self.probe.canvas().set_inner_html(&self.editor.render());
    }

    fn is_idle(&self) -> bool {
        self.editor.drag_phase() == DragPhase::Idle
    }

    fn settle(&mut self, outcome: DropOutcome) -> Result<Effect, JsValue> {
        self.feedback.clear()?;
        let pending = match outcome {
            DropOutcome::Ignored => return Ok(Effect::Nothing),
            DropOutcome::Inserted {
                id,
                pending_image: true,
                ..
            } => Some(id),
            _ => None,
        };
        let file = self.dropped_file.take();
        if let (Some(id), Some(file)) = (pending, file) {
            let url = web_sys::Url::create_object_url_with_blob(&file)?;
            if let Err(e) = self.editor.fill_image(id, &url) {
                tracing::warn!(%id, error = %e, "could not fill image placeholder");
                self.editor.post_notice(Notice::warning(e.to_string()));
            }
        }
        self.repaint();
        Ok(Effect::Nothing)
    }

    fn run(&mut self, action: PageAction) -> Result<Effect, JsValue> {
        if execute_action(&mut self.editor, &action, &BrowserConfirm) {
            if action == PageAction::CancelDrag {
                self.feedback.clear()?;
            }
            self.repaint();
        }
        Ok(Effect::Nothing)
    }
}

/// A page editor bound to a canvas element.
pub struct PageCanvas {
    state: Rc<RefCell<CanvasState>>,
    listeners: Vec<EventListener>,
    ticker: Option<(i32, Closure<dyn FnMut()>)>,
}

impl PageCanvas {
    /// Render `editor` into `canvas` and start listening for input.
    pub fn mount(editor: PageEditor, canvas: Element) -> Result<Self, JsValue> {
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;
        let body = document
            .body()
            .ok_or_else(|| JsValue::from_str("no body"))?;

        let feedback = FeedbackLayer::attach(&document, &body)?;
        let probe = DomLayoutProbe::new(document.clone(), canvas.clone());
        let state = CanvasState {
            editor,
            probe,
            feedback,
            selected: None,
            dropped_file: None,
            on_settings: None,
            on_notice: None,
        };
        state.repaint();

        let mut mounted = Self {
            state: Rc::new(RefCell::new(state)),
            listeners: Vec::new(),
            ticker: None,
        };

        mounted.listen(&document, "mousedown", on_mouse_down);
        mounted.listen(&document, "mousemove", on_mouse_move);
        mounted.listen(&document, "mouseup", on_mouse_up);
        mounted.listen(&document, "keydown", on_key_down);
        mounted.listen(&document, "dragover", on_drag_over);
        mounted.listen(&document, "drop", on_drop);
        mounted.listen(&document, "dragend", on_drag_end);
        mounted.listen(&canvas, "mouseleave", on_leave);
        mounted.listen(&canvas, "dragleave", on_leave);
        mounted.listen(&canvas, "dragstart", on_drag_start);
        mounted.listen(&canvas, "click", on_click);
        mounted.listen(&canvas, "input", on_input);
        mounted.start_ticker(&window)?;

        tracing::debug!("page canvas mounted");
        Ok(mounted)
    }

    /// Called when a settings panel should open.
    pub fn on_settings(&self, hook: impl Fn(NodeId, SettingsPanel) + 'static) {
        self.state.borrow_mut().on_settings = Some(Rc::new(hook));
    }

    /// Called when the editor posts a new notice.
    pub fn on_notice(&self, hook: impl Fn(&Notice) + 'static) {
        self.state.borrow_mut().on_notice = Some(Rc::new(hook));
    }

    /// Run `f` against the editor, then re-render.
    pub fn with_editor<R>(&self, f: impl FnOnce(&mut PageEditor) -> R) -> R {
        let mut state = self.state.borrow_mut();
        let result = f(&mut state.editor);
        state.repaint();
        result
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.state.borrow().selected
    }

    fn listen(&mut self, target: &EventTarget, event: &'static str, handler: Handler) {
        let state = Rc::downgrade(&self.state);
        let listener = EventListener::new_with_options(
            target,
            event,
            EventListenerOptions::enable_prevent_default(),
            move |e| dispatch(&state, event, handler, e),
        );
        self.listeners.push(listener);
    }

    fn start_ticker(&mut self, window: &web_sys::Window) -> Result<(), JsValue> {
        let state = Rc::downgrade(&self.state);
        let tick = Closure::<dyn FnMut()>::new(move || {
            let Some(state) = state.upgrade() else {
                return;
            };
            // An event handler holds the state; try again next tick.
            let Ok(mut s) = state.try_borrow_mut() else {
                return;
            };
            if let Err(e) = s.editor.tick() {
                tracing::warn!(error = %e, "history poll failed");
            }
        });
        let handle = window.set_interval_with_callback_and_timeout_and_arguments_0(
            tick.as_ref().unchecked_ref(),
            TICK_MS,
        )?;
        self.ticker = Some((handle, tick));
        Ok(())
    }
}

impl Drop for PageCanvas {
    fn drop(&mut self) {
        if let Some((handle, _)) = self.ticker.take() {
            if let Some(window) = web_sys::window() {
                window.clear_interval_with_handle(handle);
            }
        }
        self.listeners.clear();
        self.state.borrow().feedback.detach();
    }
}

fn dispatch(state: &Weak<RefCell<CanvasState>>, event: &str, handler: Handler, e: &Event) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let (effect, notice, hooks) = {
        let Ok(mut s) = state.try_borrow_mut() else {
            tracing::trace!(event, "re-entrant event dropped");
            return;
        };
        let before = s.editor.notice().cloned();
        let effect = match handler(&mut s, e) {
            Ok(effect) => effect,
            Err(err) => {
                tracing::warn!(event, ?err, "event handler failed");
                Effect::Nothing
            }
        };
        let after = s.editor.notice().cloned();
        let notice = after.filter(|n| before.as_ref() != Some(n));
        (effect, notice, (s.on_settings.clone(), s.on_notice.clone()))
    };

    let (on_settings, on_notice) = hooks;
    if let (Some(notice), Some(hook)) = (notice, on_notice) {
        hook(&notice);
    }
    if let (Effect::OpenSettings(id, panel), Some(hook)) = (effect, on_settings) {
        hook(id, panel);
    }
}

fn on_mouse_down(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let (Some(mouse), Some(target)) = (e.dyn_ref::<MouseEvent>(), target_element(e)) else {
        return Ok(Effect::Nothing);
    };
    if mouse.button() != 0 {
        return Ok(Effect::Nothing);
    }
    let at = point_of(mouse);
    if let Some(entry) = palette_entry(&target) {
        s.editor.start_palette_drag(&entry, at);
        return Ok(Effect::Nothing);
    }
    if !s.probe.canvas().contains(Some(&target)) {
        return Ok(Effect::Nothing);
    }
    if let Some(hit) = canvas_hit(&target) {
        s.selected = Some(hit.node);
        if hit.control == Some(Affordance::DragHandle) {
            s.editor.pointer_down(DragSource::Handle(hit.node), at);
        }
    }
    Ok(Effect::Nothing)
}

fn on_mouse_move(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let Some(mouse) = e.dyn_ref::<MouseEvent>() else {
        return Ok(Effect::Nothing);
    };
    if s.is_idle() {
        return Ok(Effect::Nothing);
    }
    let feedback = s.editor.pointer_move(point_of(mouse), &s.probe);
    s.feedback.show(&feedback)?;
    Ok(Effect::Nothing)
}

fn on_mouse_up(s: &mut CanvasState, _e: &Event) -> Result<Effect, JsValue> {
    match s.editor.drag_phase() {
        DragPhase::Dragging => {
            let outcome = s.editor.drop();
            s.settle(outcome)
        }
        _ => {
            s.editor.pointer_up();
            Ok(Effect::Nothing)
        }
    }
}

fn on_leave(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    if s.is_idle() {
        return Ok(Effect::Nothing);
    }
    // dragleave also fires when crossing into a child of the canvas
    let related = e
        .dyn_ref::<MouseEvent>()
        .and_then(|m| m.related_target())
        .and_then(|t| t.dyn_into::<web_sys::Node>().ok());
    if let Some(related) = related {
        if s.probe.canvas().contains(Some(&related)) {
            return Ok(Effect::Nothing);
        }
    }
    let feedback = s.editor.pointer_leave_canvas();
    s.feedback.show(&feedback)?;
    Ok(Effect::Nothing)
}

fn on_key_down(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let Some(key) = e.dyn_ref::<KeyboardEvent>() else {
        return Ok(Effect::Nothing);
    };
    let combo = key_combo(key);
    let typing = target_element(e)
        .and_then(|el| el.dyn_into::<HtmlElement>().ok())
        .is_some_and(|el| el.is_content_editable());
    let Some(action) = PageAction::from_key(&combo, s.selected, platform().mac) else {
        return Ok(Effect::Nothing);
    };
    if typing && matches!(action, PageAction::Delete(_)) {
        return Ok(Effect::Nothing);
    }
    e.prevent_default();
    s.run(action)
}

fn on_click(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let Some(hit) = target_element(e).and_then(|el| canvas_hit(&el)) else {
        return Ok(Effect::Nothing);
    };
    if hit.control.is_some() {
        e.prevent_default();
    }
    match s.editor.click(hit.node, hit.control) {
        ClickAction::OpenSettings { id, panel } => return Ok(Effect::OpenSettings(id, panel)),
        ClickAction::EditInline { id } => {
            if let Some(el) = s.probe.element_for(id) {
                el.dyn_into::<HtmlElement>()?.focus()?;
            }
        }
        ClickAction::Navigate { url } => {
            e.prevent_default();
            if let Some(window) = web_sys::window() {
                window.location().set_href(&url)?;
            }
        }
        ClickAction::Duplicate { id } => return s.run(PageAction::Duplicate(id)),
        ClickAction::RequestDelete { id } => return s.run(PageAction::Delete(id)),
        ClickAction::Nothing => {}
    }
    Ok(Effect::Nothing)
}

fn on_input(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let Some(target) = target_element(e) else {
        return Ok(Effect::Nothing);
    };
    let Some(hit) = canvas_hit(&target) else {
        return Ok(Effect::Nothing);
    };
    let Some(el) = s.probe.element_for(hit.node) else {
        return Ok(Effect::Nothing);
    };
    let Some(mut content) = s
        .editor
        .node(hit.node)
        .and_then(|n| n.content.as_snippet())
        .cloned()
    else {
        return Ok(Effect::Nothing);
    };
    content.markup = markup_without_controls(&el)?;
    if let Err(err) = s.editor.set_content(hit.node, Content::Snippet(content)) {
        tracing::warn!(node = %hit.node, error = %err, "inline edit rejected");
    }
    Ok(Effect::Nothing)
}

fn on_drag_start(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    if !s.editor.native_drag_start() {
        return Ok(Effect::Nothing);
    }
    if let Some(transfer) = e.dyn_ref::<DragEvent>().and_then(|d| d.data_transfer()) {
        transfer.set_effect_allowed("move");
        // Firefox only starts the drag once something is set
        transfer.set_data("text/plain", "")?;
    }
    Ok(Effect::Nothing)
}

fn on_drag_over(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    let Some(drag) = e.dyn_ref::<DragEvent>() else {
        return Ok(Effect::Nothing);
    };
    let at = point_of(drag);
    if s.is_idle() {
        let files = drag.data_transfer().is_some_and(|t| carries_files(&t));
        let over_canvas = target_element(e).is_some_and(|t| s.probe.canvas().contains(Some(&t)));
        if !(files && over_canvas) {
            return Ok(Effect::Nothing);
        }
        let source = DragSource::ImageFile {
            name: SmolStr::new_static("image"),
        };
        s.editor.pointer_down(source, at);
        s.editor.native_drag_start();
    }
    e.prevent_default();
    let feedback = s.editor.pointer_move(at, &s.probe);
    s.feedback.show(&feedback)?;
    Ok(Effect::Nothing)
}

fn on_drop(s: &mut CanvasState, e: &Event) -> Result<Effect, JsValue> {
    if s.is_idle() {
        return Ok(Effect::Nothing);
    }
    e.prevent_default();
    s.dropped_file = e
        .dyn_ref::<DragEvent>()
        .and_then(|d| d.data_transfer())
        .and_then(|t| image_files(&t).into_iter().next());
    let outcome = s.editor.drop();
    s.settle(outcome)
}

fn on_drag_end(s: &mut CanvasState, _e: &Event) -> Result<Effect, JsValue> {
    if s.is_idle() {
        return Ok(Effect::Nothing);
    }
    let outcome = s.editor.cancel_drag();
    s.settle(outcome)
}

/// Inner markup of a snippet element minus the injected controls.
fn markup_without_controls(el: &Element) -> Result<String, JsValue> {
    let copy: Element = el.clone_node_with_deep(true)?.dyn_into()?;
    let controls = copy.query_selector_all(&format!("[{}]", Affordance::MARKER_ATTR))?;
    for i in 0..controls.length() {
        if let Some(control) = controls.get(i).and_then(|n| n.dyn_into::<Element>().ok()) {
            control.remove();
        }
    }
    Ok(copy.inner_html())
}
