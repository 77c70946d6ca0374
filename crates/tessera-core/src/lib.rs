//! tessera-core: Pure Rust page-builder engine without framework dependencies.
//!
//! This crate provides:
//! - `ContentTree` - the canonical page tree with an enforced containment grammar
//! - `NodeFactory` - node construction from sanitized templates
//! - Geometry resolution and the `DragController` gesture state machine
//! - `HistoryTracker` - debounced snapshot undo/redo
//! - `ModeController` - edit/display gating
//! - `PageEditor` - a facade wiring all of the above together
//!
//! Hosts supply layout, time and confirmation through the traits in
//! [`platform`].

pub mod actions;
pub mod columns;
pub mod config;
pub mod drag;
pub mod editor;
pub mod error;
pub mod factory;
pub mod geometry;
pub mod history;
pub mod mode;
pub mod node;
pub mod notify;
pub mod palette;
pub mod platform;
pub mod projection;
pub mod sanitize;
pub mod tree;

pub use actions::{KeyCombo, Modifiers, PageAction, execute_action};
pub use columns::{MAX_COLUMNS, column_count, set_column_count};
pub use config::EditorConfig;
pub use drag::{
    DragController, DragPayload, DragPhase, DragSession, DragSource, DropOutcome, DropTarget,
    NewItem, Notice, NoticeLevel, Provenance,
};
pub use editor::{ContentEditing, PageEditor, StructureEditing};
pub use error::TreeError;
pub use factory::{NodeDraft, NodeFactory, Template};
pub use geometry::{
    ChildBox, ContainerLayout, Feedback, InsertionPoint, Point, Rect, resolve_insertion,
};
pub use history::HistoryTracker;
pub use mode::{ClickAction, EditorMode, ModeChange, ModeController, SettingsPanel};
pub use node::{
    Affordance, ContainerContent, Content, Node, NodeId, NodeKind, SnippetContent, SnippetKind,
    StyleProperty, Styles,
};
pub use notify::{Listeners, SubscriptionId, TreeChange};
pub use palette::{PaletteCatalog, PaletteEntry, PreviewKind, StaticCatalog};
pub use platform::{Clock, ConfirmPrompt, LayoutProbe, ManualClock, RectLayout, SystemClock};
pub use projection::{RenderOptions, render_html};
pub use smol_str::SmolStr;
pub use tree::{ContentTree, Position, Snapshot};
