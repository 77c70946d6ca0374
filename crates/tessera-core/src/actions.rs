//! Page-level actions and their key bindings.

use smol_str::SmolStr;

use crate::drag::{DropOutcome, Notice};
use crate::editor::{PageEditor, StructureEditing};
use crate::mode::EditorMode;
use crate::node::NodeId;
use crate::platform::ConfirmPrompt;

/// Commands the page editor understands, independent of how they were
/// triggered (toolbar, keyboard, context menu).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAction {
    Undo,
    Redo,
    Delete(NodeId),
    Duplicate(NodeId),
    SetColumns { block: NodeId, count: usize },
    ToggleMode,
    SetMode(EditorMode),
    /// Abort the gesture in flight (Escape).
    CancelDrag,
}

/// Modifier key state for a key combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        alt: false,
        shift: false,
        meta: false,
    };

    /// Whether the platform's primary modifier is held (Cmd on Mac, Ctrl
    /// elsewhere).
    pub fn primary(&self, is_mac: bool) -> bool {
        if is_mac { self.meta } else { self.ctrl }
    }
}

/// A key press: the DOM `KeyboardEvent.key` value plus modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key: SmolStr,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub fn new(key: impl Into<SmolStr>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::NONE,
        }
    }

    pub fn with_modifiers(key: impl Into<SmolStr>, modifiers: Modifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
        }
    }
}

impl PageAction {
    /// Map a key press to an action. `selected` is the node that has the
    /// editor's focus ring, if any.
    pub fn from_key(combo: &KeyCombo, selected: Option<NodeId>, is_mac: bool) -> Option<Self> {
        let primary = combo.modifiers.primary(is_mac);
        let shift = combo.modifiers.shift;
        match combo.key.as_str() {
            "Escape" => Some(PageAction::CancelDrag),
            "z" | "Z" if primary && shift => Some(PageAction::Redo),
            "z" | "Z" if primary => Some(PageAction::Undo),
            "y" | "Y" if primary && !is_mac => Some(PageAction::Redo),
            "d" | "D" if primary => selected.map(PageAction::Duplicate),
            "Delete" | "Backspace" if !primary => selected.map(PageAction::Delete),
            "e" | "E" if primary && shift => Some(PageAction::ToggleMode),
            _ => None,
        }
    }
}

/// Apply an action to the editor.
///
/// Returns true if the action did something. Expected failures (stale
/// nodes, invalid column changes) are logged and reported as `false`.
pub fn execute_action(
    editor: &mut PageEditor,
    action: &PageAction,
    prompt: &dyn ConfirmPrompt,
) -> bool {
    let result = match *action {
        PageAction::Undo => editor.undo(),
        PageAction::Redo => editor.redo(),
        PageAction::Delete(id) => editor.delete(id, prompt),
        PageAction::Duplicate(id) => editor.duplicate(id).map(|_| true),
        PageAction::SetColumns { block, count } => editor.set_columns(block, count).map(|_| true),
        PageAction::ToggleMode => {
            editor.toggle_mode();
            Ok(true)
        }
        PageAction::SetMode(mode) => Ok(editor.set_mode(mode)),
        PageAction::CancelDrag => Ok(editor.cancel_drag() != DropOutcome::Ignored),
    };
    match result {
        Ok(done) => done,
        Err(e) if e.is_recoverable() => {
            tracing::debug!(?action, error = %e, "action had no effect");
            false
        }
        Err(e) => {
            tracing::warn!(?action, error = %e, "action failed");
            editor.post_notice(Notice::warning(e.to_string()));
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EditorConfig;
    use crate::node::NodeKind;
    use crate::palette::StaticCatalog;

    fn ctrl(key: &str) -> KeyCombo {
        KeyCombo::with_modifiers(
            key,
            Modifiers {
                ctrl: true,
                ..Modifiers::NONE
            },
        )
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(
            PageAction::from_key(&ctrl("z"), None, false),
            Some(PageAction::Undo)
        );
        let redo = KeyCombo::with_modifiers(
            "Z",
            Modifiers {
                ctrl: true,
                shift: true,
                ..Modifiers::NONE
            },
        );
        assert_eq!(
            PageAction::from_key(&redo, None, false),
            Some(PageAction::Redo)
        );
        assert_eq!(
            PageAction::from_key(&ctrl("y"), None, false),
            Some(PageAction::Redo)
        );
        // ctrl is not primary on mac
        assert_eq!(PageAction::from_key(&ctrl("z"), None, true), None);
        assert_eq!(
            PageAction::from_key(&KeyCombo::new("Escape"), None, false),
            Some(PageAction::CancelDrag)
        );
    }

    #[test]
    fn test_selection_actions_need_selection() {
        let del = KeyCombo::new("Delete");
        assert_eq!(PageAction::from_key(&del, None, false), None);
        assert_eq!(
            PageAction::from_key(&del, Some(NodeId(4)), false),
            Some(PageAction::Delete(NodeId(4)))
        );
    }

    #[test]
    fn test_execute_undo_redo() {
        let mut editor =
            PageEditor::new(EditorConfig::default(), Box::new(StaticCatalog::default())).unwrap();
        let root = editor.tree().root_id();
        editor
            .insert_new(NodeKind::Block, None, root, 0)
            .unwrap();
        let yes = |_: &str| true;

        assert!(execute_action(&mut editor, &PageAction::Undo, &yes));
        assert!(editor.tree().is_empty());
        assert!(!execute_action(&mut editor, &PageAction::Undo, &yes));
        assert!(execute_action(&mut editor, &PageAction::Redo, &yes));
        assert!(!editor.tree().is_empty());
    }

    #[test]
    fn test_execute_on_stale_node_is_quiet() {
        let mut editor =
            PageEditor::new(EditorConfig::default(), Box::new(StaticCatalog::default())).unwrap();
        let yes = |_: &str| true;
        assert!(!execute_action(&mut editor, &PageAction::Duplicate(NodeId(99)), &yes));
        assert!(editor.notice().is_none());
        assert!(!execute_action(
            &mut editor,
            &PageAction::SetColumns {
                block: NodeId(99),
                count: 2
            },
            &yes
        ));
    }

    #[test]
    fn test_toggle_mode_action() {
        let mut editor =
            PageEditor::new(EditorConfig::default(), Box::new(StaticCatalog::default())).unwrap();
        let yes = |_: &str| true;
        assert!(execute_action(&mut editor, &PageAction::ToggleMode, &yes));
        assert_eq!(editor.mode(), EditorMode::Display);
        assert!(!execute_action(
            &mut editor,
            &PageAction::SetMode(EditorMode::Display),
            &yes
        ));
    }
}
