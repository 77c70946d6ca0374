//! Editor configuration, loaded from JSON with per-field defaults.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TreeError;

/// Editor tuning knobs. Every field has a default, so a partial JSON document
/// is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Maximum number of history entries kept, baseline included.
    pub history_capacity: usize,
    /// Quiescence window before a burst of changes becomes one undo step.
    pub history_debounce_ms: u64,
    /// Pointer travel that turns an armed pointer-down into a drag.
    pub drag_threshold_px: f64,
    /// Ask before deleting a node.
    pub confirm_delete: bool,
    /// How long transient notices stay visible.
    pub notice_ttl_ms: u64,
    /// Embed target given to new video snippets.
    pub default_video_embed: String,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            history_debounce_ms: 300,
            drag_threshold_px: 4.0,
            confirm_delete: true,
            notice_ttl_ms: 2500,
            default_video_embed: "https://www.youtube.com/embed/dQw4w9WgXcQ".to_owned(),
        }
    }
}

impl EditorConfig {
    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, TreeError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TreeError::Config(e.to_string()))?;
        config.validated()
    }

    /// Read a JSON configuration file.
    #[cfg(not(all(target_family = "wasm", target_os = "unknown")))]
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, TreeError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TreeError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, TreeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validated(self) -> Result<Self, TreeError> {
        if self.history_capacity < 2 {
            return Err(TreeError::Config(
                "history_capacity must keep at least two entries".into(),
            ));
        }
        if !self.drag_threshold_px.is_finite() || self.drag_threshold_px < 0.0 {
            return Err(TreeError::Config(format!(
                "drag_threshold_px must be a non-negative number, got {}",
                self.drag_threshold_px
            )));
        }
        Ok(self)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.history_debounce_ms)
    }

    pub fn notice_ttl(&self) -> Duration {
        Duration::from_millis(self.notice_ttl_ms)
    }
}
