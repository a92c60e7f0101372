//! Engine and combined plugin settings.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mindmap_layout::LayoutSettings;

use crate::error::EngineError;

/// Timing and styling knobs for the floating-state engine and session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineSettings {
    /// Class added to floating nodes' elements.
    pub floating_class: String,
    /// Class added to collapsed nodes' elements.
    pub collapsed_class: String,
    /// Class added to elements hidden under a collapsed ancestor.
    pub hidden_class: String,
    /// Delays before each retry when a style target is not rendered yet.
    pub style_retry_ms: Vec<u64>,
    /// How long a freshly reconnected node is shielded from reconciliation.
    pub reconnect_debounce_ms: u64,
    /// Interval of the new-edge polling fallback and reconciliation tick.
    pub poll_interval_ms: u64,
    /// Wait after a node is created before it is laid out.
    pub node_settle_ms: u64,
    /// Re-run layout after structural changes.
    pub auto_layout: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            floating_class: "mindmap-floating".to_string(),
            collapsed_class: "mindmap-collapsed".to_string(),
            hidden_class: "mindmap-hidden".to_string(),
            style_retry_ms: vec![50, 150, 400],
            reconnect_debounce_ms: 750,
            poll_interval_ms: 1000,
            node_settle_ms: 120,
            auto_layout: true,
        }
    }
}

impl EngineSettings {
    pub fn style_retry_schedule(&self) -> Vec<Duration> {
        self.style_retry_ms.iter().copied().map(Duration::from_millis).collect()
    }

    pub fn reconnect_debounce(&self) -> Duration {
        Duration::from_millis(self.reconnect_debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn node_settle(&self) -> Duration {
        Duration::from_millis(self.node_settle_ms)
    }
}

/// Everything a session needs, in the shape stored by the host's plugin
/// settings file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MindmapSettings {
    pub layout: LayoutSettings,
    pub engine: EngineSettings,
}

impl MindmapSettings {
    /// Parses and validates settings. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, EngineError> {
        let settings: MindmapSettings = serde_json::from_str(text)?;
        settings.layout.validate()?;
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let text = std::fs::read_to_string(path).map_err(|source| EngineError::SettingsIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}
