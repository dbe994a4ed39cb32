//! Durable workspace layout types.
//!
//! The snapshot is the only durable state: logical layout plus tab
//! metadata, never live transport state. Restoring it rebuilds one
//! session controller per tab.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use harbor_common::{PaneId, TabId};

/// A workspace slot. `tabs` is a sequence for forward compatibility but
/// the store keeps it at most one element long: one live session per
/// pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pane {
    pub id: PaneId,
    #[serde(default)]
    pub tabs: Vec<TabId>,
    #[serde(default)]
    pub active_tab: Option<TabId>,
}

impl Pane {
    pub fn new() -> Self {
        Self {
            id: PaneId::new(),
            tabs: Vec::new(),
            active_tab: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

impl Default for Pane {
    fn default() -> Self {
        Self::new()
    }
}

/// A named binding from a workspace slot to a remote target. Owns no
/// transport state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
    pub target_key: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub theme_override: Option<String>,
    #[serde(default)]
    pub color_hex: Option<String>,
}

impl Tab {
    pub fn new(target_key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: TabId::new(),
            target_key: target_key.into(),
            title: title.into(),
            created_at: Utc::now(),
            theme_override: None,
            color_hex: None,
        }
    }
}

/// The serialized workspace: written after every structural change, read
/// once at startup.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceSnapshot {
    pub panes: Vec<Pane>,
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub focused_pane: Option<PaneId>,
}
