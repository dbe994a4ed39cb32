//! Configuration schema types for Harbor.
//!
//! All structs use `serde(default)` so partial configs work correctly.
//! Missing fields are filled with sensible defaults.

use serde::{Deserialize, Serialize};

/// Current config schema version.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;

// =============================================================================
// Workspace Config
// =============================================================================

/// Pane/tab capacity limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkspaceSection {
    /// Maximum number of panes displayed at once.
    pub max_panes: usize,
    /// Maximum number of open tabs across all panes.
    pub max_tabs: usize,
}

impl Default for WorkspaceSection {
    fn default() -> Self {
        Self {
            max_panes: 4,
            max_tabs: 12,
        }
    }
}

// =============================================================================
// Session Config
// =============================================================================

/// Per-session behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Connect sessions as soon as their tab opens.
    pub auto_connect: bool,
    /// Quiet period before suggestion lookups fire, in milliseconds.
    pub suggest_debounce_ms: u64,
    /// How long to wait for shell integration to report before warning,
    /// in seconds.
    pub integration_probe_secs: u64,
    /// Maximum number of commands kept in the per-session history.
    pub history_cap: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            auto_connect: true,
            suggest_debounce_ms: 120,
            integration_probe_secs: 3,
            history_cap: 500,
        }
    }
}

// =============================================================================
// Editor Redirect Config
// =============================================================================

/// Settings for the terminal-editor interception prompt.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorRedirectSection {
    /// When true, editor commands run in the terminal without prompting.
    pub disabled: bool,
}

// =============================================================================
// Root Config
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HarborConfig {
    pub workspace: WorkspaceSection,
    pub session: SessionSection,
    pub editor_redirect: EditorRedirectSection,
}
