//! Preference store backed by the TOML config file.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use harbor_session::PreferenceStore;
use tracing::warn;

/// Persists `editor_redirect.disabled` through the config file so the
/// suppression choice survives restarts. The flag is cached in memory;
/// the file write happens on disable.
pub struct TomlPreferenceStore {
    path: PathBuf,
    disabled: AtomicBool,
}

impl TomlPreferenceStore {
    pub fn new(path: PathBuf, initial_disabled: bool) -> Self {
        Self {
            path,
            disabled: AtomicBool::new(initial_disabled),
        }
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn editor_redirect_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    fn disable_editor_redirect(&self) {
        self.disabled.store(true, Ordering::Relaxed);
        let mut config = harbor_config::load_from_path(&self.path).unwrap_or_default();
        config.editor_redirect.disabled = true;
        if let Err(e) = harbor_config::save_config_to_path(&config, &self.path) {
            warn!("failed to persist editor redirect preference: {e}");
        }
    }
}
