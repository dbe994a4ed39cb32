//! User preference surface.
//!
//! A single persisted boolean disables the editor-redirection prompt
//! permanently. Disabling is one-way from the controller's point of view;
//! only external configuration can turn the prompt back on.

use std::sync::atomic::{AtomicBool, Ordering};

pub trait PreferenceStore: Send + Sync {
    fn editor_redirect_disabled(&self) -> bool;
    fn disable_editor_redirect(&self);
}

/// In-memory store; the default for tests and embedders without
/// persistence.
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    disabled: AtomicBool,
}

impl MemoryPreferenceStore {
    pub fn new(disabled: bool) -> Self {
        Self {
            disabled: AtomicBool::new(disabled),
        }
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn editor_redirect_disabled(&self) -> bool {
        self.disabled.load(Ordering::Relaxed)
    }

    fn disable_editor_redirect(&self) {
        self.disabled.store(true, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disable_is_one_way() {
        let store = MemoryPreferenceStore::default();
        assert!(!store.editor_redirect_disabled());
        store.disable_editor_redirect();
        assert!(store.editor_redirect_disabled());
    }

    #[test]
    fn can_start_disabled() {
        let store = MemoryPreferenceStore::new(true);
        assert!(store.editor_redirect_disabled());
    }
}
