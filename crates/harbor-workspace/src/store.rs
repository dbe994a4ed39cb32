//! The workspace store owns the pane/tab graph and the controller
//! registry.
//!
//! It is the only component allowed to create or destroy session
//! controllers, it enforces the capacity invariants after every mutation,
//! and it persists the snapshot on every structural change. All mutation
//! happens through its methods on the coordinating context; nothing else
//! holds a controller reference past its tab's removal.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use harbor_common::{PaneId, TabId};
use harbor_session::{SessionController, SessionDeps, SessionTuning};

use crate::layout::{Pane, Tab, WorkspaceSnapshot};
use crate::persist::SnapshotStore;

/// Capacity limits for the pane/tab graph.
#[derive(Debug, Clone)]
pub struct WorkspaceLimits {
    pub max_panes: usize,
    pub max_tabs: usize,
}

impl Default for WorkspaceLimits {
    fn default() -> Self {
        Self {
            max_panes: 4,
            max_tabs: 12,
        }
    }
}

pub struct WorkspaceStore {
    panes: Vec<Pane>,
    tabs: Vec<Tab>,
    focused: Option<PaneId>,
    controllers: HashMap<TabId, SessionController>,
    limits: WorkspaceLimits,
    snapshots: Arc<dyn SnapshotStore>,
    deps: SessionDeps,
    tuning: SessionTuning,
    auto_connect: bool,
}

impl WorkspaceStore {
    /// A fresh workspace always starts with exactly one empty pane.
    pub fn new(
        limits: WorkspaceLimits,
        snapshots: Arc<dyn SnapshotStore>,
        deps: SessionDeps,
        tuning: SessionTuning,
        auto_connect: bool,
    ) -> Self {
        let pane = Pane::new();
        let focused = Some(pane.id.clone());
        Self {
            panes: vec![pane],
            tabs: Vec::new(),
            focused,
            controllers: HashMap::new(),
            limits,
            snapshots,
            deps,
            tuning,
            auto_connect,
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn focused_pane(&self) -> Option<&PaneId> {
        self.focused.as_ref()
    }

    pub fn tab(&self, id: &TabId) -> Option<&Tab> {
        self.tabs.iter().find(|t| &t.id == id)
    }

    pub fn controller(&self, id: &TabId) -> Option<&SessionController> {
        self.controllers.get(id)
    }

    pub fn controller_mut(&mut self, id: &TabId) -> Option<&mut SessionController> {
        self.controllers.get_mut(id)
    }

    /// The controller behind the focused pane's active tab.
    pub fn focused_controller_mut(&mut self) -> Option<&mut SessionController> {
        let focused = self.focused.clone()?;
        let tab = self
            .panes
            .iter()
            .find(|p| p.id == focused)?
            .active_tab
            .clone()?;
        self.controllers.get_mut(&tab)
    }

    pub fn snapshot(&self) -> WorkspaceSnapshot {
        WorkspaceSnapshot {
            panes: self.panes.clone(),
            tabs: self.tabs.clone(),
            focused_pane: self.focused.clone(),
        }
    }

    // -----------------------------------------------------------------------
    // Public operations
    // -----------------------------------------------------------------------

    /// Open a tab bound to `target_key`.
    ///
    /// Returns `None` (and logs) when the tab table is full or no pane can
    /// take the tab; capacity overflow is surfaced to the caller instead
    /// of silently swallowed, but it is never an error.
    pub fn open_tab(
        &mut self,
        target_key: &str,
        preferred_title: Option<&str>,
        into_focused_pane: bool,
    ) -> Option<TabId> {
        if self.tabs.len() >= self.limits.max_tabs {
            warn!(max = self.limits.max_tabs, "tab limit reached, not opening");
            return None;
        }
        let pane_id = self.select_target_pane(into_focused_pane)?;

        let title = preferred_title.unwrap_or(target_key);
        let tab = Tab::new(target_key, title);
        let tab_id = tab.id.clone();
        self.tabs.push(tab);

        let mut controller = SessionController::new(
            tab_id.clone(),
            target_key,
            self.deps.clone(),
            self.tuning.clone(),
            self.auto_connect,
        );
        if self.auto_connect {
            controller.connect();
        }
        self.controllers.insert(tab_id.clone(), controller);

        let pane = self.panes.iter_mut().find(|p| p.id == pane_id)?;
        pane.tabs = vec![tab_id.clone()];
        pane.active_tab = Some(tab_id.clone());
        self.focused = Some(pane_id);

        info!(target = target_key, tab = %tab_id, "opened tab");
        self.persist();
        Some(tab_id)
    }

    /// Close a tab: tear its controller down, remove the tab, and remove
    /// the pane that held it when that pane is now empty and more than
    /// one pane exists. The last pane is never removed.
    pub fn close_tab(&mut self, tab_id: &TabId) {
        if !self.tabs.iter().any(|t| &t.id == tab_id) {
            return;
        }
        self.remove_controller(tab_id);
        self.tabs.retain(|t| &t.id != tab_id);

        let holder = self
            .panes
            .iter()
            .find(|p| p.tabs.contains(tab_id))
            .map(|p| p.id.clone());
        for pane in &mut self.panes {
            pane.tabs.retain(|id| id != tab_id);
            if pane.active_tab.as_ref() == Some(tab_id) {
                pane.active_tab = None;
            }
        }
        if let Some(holder) = holder {
            let holder_empty = self
                .panes
                .iter()
                .find(|p| p.id == holder)
                .is_some_and(Pane::is_empty);
            if holder_empty && self.panes.len() > 1 {
                self.panes.retain(|p| p.id != holder);
            }
        }

        self.normalize();
        self.persist();
    }

    /// Pure reassignment; no-op when the pane does not exist.
    pub fn focus_pane(&mut self, pane_id: &PaneId) {
        if !self.panes.iter().any(|p| &p.id == pane_id) {
            return;
        }
        self.focused = Some(pane_id.clone());
        if let Some(controller) = self.focused_controller_mut() {
            controller.request_focus();
        }
        self.persist();
    }

    /// No-op unless `pane_id` exists and holds `tab_id`.
    pub fn set_active_tab(&mut self, tab_id: &TabId, pane_id: &PaneId) {
        let Some(pane) = self.panes.iter_mut().find(|p| &p.id == pane_id) else {
            return;
        };
        if !pane.tabs.contains(tab_id) {
            return;
        }
        pane.active_tab = Some(tab_id.clone());
        self.persist();
    }

    /// Load the persisted snapshot, or fall back to a single empty pane.
    /// Controllers are rebuilt for every surviving tab; prior in-flight
    /// sessions are not preserved, only layout and metadata.
    pub fn restore(&mut self) {
        match self.snapshots.load() {
            Some(snapshot) => {
                self.panes = snapshot.panes;
                self.tabs = snapshot.tabs;
                self.focused = snapshot.focused_pane;
            }
            None => {
                let pane = Pane::new();
                self.focused = Some(pane.id.clone());
                self.panes = vec![pane];
                self.tabs = Vec::new();
            }
        }
        self.controllers.clear();
        self.normalize();

        for tab in &self.tabs {
            let mut controller = SessionController::new(
                tab.id.clone(),
                tab.target_key.clone(),
                self.deps.clone(),
                self.tuning.clone(),
                self.auto_connect,
            );
            if self.auto_connect {
                controller.connect();
            }
            self.controllers.insert(tab.id.clone(), controller);
        }
        info!(
            panes = self.panes.len(),
            tabs = self.tabs.len(),
            "workspace restored"
        );
    }

    /// Pump every controller's pending messages. Called from the
    /// embedder's coordinating loop.
    pub fn drain_controllers(&mut self) {
        for controller in self.controllers.values_mut() {
            controller.drain();
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Pane selection order for a new tab: the focused pane if empty (when
    /// requested), any empty pane, a new pane under the cap, else none.
    fn select_target_pane(&mut self, into_focused_pane: bool) -> Option<PaneId> {
        if into_focused_pane {
            if let Some(focused) = &self.focused {
                if self
                    .panes
                    .iter()
                    .find(|p| &p.id == focused)
                    .is_some_and(Pane::is_empty)
                {
                    return Some(focused.clone());
                }
            }
        }
        if let Some(pane) = self.panes.iter().find(|p| p.is_empty()) {
            return Some(pane.id.clone());
        }
        if self.panes.len() < self.limits.max_panes {
            let pane = Pane::new();
            let id = pane.id.clone();
            self.panes.push(pane);
            return Some(id);
        }
        warn!(max = self.limits.max_panes, "pane limit reached, not opening");
        None
    }

    /// Re-establish every structural invariant.
    ///
    /// Each pane claims the first candidate among `[active_tab] + tabs`
    /// that exists and is not already claimed by an earlier pane; a pane
    /// with no qualifying candidate is cleared. Tabs left unclaimed are
    /// detached outright (controller torn down, record deleted) so two
    /// panes can never share one live session.
    fn normalize(&mut self) {
        let existing: HashSet<TabId> = self.tabs.iter().map(|t| t.id.clone()).collect();
        let mut claimed: HashSet<TabId> = HashSet::new();

        for pane in &mut self.panes {
            let mut candidates: Vec<TabId> = Vec::new();
            if let Some(active) = &pane.active_tab {
                candidates.push(active.clone());
            }
            candidates.extend(pane.tabs.iter().cloned());

            let chosen = candidates
                .into_iter()
                .find(|id| existing.contains(id) && !claimed.contains(id));
            match chosen {
                Some(id) => {
                    claimed.insert(id.clone());
                    pane.tabs = vec![id.clone()];
                    pane.active_tab = Some(id);
                }
                None => {
                    pane.tabs.clear();
                    pane.active_tab = None;
                }
            }
        }

        let detached: Vec<TabId> = self
            .tabs
            .iter()
            .map(|t| t.id.clone())
            .filter(|id| !claimed.contains(id))
            .collect();
        for tab_id in detached {
            debug!(tab = %tab_id, "detaching unclaimed tab");
            self.remove_controller(&tab_id);
            self.tabs.retain(|t| t.id != tab_id);
        }

        // A snapshot persisted under larger limits can come back over
        // capacity; the limits win. Later panes and tabs go first.
        if self.panes.len() > self.limits.max_panes {
            let surplus = self.panes.split_off(self.limits.max_panes);
            for pane in surplus {
                for tab_id in &pane.tabs {
                    warn!(tab = %tab_id, "detaching tab beyond pane limit");
                    self.remove_controller(tab_id);
                    self.tabs.retain(|t| &t.id != tab_id);
                }
            }
        }
        while self.tabs.len() > self.limits.max_tabs {
            if let Some(tab) = self.tabs.pop() {
                warn!(tab = %tab.id, "detaching tab beyond tab limit");
                self.remove_controller(&tab.id);
                for pane in &mut self.panes {
                    if pane.tabs.contains(&tab.id) {
                        pane.tabs.clear();
                        pane.active_tab = None;
                    }
                }
            }
        }

        if self.panes.is_empty() {
            self.panes.push(Pane::new());
        }
        let focused_exists = self
            .focused
            .as_ref()
            .is_some_and(|f| self.panes.iter().any(|p| &p.id == f));
        if !focused_exists {
            self.focused = self.panes.first().map(|p| p.id.clone());
        }
    }

    fn remove_controller(&mut self, tab_id: &TabId) {
        if let Some(mut controller) = self.controllers.remove(tab_id) {
            controller.disconnect();
        }
    }

    fn persist(&self) {
        self.snapshots.save(&self.snapshot());
    }
}
