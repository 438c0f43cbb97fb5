//! Pure tab create/switch/close policy on top of [`StateService`] (§4.5).
//!
//! `TabService` holds no renderer or scene state of its own; it only decides
//! *which* tab becomes active and *when* a replacement tab is needed, then
//! asks `StateService` to apply the result.

use crate::errors::CoreError;
use crate::ids::{TabId, WindowId};
use crate::state::{StateService, TabState};

/// Tab lifecycle policy: create, switch, close (§4.5).
#[derive(Clone)]
pub struct TabService {
    state: StateService,
}

impl TabService {
    pub fn new(state: StateService) -> Self {
        Self { state }
    }

    /// Creates a tab in `window_id`. The tab starts blank (`"New Tab"`,
    /// `loading_progress = 0`); its `pool_state` is `Loading` if it becomes
    /// active, `Inactive` otherwise.
    pub fn create(&self, window_id: WindowId, make_active: bool) -> Result<TabId, CoreError> {
        self.state
            .get_state(window_id)
            .ok_or(CoreError::UnknownWindow(window_id))?;

        let tab_id = TabId::new();
        let tab = TabState::new_blank(tab_id, window_id, make_active);
        self.state.add_tab(window_id, tab);
        if make_active {
            self.state.set_active_tab(window_id, tab_id);
        }
        Ok(tab_id)
    }

    /// Sets the active tab. Existence of `tab_id` within `window_id` is
    /// `StateService`'s concern; this call is a thin, unchecked pass-through
    /// per the documented division of responsibility.
    pub fn switch(&self, window_id: WindowId, tab_id: TabId) -> Result<(), CoreError> {
        self.state
            .get_state(window_id)
            .ok_or(CoreError::UnknownWindow(window_id))?;
        self.state.set_active_tab(window_id, tab_id);
        Ok(())
    }

    /// Closes `tab_id` in `window_id`.
    ///
    /// If it is the window's only tab, a replacement blank tab is created
    /// and made active *before* the closed tab is removed, so the window is
    /// never observably empty. Otherwise, if the closed tab was active, the
    /// neighbour to its right becomes active, or the neighbour to its left
    /// if the closed tab was rightmost; the new active tab is set before
    /// removal in both cases.
    pub fn close(&self, window_id: WindowId, tab_id: TabId) -> Result<(), CoreError> {
        let window = self
            .state
            .get_state(window_id)
            .ok_or(CoreError::UnknownWindow(window_id))?;

        if !window.tabs.iter().any(|t| t.id == tab_id) {
            return Err(CoreError::UnknownTab(tab_id));
        }

        if window.tabs.len() == 1 {
            let replacement = TabId::new();
            self.state
                .add_tab(window_id, TabState::new_blank(replacement, window_id, true));
            self.state.set_active_tab(window_id, replacement);
            self.state.remove_tab(window_id, tab_id);
            return Ok(());
        }

        if window.active_tab_id == tab_id {
            let closing_index = window
                .tabs
                .iter()
                .position(|t| t.id == tab_id)
                .expect("tab_id presence checked above");
            let neighbour = if closing_index + 1 < window.tabs.len() {
                window.tabs[closing_index + 1].id
            } else {
                window.tabs[closing_index - 1].id
            };
            self.state.set_active_tab(window_id, neighbour);
        }

        self.state.remove_tab(window_id, tab_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoreConfig;
    use crate::event_bus::EventBus;
    use crate::state::{Bounds, FreezeState, WindowState};

    fn service() -> TabService {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let state = StateService::new(EventBus::new(), &CoreConfig::default(), tx);
        TabService::new(state)
    }

    fn seed_window(tabs: &TabService, window_id: WindowId) {
        let first = TabId::new();
        let window = WindowState {
            window_id,
            tabs: vec![TabState::new_blank(first, window_id, true)],
            active_tab_id: first,
            bounds: Bounds { x: 0, y: 0, width: 800, height: 600 },
            freeze_state: FreezeState::Active,
            tab_group_id: None,
            tab_group_title: None,
        };
        // reach into the underlying StateService to seed directly
        tabs.state.set_state(window_id, window, true);
    }

    #[tokio::test]
    async fn create_appends_and_optionally_activates() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);

        let t2 = svc.create(w, true).unwrap();
        let state = svc.state.get_state(w).unwrap();
        assert_eq!(state.tabs.len(), 2);
        assert_eq!(state.active_tab_id, t2);
    }

    #[tokio::test]
    async fn closing_only_tab_replaces_it_and_window_is_never_empty() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);
        let only_tab = svc.state.get_state(w).unwrap().active_tab_id;

        svc.close(w, only_tab).unwrap();

        let state = svc.state.get_state(w).unwrap();
        assert_eq!(state.tabs.len(), 1);
        assert_ne!(state.tabs[0].id, only_tab);
        assert_eq!(state.active_tab_id, state.tabs[0].id);
    }

    #[tokio::test]
    async fn closing_active_middle_tab_activates_right_neighbour() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);
        let t1 = svc.state.get_state(w).unwrap().active_tab_id;
        let t2 = svc.create(w, false).unwrap();
        let t3 = svc.create(w, false).unwrap();
        svc.switch(w, t2).unwrap();

        svc.close(w, t2).unwrap();

        let state = svc.state.get_state(w).unwrap();
        assert_eq!(state.active_tab_id, t3);
        assert_eq!(state.tabs.iter().map(|t| t.id).collect::<Vec<_>>(), vec![t1, t3]);
    }

    #[tokio::test]
    async fn closing_active_rightmost_tab_activates_left_neighbour() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);
        let t1 = svc.state.get_state(w).unwrap().active_tab_id;
        let t2 = svc.create(w, false).unwrap();
        svc.switch(w, t2).unwrap();

        svc.close(w, t2).unwrap();

        let state = svc.state.get_state(w).unwrap();
        assert_eq!(state.active_tab_id, t1);
    }

    #[tokio::test]
    async fn closing_inactive_tab_does_not_change_active_tab() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);
        let t1 = svc.state.get_state(w).unwrap().active_tab_id;
        let t2 = svc.create(w, false).unwrap();

        svc.close(w, t2).unwrap();

        let state = svc.state.get_state(w).unwrap();
        assert_eq!(state.active_tab_id, t1);
        assert_eq!(state.tabs.len(), 1);
    }

    #[tokio::test]
    async fn close_unknown_tab_is_an_error() {
        let svc = service();
        let w = WindowId::new();
        seed_window(&svc, w);
        assert!(matches!(svc.close(w, TabId::new()), Err(CoreError::UnknownTab(_))));
    }

    #[tokio::test]
    async fn operating_on_unknown_window_is_an_error() {
        let svc = service();
        assert!(matches!(svc.create(WindowId::new(), true), Err(CoreError::UnknownWindow(_))));
    }
}
