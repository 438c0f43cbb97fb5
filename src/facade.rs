//! The composition root: wires every component together and exposes the
//! external command surface (§6) as a single entry point.
//!
//! No component holds a handle to another; they share only the `EventBus`
//! and, where needed, a cloned [`StateService`]. `ClassicBrowserService` is
//! the only thing that holds all of them at once.

use std::collections::HashMap;

use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::event_bus::{CoreEvent, EventBus, EventKind};
use crate::ids::{TabId, WindowId};
use crate::navigation_service::{ContextMenuAction, NavigationService};
use crate::renderer::Snapshot;
use crate::scene::{Color, Scene};
use crate::state::{Bounds, FreezeState, OutboundUpdate, StateService, WindowState};
use crate::tab_service::TabService;
use crate::view_manager::ViewManager;
use crate::view_pool::{RendererFactory, ViewPool};
use crate::snapshot_store::SnapshotStore;

/// A single logical-window descriptor as carried by the inbound
/// `WINDOW_STATE_UPDATE` message (§6). Only `"classic-browser"` entries are
/// retained by the Core; everything else is a different window type this
/// crate does not model.
#[derive(Debug, Clone, PartialEq)]
pub struct HostWindowDescriptor {
    pub id: WindowId,
    pub window_type: String,
    pub z_index: i32,
    pub is_focused: bool,
    pub is_minimized: bool,
    pub freeze_state: Option<FreezeState>,
}

/// The external command surface (§6), typed as a closed enum per the design
/// note on dynamic payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommand {
    CreateBrowserView { window_id: WindowId, bounds: Bounds, url: Option<String> },
    DestroyBrowserView { window_id: WindowId },
    CreateTab { window_id: WindowId, make_active: bool },
    SwitchTab { window_id: WindowId, tab_id: TabId },
    CloseTab { window_id: WindowId, tab_id: TabId },
    LoadUrl { window_id: WindowId, url: String },
    NavigateBack { window_id: WindowId },
    NavigateForward { window_id: WindowId },
    Reload { window_id: WindowId, ignore_cache: bool },
    Stop { window_id: WindowId },
    SetBounds { window_id: WindowId, bounds: Bounds },
    SetBackgroundColor { window_id: WindowId, color: Color },
    SetVisibility { window_id: WindowId, visible: bool },
    CaptureSnapshot { window_id: WindowId },
    FreezeWindow { window_id: WindowId },
    UnfreezeWindow { window_id: WindowId },
    GetBrowserState { window_id: WindowId },
    UpdateTabBookmarkStatus { window_id: WindowId, tab_id: TabId, bookmarked: bool },
    RefreshTabState { window_id: WindowId },
    HideContextMenuOverlay { window_id: WindowId },
    SyncViewStackingOrder { ordered_windows: Vec<WindowId> },
    ShowAndFocusView { window_id: WindowId },
    ExecuteContextMenuAction { window_id: WindowId, action: ContextMenuAction },
    DestroyAllBrowserViews,
}

/// The result of dispatching a [`CoreCommand`]; most commands produce
/// nothing interesting and return `Unit`.
#[derive(Debug, Clone, PartialEq)]
pub enum CoreCommandOutcome {
    Unit,
    TabCreated(TabId),
    WindowState(Option<WindowState>),
    Snapshot(Option<(String, Snapshot)>),
}

/// Composition root for the Classic Browser Core.
pub struct ClassicBrowserService {
    bus: EventBus,
    state: StateService,
    tabs: TabService,
    nav: NavigationService,
    pool: ViewPool,
    snapshots: SnapshotStore,
    view_manager: ViewManager,
    scene: Box<dyn Scene>,
    host_windows: HashMap<WindowId, HostWindowDescriptor>,
}

impl ClassicBrowserService {
    pub fn new(
        config: CoreConfig,
        renderer_factory: Box<dyn RendererFactory>,
        scene: Box<dyn Scene>,
        outbound_tx: tokio::sync::mpsc::UnboundedSender<OutboundUpdate>,
    ) -> Self {
        let bus = EventBus::new();
        let state = StateService::new(bus.clone(), &config, outbound_tx);
        let tabs = TabService::new(state.clone());
        let nav = NavigationService::new(state.clone(), config.clone());
        let pool = ViewPool::new(bus.clone(), config.clone(), renderer_factory);
        let snapshots = SnapshotStore::new(state.clone(), config.clone());
        let view_manager = ViewManager::new(config);

        let snapshots_for_eviction = snapshots.clone();
        bus.subscribe(EventKind::TabSnapshotCaptured, move |event| {
            if let CoreEvent::TabSnapshotCaptured { window_id, tab_id, snapshot } = event {
                snapshots_for_eviction.record_captured(*window_id, *tab_id, snapshot.clone());
            }
        });

        Self {
            bus,
            state,
            tabs,
            nav,
            pool,
            snapshots,
            view_manager,
            scene,
            host_windows: HashMap::new(),
        }
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }

    /// Thin match wrapper over the inherent methods below; hosts that want
    /// to log or replay the exact command stream go through here instead.
    pub fn dispatch(&mut self, command: CoreCommand) -> Result<CoreCommandOutcome, CoreError> {
        match command {
            CoreCommand::CreateBrowserView { window_id, bounds, url } => {
                self.create_browser_view(window_id, bounds, url)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::DestroyBrowserView { window_id } => {
                self.destroy_browser_view(window_id);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::CreateTab { window_id, make_active } => {
                Ok(CoreCommandOutcome::TabCreated(self.create_tab(window_id, make_active)?))
            }
            CoreCommand::SwitchTab { window_id, tab_id } => {
                self.switch_tab(window_id, tab_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::CloseTab { window_id, tab_id } => {
                self.close_tab(window_id, tab_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::LoadUrl { window_id, url } => {
                self.load_url(window_id, &url)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::NavigateBack { window_id } => {
                self.navigate_back(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::NavigateForward { window_id } => {
                self.navigate_forward(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::Reload { window_id, ignore_cache } => {
                self.reload(window_id, ignore_cache)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::Stop { window_id } => {
                self.stop(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::SetBounds { window_id, bounds } => {
                self.set_bounds(window_id, bounds)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::SetBackgroundColor { window_id, color } => {
                self.set_background_color(window_id, color);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::SetVisibility { window_id, visible } => {
                self.set_visibility(window_id, visible);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::CaptureSnapshot { window_id } => {
                Ok(CoreCommandOutcome::Snapshot(self.capture_snapshot(window_id)))
            }
            CoreCommand::FreezeWindow { window_id } => {
                self.freeze_window(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::UnfreezeWindow { window_id } => {
                self.unfreeze_window(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::GetBrowserState { window_id } => {
                Ok(CoreCommandOutcome::WindowState(self.get_browser_state(window_id)))
            }
            CoreCommand::UpdateTabBookmarkStatus { window_id, tab_id, bookmarked } => {
                self.update_tab_bookmark_status(window_id, tab_id, bookmarked);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::RefreshTabState { window_id } => {
                self.refresh_tab_state(window_id)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::HideContextMenuOverlay { window_id } => {
                self.hide_context_menu_overlay(window_id);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::SyncViewStackingOrder { ordered_windows } => {
                self.sync_view_stacking_order(&ordered_windows);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::ShowAndFocusView { window_id } => {
                self.show_and_focus_view(window_id);
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::ExecuteContextMenuAction { window_id, action } => {
                self.execute_context_menu_action(window_id, action)?;
                Ok(CoreCommandOutcome::Unit)
            }
            CoreCommand::DestroyAllBrowserViews => {
                self.destroy_all_browser_views();
                Ok(CoreCommandOutcome::Unit)
            }
        }
    }

    pub fn create_browser_view(&mut self, window_id: WindowId, bounds: Bounds, url: Option<String>) -> Result<(), CoreError> {
        let tab_id = TabId::new();
        let mut tab = crate::state::TabState::new_blank(tab_id, window_id, true);
        if let Some(ref url) = url {
            tab.url = url.clone();
        }
        let window = WindowState {
            window_id,
            tabs: vec![tab],
            active_tab_id: tab_id,
            bounds,
            freeze_state: FreezeState::Active,
            tab_group_id: None,
            tab_group_title: None,
        };
        self.state.set_state(window_id, window, true);
        self.reconcile(window_id, None)
    }

    pub fn destroy_browser_view(&mut self, window_id: WindowId) {
        if let Some(window) = self.state.remove_state(window_id) {
            for tab in &window.tabs {
                self.pool.release(tab.id);
            }
        }
        self.pool.cleanup_window_mappings(window_id);
        self.snapshots.clear_snapshot(window_id);
        self.host_windows.remove(&window_id);
    }

    pub fn create_tab(&mut self, window_id: WindowId, make_active: bool) -> Result<TabId, CoreError> {
        let previous = self.state.get_state(window_id);
        let tab_id = self.tabs.create(window_id, make_active)?;
        self.reconcile(window_id, previous)?;
        Ok(tab_id)
    }

    pub fn switch_tab(&mut self, window_id: WindowId, tab_id: TabId) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.tabs.switch(window_id, tab_id)?;
        self.reconcile(window_id, previous)
    }

    pub fn close_tab(&mut self, window_id: WindowId, tab_id: TabId) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.tabs.close(window_id, tab_id)?;
        self.reconcile(window_id, previous)
    }

    pub fn load_url(&mut self, window_id: WindowId, url: &str) -> Result<(), CoreError> {
        self.nav.load_url(&mut self.pool, window_id, url)
    }

    pub fn navigate_back(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        self.nav.go_back(&mut self.pool, window_id)
    }

    pub fn navigate_forward(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        self.nav.go_forward(&mut self.pool, window_id)
    }

    pub fn reload(&mut self, window_id: WindowId, ignore_cache: bool) -> Result<(), CoreError> {
        self.nav.reload(&mut self.pool, window_id, ignore_cache)
    }

    pub fn stop(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        self.nav.stop(&mut self.pool, window_id)
    }

    pub fn set_bounds(&mut self, window_id: WindowId, bounds: Bounds) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.state.set_bounds(window_id, bounds);
        self.reconcile(window_id, previous)
    }

    pub fn set_background_color(&mut self, window_id: WindowId, color: Color) {
        if let Some(window) = self.state.get_state(window_id) {
            self.scene.set_background_color(window.active_tab_id, color);
        }
    }

    pub fn set_visibility(&mut self, window_id: WindowId, visible: bool) {
        if let Some(window) = self.state.get_state(window_id) {
            self.scene.set_visible(window.active_tab_id, visible);
        }
    }

    pub fn capture_snapshot(&mut self, window_id: WindowId) -> Option<(String, Snapshot)> {
        self.snapshots.capture_snapshot(&mut self.pool, window_id)
    }

    pub fn freeze_window(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.snapshots.freeze_window(&mut self.pool, window_id)?;
        self.reconcile(window_id, previous)
    }

    pub fn unfreeze_window(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.snapshots.unfreeze_window(window_id);
        self.reconcile(window_id, previous)
    }

    pub fn get_browser_state(&self, window_id: WindowId) -> Option<WindowState> {
        self.state.get_state(window_id)
    }

    pub fn update_tab_bookmark_status(&mut self, window_id: WindowId, tab_id: TabId, bookmarked: bool) {
        self.state.update_tab(
            window_id,
            tab_id,
            crate::state::TabStateDelta { is_bookmarked: Some(bookmarked), ..Default::default() },
        );
    }

    pub fn refresh_tab_state(&mut self, window_id: WindowId) -> Result<(), CoreError> {
        let previous = self.state.get_state(window_id);
        self.reconcile(window_id, previous)
    }

    pub fn hide_context_menu_overlay(&mut self, window_id: WindowId) {
        self.scene.hide_context_menu_overlay(window_id);
    }

    pub fn sync_view_stacking_order(&mut self, ordered_windows: &[WindowId]) {
        self.view_manager.on_z_order_update(self.scene.as_mut(), ordered_windows);
    }

    pub fn show_and_focus_view(&mut self, window_id: WindowId) {
        self.view_manager.on_focus_changed(self.scene.as_mut(), window_id, true);
    }

    pub fn execute_context_menu_action(&mut self, window_id: WindowId, action: ContextMenuAction) -> Result<(), CoreError> {
        self.nav.execute_context_menu_action(&mut self.pool, window_id, action)
    }

    pub fn destroy_all_browser_views(&mut self) {
        let windows: Vec<WindowId> = self.state.get_all_states().iter().map(|w| w.window_id).collect();
        for window_id in windows {
            self.destroy_browser_view(window_id);
        }
        self.pool.cleanup();
        self.snapshots.clear_all_snapshots();
    }

    fn reconcile(&mut self, window_id: WindowId, previous: Option<WindowState>) -> Result<(), CoreError> {
        let Some(new_state) = self.state.get_state(window_id) else {
            return Ok(());
        };
        let is_navigation_relevant = crate::state::is_navigation_relevant(previous.as_ref(), &new_state);
        self.view_manager
            .reconcile(self.scene.as_mut(), &mut self.pool, previous.as_ref(), &new_state, is_navigation_relevant)
    }

    /// Applies an inbound `WINDOW_STATE_UPDATE`: retains only
    /// `"classic-browser"` entries, diffs against the previously-seen host
    /// descriptors, and emits the corresponding focus/minimize/restore/
    /// z-order events and freeze-state transitions.
    pub fn apply_window_state_update(&mut self, descriptors: Vec<HostWindowDescriptor>) -> Result<(), CoreError> {
        let browser_windows: Vec<HostWindowDescriptor> =
            descriptors.into_iter().filter(|d| d.window_type == "classic-browser").collect();

        for descriptor in &browser_windows {
            let previous = self.host_windows.get(&descriptor.id).cloned();

            let focus_changed = previous.as_ref().map(|p| p.is_focused != descriptor.is_focused).unwrap_or(descriptor.is_focused);
            if focus_changed {
                self.bus.emit(CoreEvent::WindowFocusChanged { window_id: descriptor.id, focused: descriptor.is_focused });
                self.view_manager.on_focus_changed(self.scene.as_mut(), descriptor.id, descriptor.is_focused);
            }

            let was_minimized = previous.as_ref().map(|p| p.is_minimized).unwrap_or(false);
            if descriptor.is_minimized && !was_minimized {
                self.bus.emit(CoreEvent::WindowMinimized { window_id: descriptor.id });
                self.view_manager.on_minimized(self.scene.as_mut(), descriptor.id);
            } else if !descriptor.is_minimized && was_minimized {
                self.bus.emit(CoreEvent::WindowRestored { window_id: descriptor.id });
                if let Some(window) = self.state.get_state(descriptor.id) {
                    self.view_manager.on_restored(self.scene.as_mut(), &mut self.pool, &window)?;
                }
            }

            if let Some(freeze_state) = descriptor.freeze_state.clone() {
                let changed = previous.as_ref().and_then(|p| p.freeze_state.clone()).as_ref() != Some(&freeze_state);
                if changed {
                    let previous_state = self.state.get_state(descriptor.id);
                    self.state.set_freeze_state(descriptor.id, freeze_state);
                    self.reconcile(descriptor.id, previous_state)?;
                }
            }

            self.host_windows.insert(descriptor.id, descriptor.clone());
        }

        let z_changed = {
            let mut ordered: Vec<&HostWindowDescriptor> =
                browser_windows.iter().filter(|d| !d.is_minimized).collect();
            ordered.sort_by_key(|d| d.z_index);
            let membership_changed = ordered.len() != self.host_windows.len();
            membership_changed
                || ordered.iter().any(|d| {
                    self.host_windows
                        .get(&d.id)
                        .map(|prev| prev.z_index != d.z_index)
                        .unwrap_or(true)
                })
        };
        if z_changed {
            let mut ordered: Vec<WindowId> =
                browser_windows.iter().filter(|d| !d.is_minimized).map(|d| d.id).collect();
            ordered.sort_by_key(|id| browser_windows.iter().find(|d| d.id == *id).map(|d| d.z_index).unwrap_or(0));
            self.bus.emit(CoreEvent::WindowZOrderUpdate { ordered_windows: ordered.clone() });
            self.view_manager.on_z_order_update(self.scene.as_mut(), &ordered);
        }

        Ok(())
    }
}
