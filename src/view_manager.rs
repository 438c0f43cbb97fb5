//! Reconciles authoritative [`WindowState`] with the host scene graph (§4.7).
//!
//! Renderers are addressed by `TabId` throughout (the pool's native key), so
//! the cohort maps below (`WindowId -> TabId`) double as the disambiguation
//! the original design needs a separate `Renderer -> TabId` map for: looking
//! a tab up via "current active tab" instead of via the cohort membership
//! itself is the bug class this module exists to avoid.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use url::Url;

use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::ids::{TabId, WindowId};
use crate::scene::Scene;
use crate::state::{FreezeState, TabState, WindowState};
use crate::url_policy::{is_navigable, urls_equivalent};
use crate::view_pool::ViewPool;

fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
}

fn is_blank(url: &str) -> bool {
    url.is_empty() || url == "about:blank"
}

/// Tracks which tab each window's renderer cohort currently presents, and
/// reconciles that against authoritative state on every `state-changed`.
pub struct ViewManager {
    config: CoreConfig,
    active: HashMap<WindowId, TabId>,
    detached: HashMap<WindowId, TabId>,
    frozen: HashMap<WindowId, TabId>,
    last_programmatic_nav: HashMap<WindowId, u64>,
}

impl ViewManager {
    pub fn new(config: CoreConfig) -> Self {
        Self {
            config,
            active: HashMap::new(),
            detached: HashMap::new(),
            frozen: HashMap::new(),
            last_programmatic_nav: HashMap::new(),
        }
    }

    /// Drives the reconciliation described in §4.7, steps 1-4.
    pub fn reconcile(
        &mut self,
        scene: &mut dyn Scene,
        pool: &mut ViewPool,
        previous: Option<&WindowState>,
        new: &WindowState,
        is_navigation_relevant: bool,
    ) -> Result<(), CoreError> {
        if let Some(previous) = previous {
            self.reap_removed_tabs(pool, previous, new);
        }

        let was_frozen = previous.map(|p| p.freeze_state.is_frozen_like()).unwrap_or(false);
        let is_frozen = new.freeze_state.is_frozen_like();

        if is_frozen && !was_frozen {
            if let Some(&tab_id) = self.active.get(&new.window_id) {
                scene.set_visible(tab_id, false);
                self.active.remove(&new.window_id);
                self.frozen.insert(new.window_id, tab_id);
            }
            return Ok(());
        }

        if !is_frozen && was_frozen {
            if let Some(tab_id) = self.frozen.remove(&new.window_id) {
                scene.set_visible(tab_id, true);
                scene.set_bounds(tab_id, new.bounds);
                self.active.insert(new.window_id, tab_id);
                if let Some(renderer) = pool.get(tab_id) {
                    if let Some(tab) = new.tab(tab_id) {
                        Self::ensure_view_navigated_to_tab(
                            &self.config,
                            &mut self.last_programmatic_nav,
                            new.window_id,
                            renderer,
                            tab,
                        )?;
                    }
                }
            }
            return Ok(());
        }

        let current_tab_id = self.active.get(&new.window_id).copied();
        if current_tab_id == Some(new.active_tab_id) {
            let bounds_changed = previous.map(|p| p.bounds != new.bounds).unwrap_or(true);
            if bounds_changed {
                scene.set_bounds(new.active_tab_id, new.bounds);
            }
            if is_navigation_relevant {
                if let Some(tab) = new.active_tab() {
                    if let Some(renderer) = pool.get(new.active_tab_id) {
                        Self::ensure_view_navigated_to_tab(
                            &self.config,
                            &mut self.last_programmatic_nav,
                            new.window_id,
                            renderer,
                            tab,
                        )?;
                    }
                }
            }
        } else {
            if let Some(old_tab_id) = current_tab_id {
                scene.detach(old_tab_id);
            }
            let renderer = pool.acquire(new.active_tab_id, new.window_id)?;
            let blank = is_blank(renderer.current_url());
            scene.attach(new.active_tab_id, new.bounds);
            scene.set_visible(new.active_tab_id, true);
            self.active.insert(new.window_id, new.active_tab_id);

            if blank {
                if let Some(tab) = new.active_tab() {
                    if let Some(renderer) = pool.get(new.active_tab_id) {
                        Self::ensure_view_navigated_to_tab(
                            &self.config,
                            &mut self.last_programmatic_nav,
                            new.window_id,
                            renderer,
                            tab,
                        )?;
                    }
                }
            }
        }

        Ok(())
    }

    fn reap_removed_tabs(&mut self, pool: &mut ViewPool, previous: &WindowState, new: &WindowState) {
        for old_tab in &previous.tabs {
            if !new.tabs.iter().any(|t| t.id == old_tab.id) {
                pool.release(old_tab.id);
            }
        }
    }

    /// Skips if `tab.url` is blank, already equivalent to the view's current
    /// URL, the renderer is already loading it, or fewer than
    /// `config.reload_anti_loop_window` has passed since the last
    /// programmatic navigation on this window's view.
    fn ensure_view_navigated_to_tab(
        config: &CoreConfig,
        last_programmatic_nav: &mut HashMap<WindowId, u64>,
        window_id: WindowId,
        renderer: &mut dyn crate::renderer::Renderer,
        tab: &TabState,
    ) -> Result<(), CoreError> {
        if is_blank(&tab.url) {
            return Ok(());
        }
        let Ok(target) = Url::parse(&tab.url) else {
            return Ok(());
        };

        if let Ok(current) = Url::parse(renderer.current_url()) {
            if urls_equivalent(&current, &target, config) {
                return Ok(());
            }
        }

        if renderer.is_loading() && renderer.current_url() == tab.url {
            return Ok(());
        }

        let since_last = last_programmatic_nav
            .get(&window_id)
            .map(|t| now_millis().saturating_sub(*t))
            .unwrap_or(u64::MAX);
        if since_last < config.reload_anti_loop_window.as_millis() as u64 {
            return Ok(());
        }

        if !is_navigable(&target) {
            return Err(CoreError::InsecureUrl { url: tab.url.clone() });
        }

        renderer.load(&target)?;
        last_programmatic_nav.insert(window_id, now_millis());
        Ok(())
    }

    /// Brings the active view to the top of the scene graph.
    pub fn on_focus_changed(&self, scene: &mut dyn Scene, window_id: WindowId, focused: bool) {
        if focused {
            if let Some(&tab_id) = self.active.get(&window_id) {
                scene.bring_to_top(tab_id);
            }
        }
    }

    /// Detaches the active view into the detached cohort.
    pub fn on_minimized(&mut self, scene: &mut dyn Scene, window_id: WindowId) {
        if let Some(tab_id) = self.active.remove(&window_id) {
            scene.detach(tab_id);
            self.detached.insert(window_id, tab_id);
        }
    }

    /// Re-attaches with current bounds and navigates if needed.
    pub fn on_restored(
        &mut self,
        scene: &mut dyn Scene,
        pool: &mut ViewPool,
        new: &WindowState,
    ) -> Result<(), CoreError> {
        if let Some(tab_id) = self.detached.remove(&new.window_id) {
            scene.attach(tab_id, new.bounds);
            scene.set_visible(tab_id, true);
            self.active.insert(new.window_id, tab_id);
            if let (Some(tab), Some(renderer)) = (new.tab(tab_id), pool.get(tab_id)) {
                Self::ensure_view_navigated_to_tab(
                    &self.config,
                    &mut self.last_programmatic_nav,
                    new.window_id,
                    renderer,
                    tab,
                )?;
            }
        }
        Ok(())
    }

    /// Iterates non-minimized windows in ascending z-index and re-attaches
    /// each to the scene's top. Frozen views participate.
    pub fn on_z_order_update(&self, scene: &mut dyn Scene, ordered_windows: &[WindowId]) {
        for window_id in ordered_windows {
            if let Some(&tab_id) = self.active.get(window_id).or_else(|| self.frozen.get(window_id)) {
                scene.bring_to_top(tab_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::renderer::{Renderer, SimulatedRenderer};
    use crate::scene::ListScene;
    use crate::state::Bounds;
    use crate::view_pool::{ClosureRendererFactory, RendererFactory};

    fn pool() -> ViewPool {
        let factory: Box<dyn RendererFactory> =
            Box::new(ClosureRendererFactory(|| Ok(Box::new(SimulatedRenderer::new()) as Box<dyn Renderer>)));
        ViewPool::new(EventBus::new(), CoreConfig::default(), factory)
    }

    fn window(window_id: WindowId, tab_id: TabId, url: &str, freeze: FreezeState) -> WindowState {
        let mut tab = TabState::new_blank(tab_id, window_id, true);
        tab.url = url.to_string();
        WindowState {
            window_id,
            tabs: vec![tab],
            active_tab_id: tab_id,
            bounds: Bounds { x: 0, y: 0, width: 800, height: 600 },
            freeze_state: freeze,
            tab_group_id: None,
            tab_group_title: None,
        }
    }

    #[test]
    fn tab_switch_attaches_new_view_and_detaches_old() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t1 = TabId::new();
        let t2 = TabId::new();

        let s1 = window(w, t1, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &s1, true).unwrap();
        assert!(scene.is_attached(t1));

        let mut s2 = s1.clone();
        s2.tabs.push(TabState::new_blank(t2, w, false));
        s2.active_tab_id = t2;
        vm.reconcile(&mut scene, &mut p, Some(&s1), &s2, true).unwrap();

        assert!(!scene.is_attached(t1));
        assert!(scene.is_attached(t2));
    }

    #[test]
    fn freezing_hides_active_view_but_keeps_it_attached() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t = TabId::new();

        let active = window(w, t, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &active, true).unwrap();

        let frozen = window(w, t, "https://example.com/", FreezeState::Frozen { snapshot_url: "data:x".into() });
        vm.reconcile(&mut scene, &mut p, Some(&active), &frozen, false).unwrap();

        assert!(scene.is_attached(t));
        assert!(!scene.is_visible(t));
    }

    #[test]
    fn reaps_renderers_for_removed_tabs() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t1 = TabId::new();
        let t2 = TabId::new();

        let mut s1 = window(w, t1, "https://example.com/", FreezeState::Active);
        s1.tabs.push(TabState::new_blank(t2, w, false));
        vm.reconcile(&mut scene, &mut p, None, &s1, true).unwrap();
        p.acquire(t2, w).unwrap();
        assert!(p.is_resident(t2));

        let mut s2 = s1.clone();
        s2.tabs.retain(|t| t.id != t2);
        vm.reconcile(&mut scene, &mut p, Some(&s1), &s2, true).unwrap();

        assert!(!p.is_resident(t2));
    }

    #[test]
    fn reload_anti_loop_suppresses_navigation_within_window() {
        let config = CoreConfig::builder().reload_anti_loop_window(std::time::Duration::from_millis(1000)).build().unwrap();
        let mut vm = ViewManager::new(config.clone());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t = TabId::new();

        let s1 = window(w, t, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &s1, true).unwrap();

        let s2 = window(w, t, "https://different.example/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, Some(&s1), &s2, true).unwrap();
        let url_after_first = p.get(t).unwrap().current_url().to_string();

        let s3 = window(w, t, "https://yet-another.example/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, Some(&s2), &s3, true).unwrap();
        let url_after_second = p.get(t).unwrap().current_url().to_string();

        assert_eq!(url_after_first, url_after_second);
    }

    #[test]
    fn bounds_change_on_unchanged_tab_propagates_to_scene() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t = TabId::new();

        let s1 = window(w, t, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &s1, true).unwrap();
        assert_eq!(scene.bounds(t), Some(s1.bounds));

        let mut s2 = s1.clone();
        s2.bounds = Bounds { x: 0, y: 0, width: 1024, height: 768 };
        vm.reconcile(&mut scene, &mut p, Some(&s1), &s2, false).unwrap();
        assert_eq!(scene.bounds(t), Some(s2.bounds));
    }

    #[test]
    fn unfreeze_propagates_current_bounds() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t = TabId::new();

        let active = window(w, t, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &active, true).unwrap();

        let frozen = window(w, t, "https://example.com/", FreezeState::Frozen { snapshot_url: "data:x".into() });
        vm.reconcile(&mut scene, &mut p, Some(&active), &frozen, false).unwrap();

        let mut restored = frozen.clone();
        restored.freeze_state = FreezeState::Active;
        restored.bounds = Bounds { x: 10, y: 10, width: 1200, height: 900 };
        vm.reconcile(&mut scene, &mut p, Some(&frozen), &restored, false).unwrap();

        assert_eq!(scene.bounds(t), Some(restored.bounds));
    }

    #[test]
    fn on_restored_reattaches_with_current_bounds() {
        let mut vm = ViewManager::new(CoreConfig::default());
        let mut scene = ListScene::new();
        let mut p = pool();
        let w = WindowId::new();
        let t = TabId::new();

        let s1 = window(w, t, "https://example.com/", FreezeState::Active);
        vm.reconcile(&mut scene, &mut p, None, &s1, true).unwrap();
        vm.on_minimized(&mut scene, w);
        assert!(!scene.is_attached(t));

        let mut s2 = s1.clone();
        s2.bounds = Bounds { x: 5, y: 5, width: 640, height: 480 };
        vm.on_restored(&mut scene, &mut p, &s2).unwrap();

        assert!(scene.is_attached(t));
        assert_eq!(scene.bounds(t), Some(s2.bounds));
    }
}
