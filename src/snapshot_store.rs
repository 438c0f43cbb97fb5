//! LRU cache of captured bitmaps plus the freeze/unfreeze state machine (§4.3).

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use url::Url;

use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::ids::{TabId, WindowId};
use crate::renderer::Snapshot;
use crate::state::{FreezeState, StateService};
use crate::url_policy::is_authentication_url;
use crate::view_pool::ViewPool;

struct Inner {
    state: StateService,
    config: CoreConfig,
    cache: Mutex<LruCache<(WindowId, TabId), Snapshot>>,
}

/// Maintains at most `max_snapshots` bitmaps, keyed by `(WindowId, TabId)` (§4.3).
///
/// Cheaply cloneable (`Arc` internally) so the facade can hand a clone to an
/// `EventBus` subscriber that records eviction snapshots without giving that
/// subscriber a handle to anything else.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<Inner>,
}

impl SnapshotStore {
    pub fn new(state: StateService, config: CoreConfig) -> Self {
        let capacity = NonZeroUsize::new(config.max_snapshots).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            inner: Arc::new(Inner {
                state,
                config,
                cache: Mutex::new(LruCache::new(capacity)),
            }),
        }
    }

    /// Captures the active tab of `window_id`. Returns `None` if the tab has
    /// no resident renderer (falling back to any cached snapshot), if the
    /// renderer has been destroyed, or if the current URL is sensitive.
    pub fn capture_snapshot(&self, pool: &mut ViewPool, window_id: WindowId) -> Option<(String, Snapshot)> {
        let window = self.inner.state.get_state(window_id)?;
        let tab_id = window.active_tab_id;

        let Some(renderer) = pool.get(tab_id) else {
            return self
                .inner
                .cache
                .lock()
                .expect("snapshot cache mutex poisoned")
                .get(&(window_id, tab_id))
                .cloned()
                .map(|s| (window.active_tab().map(|t| t.url.clone()).unwrap_or_default(), s));
        };

        let url = renderer.current_url().to_string();
        if let Ok(parsed) = Url::parse(&url) {
            if is_authentication_url(&parsed, &self.inner.config) {
                return None;
            }
        }

        let snapshot = renderer.capture().ok()?;
        self.store(window_id, tab_id, snapshot.clone());
        Some((url, snapshot))
    }

    /// Records a snapshot captured out-of-band, e.g. by the `ViewPool`'s
    /// `TabSnapshotCaptured` event on eviction. The pool has already applied
    /// the sensitive-URL check before emitting that event.
    pub fn record_captured(&self, window_id: WindowId, tab_id: TabId, snapshot: Snapshot) {
        self.store(window_id, tab_id, snapshot);
    }

    /// Captures the active tab and, on success, transitions the window to
    /// `FROZEN` with the snapshot URL.
    pub fn freeze_window(&self, pool: &mut ViewPool, window_id: WindowId) -> Result<(), CoreError> {
        match self.capture_snapshot(pool, window_id) {
            Some((url, _snapshot)) => {
                self.inner.state.set_freeze_state(window_id, FreezeState::Frozen { snapshot_url: url });
                Ok(())
            }
            None => Err(CoreError::CaptureFailed { window_id, reason: "no capturable renderer".into() }),
        }
    }

    /// Transitions the window back to `Active`. Does not clear the cache.
    pub fn unfreeze_window(&self, window_id: WindowId) {
        self.inner.state.set_freeze_state(window_id, FreezeState::Active);
    }

    pub fn get_snapshot(&self, window_id: WindowId) -> Option<Snapshot> {
        let tab_id = self.inner.state.get_state(window_id)?.active_tab_id;
        self.get_tab_snapshot(window_id, tab_id)
    }

    pub fn get_tab_snapshot(&self, window_id: WindowId, tab_id: TabId) -> Option<Snapshot> {
        self.inner.cache.lock().expect("snapshot cache mutex poisoned").get(&(window_id, tab_id)).cloned()
    }

    /// Clears every tab's snapshot belonging to `window_id`.
    pub fn clear_snapshot(&self, window_id: WindowId) {
        let mut cache = self.inner.cache.lock().expect("snapshot cache mutex poisoned");
        let keys: Vec<(WindowId, TabId)> = cache.iter().map(|(k, _)| *k).filter(|(w, _)| *w == window_id).collect();
        for key in keys {
            cache.pop(&key);
        }
    }

    pub fn clear_all_snapshots(&self) {
        self.inner.cache.lock().expect("snapshot cache mutex poisoned").clear();
    }

    /// On write, re-homes an existing key to the MRU end by removing it
    /// first; on overflow, the LRU entry is dropped by the cache itself.
    fn store(&self, window_id: WindowId, tab_id: TabId, snapshot: Snapshot) {
        let key = (window_id, tab_id);
        let mut cache = self.inner.cache.lock().expect("snapshot cache mutex poisoned");
        cache.pop(&key);
        cache.put(key, snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_bus::EventBus;
    use crate::renderer::{Renderer, SimulatedRenderer};
    use crate::state::{Bounds, TabState, WindowState};
    use crate::view_pool::{ClosureRendererFactory, RendererFactory};

    fn pool() -> ViewPool {
        let factory: Box<dyn RendererFactory> =
            Box::new(ClosureRendererFactory(|| Ok(Box::new(SimulatedRenderer::new()) as Box<dyn Renderer>)));
        ViewPool::new(EventBus::new(), CoreConfig::default(), factory)
    }

    fn seeded() -> (SnapshotStore, StateService, WindowId, TabId) {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let state = StateService::new(EventBus::new(), &CoreConfig::default(), tx);
        let w = WindowId::new();
        let t = TabId::new();
        state.set_state(
            w,
            WindowState {
                window_id: w,
                tabs: vec![TabState::new_blank(t, w, true)],
                active_tab_id: t,
                bounds: Bounds { x: 0, y: 0, width: 800, height: 600 },
                freeze_state: FreezeState::Active,
                tab_group_id: None,
                tab_group_title: None,
            },
            true,
        );
        (SnapshotStore::new(state.clone(), CoreConfig::default()), state, w, t)
    }

    #[tokio::test]
    async fn capture_without_resident_renderer_returns_none() {
        let (store, _state, w, _t) = seeded();
        let mut p = pool();
        assert!(store.capture_snapshot(&mut p, w).is_none());
    }

    #[tokio::test]
    async fn capture_after_load_succeeds_and_caches() {
        let (store, _state, w, t) = seeded();
        let mut p = pool();
        p.acquire(t, w).unwrap().load(&Url::parse("https://example.com/").unwrap()).unwrap();

        let (url, _snap) = store.capture_snapshot(&mut p, w).unwrap();
        assert_eq!(url, "https://example.com/");
        assert!(store.get_tab_snapshot(w, t).is_some());
    }

    #[tokio::test]
    async fn freeze_then_unfreeze_round_trips_without_clearing_cache() {
        let (store, state, w, t) = seeded();
        let mut p = pool();
        p.acquire(t, w).unwrap().load(&Url::parse("https://example.com/").unwrap()).unwrap();

        store.freeze_window(&mut p, w).unwrap();
        assert!(matches!(state.get_state(w).unwrap().freeze_state, FreezeState::Frozen { .. }));

        store.unfreeze_window(w);
        assert_eq!(state.get_state(w).unwrap().freeze_state, FreezeState::Active);
        assert!(store.get_tab_snapshot(w, t).is_some());
    }

    #[tokio::test]
    async fn sensitive_url_is_never_captured() {
        let (store, _state, w, t) = seeded();
        let mut p = pool();
        p.acquire(t, w).unwrap().load(&Url::parse("https://accounts.google.com/oauth2/auth").unwrap()).unwrap();
        assert!(store.capture_snapshot(&mut p, w).is_none());
    }

    #[tokio::test]
    async fn clear_snapshot_drops_only_that_windows_entries() {
        let (store, _state, w1, t1) = seeded();
        let w2 = WindowId::new();
        let t2 = TabId::new();
        store.store(w1, t1, Snapshot { data_url: "a".into() });
        store.store(w2, t2, Snapshot { data_url: "b".into() });
        store.clear_snapshot(w1);
        assert!(store.get_tab_snapshot(w1, t1).is_none());
        assert!(store.get_tab_snapshot(w2, t2).is_some());
    }

    #[test]
    fn record_captured_stores_event_payload_like_a_direct_capture() {
        let (store, _state, w, t) = seeded();
        store.record_captured(w, t, Snapshot { data_url: "evicted".into() });
        assert_eq!(store.get_tab_snapshot(w, t).unwrap().data_url, "evicted");
    }
}
