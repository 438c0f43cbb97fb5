//! Bounded LRU pool of live renderers, keyed by tab identity (§4.2).
//!
//! `ViewPool` is the only component allowed to create or destroy a
//! [`Renderer`]. `ViewManager` looks renderers up by `TabId` and never owns
//! one outright.

use std::collections::HashMap;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::event_bus::{CoreEvent, EventBus};
use crate::ids::{TabId, WindowId};
use crate::renderer::Renderer;
use crate::url_policy::is_authentication_url;
use url::Url;

/// Produces a fresh [`Renderer`] for a newly-acquired tab. The pool owns the
/// renderer it receives; it never inspects how it was built.
pub trait RendererFactory: Send {
    fn create(&self) -> Result<Box<dyn Renderer>, CoreError>;
}

/// A `RendererFactory` built from a plain closure.
pub struct ClosureRendererFactory<F>(pub F);

impl<F> RendererFactory for ClosureRendererFactory<F>
where
    F: Fn() -> Result<Box<dyn Renderer>, CoreError> + Send,
{
    fn create(&self) -> Result<Box<dyn Renderer>, CoreError> {
        (self.0)()
    }
}

struct Resident {
    renderer: Box<dyn Renderer>,
    window_id: WindowId,
}

/// Maintains at most `max_pool_size` live renderers (§4.2).
pub struct ViewPool {
    bus: EventBus,
    config: CoreConfig,
    factory: Box<dyn RendererFactory>,
    residents: LruCache<TabId, Resident>,
    /// Last known URL for tabs that have been evicted or released, so a
    /// later reacquire resumes where the tab left off.
    last_known_url: HashMap<TabId, String>,
}

impl ViewPool {
    pub fn new(bus: EventBus, config: CoreConfig, factory: Box<dyn RendererFactory>) -> Self {
        let capacity = NonZeroUsize::new(config.max_pool_size).unwrap_or(NonZeroUsize::new(1).unwrap());
        Self {
            bus,
            config,
            factory,
            residents: LruCache::new(capacity),
            last_known_url: HashMap::new(),
        }
    }

    /// Returns a renderer for `tab_id`, creating one (possibly evicting the
    /// LRU entry) if it is not already resident. Re-binds event context to
    /// `(tab_id, window_id)` either way.
    pub fn acquire(&mut self, tab_id: TabId, window_id: WindowId) -> Result<&mut dyn Renderer, CoreError> {
        if self.residents.contains(&tab_id) {
            let resident = self.residents.get_mut(&tab_id).expect("checked contains");
            resident.window_id = window_id;
            resident.renderer.bind(tab_id, window_id);
            return Ok(resident.renderer.as_mut());
        }

        if self.residents.len() >= self.config.max_pool_size {
            self.evict_lru();
        }

        let mut renderer = self.factory.create()?;
        renderer.bind(tab_id, window_id);
        if let Some(url) = self.last_known_url.get(&tab_id) {
            if let Ok(parsed) = Url::parse(url) {
                renderer.load(&parsed)?;
            }
        }
        self.residents.put(tab_id, Resident { renderer, window_id });
        Ok(self.residents.get_mut(&tab_id).expect("just inserted").renderer.as_mut())
    }

    /// Look up without touching LRU order.
    pub fn get(&mut self, tab_id: TabId) -> Option<&mut dyn Renderer> {
        self.residents.peek_mut(&tab_id).map(|r| r.renderer.as_mut())
    }

    pub fn is_resident(&self, tab_id: TabId) -> bool {
        self.residents.contains(&tab_id)
    }

    /// Re-bind an existing resident to `new_window_id` without destroying it.
    pub fn migrate(&mut self, tab_id: TabId, new_window_id: WindowId) {
        if let Some(resident) = self.residents.peek_mut(&tab_id) {
            resident.window_id = new_window_id;
            resident.renderer.bind(tab_id, new_window_id);
        }
    }

    /// Removes `tab_id`, detaching and destroying its renderer. Idempotent.
    pub fn release(&mut self, tab_id: TabId) {
        if let Some(mut resident) = self.residents.pop(&tab_id) {
            self.last_known_url.insert(tab_id, resident.renderer.current_url().to_string());
            resident.renderer.close();
        }
    }

    /// Drops the tab→window association for every resident owned by
    /// `window_id`, without releasing the renderer itself.
    pub fn cleanup_window_mappings(&mut self, window_id: WindowId) {
        let stale: Vec<TabId> = self
            .residents
            .iter()
            .filter(|(_, r)| r.window_id == window_id)
            .map(|(tab_id, _)| *tab_id)
            .collect();
        for tab_id in stale {
            self.release(tab_id);
        }
    }

    /// Releases every resident renderer. Used on shutdown.
    pub fn cleanup(&mut self) {
        let ids: Vec<TabId> = self.residents.iter().map(|(id, _)| *id).collect();
        for tab_id in ids {
            self.release(tab_id);
        }
    }

    /// Evicts the LRU resident: emits `tab:before-eviction`, attempts a
    /// synchronous snapshot capture unless the URL is sensitive (silent
    /// failure is acceptable), then releases the renderer.
    fn evict_lru(&mut self) {
        let Some((&tab_id, resident)) = self.residents.peek_lru() else {
            return;
        };
        let tab_id = tab_id;
        let window_id = resident.window_id;

        self.bus.emit(CoreEvent::TabBeforeEviction { window_id, tab_id });

        if let Some(resident) = self.residents.peek(&tab_id) {
            let sensitive = Url::parse(resident.renderer.current_url())
                .map(|u| is_authentication_url(&u, &self.config))
                .unwrap_or(false);
            if !sensitive {
                if let Some(resident) = self.residents.peek(&tab_id) {
                    if let Ok(snapshot) = resident.renderer.capture() {
                        self.bus.emit(CoreEvent::TabSnapshotCaptured { window_id, tab_id, snapshot });
                    }
                }
            }
        }

        self.release(tab_id);
    }
}
