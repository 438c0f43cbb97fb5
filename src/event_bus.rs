//! Typed in-process publish/subscribe (§4.1).
//!
//! Per Design Note §9 ("dynamic event payloads"), topics are not strings at
//! runtime: [`CoreEvent`] is a closed enum, one variant per topic, and
//! subscribers register against an [`EventKind`] discriminant rather than a
//! topic string. Dispatch is synchronous and in subscription order; a
//! panicking handler is caught and logged so it cannot stop delivery to the
//! remaining subscribers for that kind.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::ids::{TabId, WindowId};
use crate::renderer::Snapshot;
use crate::state::WindowState;

/// The full set of intra-Core events, one variant per topic in §4.1.
#[derive(Debug, Clone)]
pub enum CoreEvent {
    ViewDidStartLoading {
        window_id: WindowId,
        tab_id: TabId,
        url: String,
    },
    ViewDidStopLoading {
        window_id: WindowId,
        tab_id: TabId,
    },
    ViewDidNavigate {
        window_id: WindowId,
        tab_id: TabId,
        url: String,
        title: String,
    },
    ViewDidNavigateInPage {
        window_id: WindowId,
        tab_id: TabId,
        url: String,
        title: String,
    },
    ViewDomReady {
        window_id: WindowId,
        tab_id: TabId,
        url: String,
    },
    ViewDidFrameFinishLoad {
        window_id: WindowId,
        tab_id: TabId,
        url: String,
        is_main_frame: bool,
    },
    ViewDidFailLoad {
        window_id: WindowId,
        tab_id: TabId,
        error_code: i32,
        error_description: String,
        url: String,
        is_main_frame: bool,
    },
    ViewPageTitleUpdated {
        window_id: WindowId,
        tab_id: TabId,
        title: String,
    },
    ViewPageFaviconUpdated {
        window_id: WindowId,
        tab_id: TabId,
        favicon_url: String,
    },
    ViewContextMenuRequested {
        window_id: WindowId,
        x: i32,
        y: i32,
    },
    ViewWindowOpenRequest {
        window_id: WindowId,
        url: String,
        disposition: String,
    },
    WindowFocusChanged {
        window_id: WindowId,
        focused: bool,
    },
    WindowMinimized {
        window_id: WindowId,
    },
    WindowRestored {
        window_id: WindowId,
    },
    WindowZOrderUpdate {
        ordered_windows: Vec<WindowId>,
    },
    TabBeforeEviction {
        window_id: WindowId,
        tab_id: TabId,
    },
    TabSnapshotCaptured {
        window_id: WindowId,
        tab_id: TabId,
        snapshot: Snapshot,
    },
    StateChanged {
        window_id: WindowId,
        new_state: WindowState,
        previous_state: Option<WindowState>,
        is_navigation_relevant: bool,
    },
}

/// The discriminant `EventBus` subscribes against; one value per `CoreEvent`
/// variant, carrying no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ViewDidStartLoading,
    ViewDidStopLoading,
    ViewDidNavigate,
    ViewDidNavigateInPage,
    ViewDomReady,
    ViewDidFrameFinishLoad,
    ViewDidFailLoad,
    ViewPageTitleUpdated,
    ViewPageFaviconUpdated,
    ViewContextMenuRequested,
    ViewWindowOpenRequest,
    WindowFocusChanged,
    WindowMinimized,
    WindowRestored,
    WindowZOrderUpdate,
    TabBeforeEviction,
    TabSnapshotCaptured,
    StateChanged,
}

impl CoreEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            CoreEvent::ViewDidStartLoading { .. } => EventKind::ViewDidStartLoading,
            CoreEvent::ViewDidStopLoading { .. } => EventKind::ViewDidStopLoading,
            CoreEvent::ViewDidNavigate { .. } => EventKind::ViewDidNavigate,
            CoreEvent::ViewDidNavigateInPage { .. } => EventKind::ViewDidNavigateInPage,
            CoreEvent::ViewDomReady { .. } => EventKind::ViewDomReady,
            CoreEvent::ViewDidFrameFinishLoad { .. } => EventKind::ViewDidFrameFinishLoad,
            CoreEvent::ViewDidFailLoad { .. } => EventKind::ViewDidFailLoad,
            CoreEvent::ViewPageTitleUpdated { .. } => EventKind::ViewPageTitleUpdated,
            CoreEvent::ViewPageFaviconUpdated { .. } => EventKind::ViewPageFaviconUpdated,
            CoreEvent::ViewContextMenuRequested { .. } => EventKind::ViewContextMenuRequested,
            CoreEvent::ViewWindowOpenRequest { .. } => EventKind::ViewWindowOpenRequest,
            CoreEvent::WindowFocusChanged { .. } => EventKind::WindowFocusChanged,
            CoreEvent::WindowMinimized { .. } => EventKind::WindowMinimized,
            CoreEvent::WindowRestored { .. } => EventKind::WindowRestored,
            CoreEvent::WindowZOrderUpdate { .. } => EventKind::WindowZOrderUpdate,
            CoreEvent::TabBeforeEviction { .. } => EventKind::TabBeforeEviction,
            CoreEvent::TabSnapshotCaptured { .. } => EventKind::TabSnapshotCaptured,
            CoreEvent::StateChanged { .. } => EventKind::StateChanged,
        }
    }
}

type Handler = Box<dyn Fn(&CoreEvent) + Send + Sync>;

struct Subscription {
    id: u64,
    once: bool,
    handler: Handler,
}

/// A synchronous, panic-isolating publish/subscribe registry.
///
/// Cheaply cloneable (`Arc` internally) so the facade can hand the same bus
/// to every component without any of them owning one another.
#[derive(Clone)]
pub struct EventBus {
    subs: Arc<Mutex<HashMap<EventKind, Vec<Subscription>>>>,
    next_id: Arc<AtomicU64>,
}

/// A handle returned by `subscribe`/`subscribe_once`; dropping it does not
/// unsubscribe — use `unsubscribe` or `remove_all_listeners` explicitly, the
/// same way this codebase's channel-based subscriptions require an explicit
/// teardown call rather than relying on `Drop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    fn register(&self, kind: EventKind, once: bool, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subs
            .lock()
            .expect("event bus mutex poisoned")
            .entry(kind)
            .or_default()
            .push(Subscription { id, once, handler });
        SubscriptionId(id)
    }

    /// Subscribe `handler` to every event of `kind` until explicitly removed.
    pub fn subscribe(
        &self,
        kind: EventKind,
        handler: impl Fn(&CoreEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(kind, false, Box::new(handler))
    }

    /// Subscribe `handler` to the next event of `kind` only; it is removed
    /// automatically after its first invocation.
    pub fn subscribe_once(
        &self,
        kind: EventKind,
        handler: impl Fn(&CoreEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.register(kind, true, Box::new(handler))
    }

    /// Detach a specific subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subs = self.subs.lock().expect("event bus mutex poisoned");
        for list in subs.values_mut() {
            list.retain(|s| s.id != id.0);
        }
    }

    /// Detach every subscriber of `kind`, or every subscriber of every kind
    /// when `kind` is `None`.
    pub fn remove_all_listeners(&self, kind: Option<EventKind>) {
        let mut subs = self.subs.lock().expect("event bus mutex poisoned");
        match kind {
            Some(k) => {
                subs.remove(&k);
            }
            None => subs.clear(),
        }
    }

    /// Dispatch `event` to every subscriber of its kind, in registration
    /// order. A panicking subscriber is caught, logged, and does not prevent
    /// delivery to the rest.
    pub fn emit(&self, event: CoreEvent) {
        let kind = event.kind();
        let to_run: Vec<(u64, bool)> = {
            let subs = self.subs.lock().expect("event bus mutex poisoned");
            match subs.get(&kind) {
                Some(list) => list.iter().map(|s| (s.id, s.once)).collect(),
                None => return,
            }
        };
        if to_run.is_empty() {
            return;
        }

        for (id, _once) in &to_run {
            let subs = self.subs.lock().expect("event bus mutex poisoned");
            let Some(sub) = subs.get(&kind).and_then(|list| list.iter().find(|s| s.id == *id)) else {
                continue;
            };
            let handler = &sub.handler;
            let result = catch_unwind(AssertUnwindSafe(|| handler(&event)));
            drop(subs);
            if result.is_err() {
                log::error!("event subscriber panicked while handling {:?}", kind);
            }
        }

        let mut subs = self.subs.lock().expect("event bus mutex poisoned");
        if let Some(list) = subs.get_mut(&kind) {
            list.retain(|s| !(s.once && to_run.iter().any(|(id, once)| *id == s.id && *once)));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn window_minimized(window_id: WindowId) -> CoreEvent {
        CoreEvent::WindowMinimized { window_id }
    }

    #[test]
    fn dispatch_reaches_all_subscribers_in_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        let o2 = order.clone();
        bus.subscribe(EventKind::WindowMinimized, move |_| o1.lock().unwrap().push(1));
        bus.subscribe(EventKind::WindowMinimized, move |_| o2.lock().unwrap().push(2));
        bus.emit(window_minimized(WindowId::new()));
        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
    }

    #[test]
    fn panicking_subscriber_does_not_block_others() {
        let bus = EventBus::new();
        let called = Arc::new(AtomicUsize::new(0));
        let called2 = called.clone();
        bus.subscribe(EventKind::WindowMinimized, |_| panic!("boom"));
        bus.subscribe(EventKind::WindowMinimized, move |_| {
            called2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(window_minimized(WindowId::new()));
        assert_eq!(called.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn once_subscriber_fires_exactly_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count2 = count.clone();
        bus.subscribe_once(EventKind::WindowMinimized, move |_| {
            count2.fetch_add(1, Ordering::SeqCst);
        });
        bus.emit(window_minimized(WindowId::new()));
        bus.emit(window_minimized(WindowId::new()));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remove_all_listeners_for_kind_detaches_only_that_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        bus.subscribe(EventKind::WindowMinimized, move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        bus.subscribe(EventKind::WindowRestored, |_| {});
        bus.remove_all_listeners(Some(EventKind::WindowMinimized));
        bus.emit(window_minimized(WindowId::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unsubscribe_detaches_a_single_handle() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits2 = hits.clone();
        let id = bus.subscribe(EventKind::WindowMinimized, move |_| {
            hits2.fetch_add(1, Ordering::SeqCst);
        });
        bus.unsubscribe(id);
        bus.emit(window_minimized(WindowId::new()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
