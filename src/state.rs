//! Authoritative per-window state (§3, §4.4).
//!
//! `StateService` is the single writer of [`WindowState`]; every other
//! component reads it through the service or through the `state-changed`
//! event it emits. Progress monotonicity and navigation-relevance are
//! enforced here and nowhere else.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::config::CoreConfig;
use crate::event_bus::{CoreEvent, EventBus};
use crate::ids::{TabId, WindowId};

/// Advisory residence state of a tab; authoritative residence is `ViewPool`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Inactive,
    Loading,
    Resident,
}

/// Per-tab presentation state (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub id: TabId,
    pub window_id: WindowId,
    pub url: String,
    pub title: String,
    pub favicon_url: Option<String>,
    pub is_loading: bool,
    pub loading_progress: u8,
    pub can_go_back: bool,
    pub can_go_forward: bool,
    pub error: Option<String>,
    pub pool_state: PoolState,
    pub last_accessed: u64,
    pub is_bookmarked: bool,
}

impl TabState {
    /// A freshly-created, blank tab (§4.5 `TabService::create` defaults).
    pub fn new_blank(id: TabId, window_id: WindowId, make_active: bool) -> Self {
        Self {
            id,
            window_id,
            url: String::new(),
            title: "New Tab".to_string(),
            favicon_url: None,
            is_loading: make_active,
            loading_progress: 0,
            can_go_back: false,
            can_go_forward: false,
            error: None,
            pool_state: if make_active {
                PoolState::Loading
            } else {
                PoolState::Inactive
            },
            last_accessed: now_millis(),
            is_bookmarked: false,
        }
    }
}

/// A partial update applied via `StateService::update_tab`. `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct TabStateDelta {
    pub url: Option<String>,
    pub title: Option<String>,
    pub favicon_url: Option<Option<String>>,
    pub is_loading: Option<bool>,
    pub loading_progress: Option<u8>,
    pub can_go_back: Option<bool>,
    pub can_go_forward: Option<bool>,
    pub error: Option<Option<String>>,
    pub pool_state: Option<PoolState>,
    pub is_bookmarked: Option<bool>,
}

/// The freeze/unfreeze state machine (§3).
#[derive(Debug, Clone, PartialEq)]
pub enum FreezeState {
    Active,
    Capturing,
    AwaitingRender { snapshot_url: String },
    Frozen { snapshot_url: String },
}

impl FreezeState {
    pub fn is_frozen_like(&self) -> bool {
        matches!(self, FreezeState::Frozen { .. } | FreezeState::AwaitingRender { .. })
    }
}

/// Screen-relative window bounds, integer pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Authoritative state of one logical browser window (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct WindowState {
    pub window_id: WindowId,
    pub tabs: Vec<TabState>,
    pub active_tab_id: TabId,
    pub bounds: Bounds,
    pub freeze_state: FreezeState,
    pub tab_group_id: Option<String>,
    pub tab_group_title: Option<String>,
}

impl WindowState {
    pub fn active_tab(&self) -> Option<&TabState> {
        self.tabs.iter().find(|t| t.id == self.active_tab_id)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut TabState> {
        let active = self.active_tab_id;
        self.tabs.iter_mut().find(|t| t.id == active)
    }

    pub fn tab(&self, tab_id: TabId) -> Option<&TabState> {
        self.tabs.iter().find(|t| t.id == tab_id)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Fixed progress thresholds for known engine events (§4.4).
pub mod progress {
    pub const DID_START_LOADING: u8 = 5;
    pub const DID_NAVIGATE: u8 = 35;
    pub const DOM_READY: u8 = 60;
    pub const DID_FRAME_FINISH_LOAD_MAIN: u8 = 85;
    pub const DID_STOP_LOADING: u8 = 100;
}

pub(crate) fn is_navigation_relevant(previous: Option<&WindowState>, new: &WindowState) -> bool {
    let Some(previous) = previous else {
        return true;
    };
    if previous.active_tab_id != new.active_tab_id {
        return true;
    }
    if previous.tabs.len() != new.tabs.len() {
        return true;
    }
    let prev_ids: std::collections::HashSet<TabId> = previous.tabs.iter().map(|t| t.id).collect();
    if new.tabs.iter().any(|t| !prev_ids.contains(&t.id)) {
        return true;
    }
    for new_tab in &new.tabs {
        if let Some(prev_tab) = previous.tabs.iter().find(|t| t.id == new_tab.id) {
            if prev_tab.url != new_tab.url || prev_tab.is_loading != new_tab.is_loading {
                return true;
            }
        }
    }
    false
}

struct WindowEntry {
    state: WindowState,
    progress_floor: HashMap<TabId, u8>,
    pending_outbound: Option<OutboundUpdate>,
    timer_pending: bool,
}

/// The debounced payload delivered to the UI (§4.4, §6).
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundUpdate {
    pub window_id: WindowId,
    pub tabs: Vec<TabState>,
    pub active_tab_id: TabId,
    pub tab_group_title: Option<String>,
    pub freeze_state: FreezeState,
}

impl From<&WindowState> for OutboundUpdate {
    fn from(s: &WindowState) -> Self {
        Self {
            window_id: s.window_id,
            tabs: s.tabs.clone(),
            active_tab_id: s.active_tab_id,
            tab_group_title: s.tab_group_title.clone(),
            freeze_state: s.freeze_state.clone(),
        }
    }
}

struct Inner {
    windows: Mutex<HashMap<WindowId, WindowEntry>>,
    bus: EventBus,
    outbound_tx: tokio::sync::mpsc::UnboundedSender<OutboundUpdate>,
    debounce: Duration,
}

/// Single-writer authority over every window's state (§4.4).
///
/// Cheaply cloneable (`Arc` internally); the debounce timer spawned by
/// `schedule_outbound` holds its own clone so it can publish after the
/// quiescence window even if the original handle has gone out of scope.
#[derive(Clone)]
pub struct StateService {
    inner: std::sync::Arc<Inner>,
}

impl StateService {
    /// Builds a `StateService`; `outbound_tx` receives the debounced
    /// per-window notifications described in §6.
    pub fn new(
        bus: EventBus,
        config: &CoreConfig,
        outbound_tx: tokio::sync::mpsc::UnboundedSender<OutboundUpdate>,
    ) -> Self {
        Self {
            inner: std::sync::Arc::new(Inner {
                windows: Mutex::new(HashMap::new()),
                bus,
                outbound_tx,
                debounce: config.debounce,
            }),
        }
    }

    /// Replaces the full state for `window_id`, emitting `state-changed`
    /// synchronously and scheduling a debounced outbound notification.
    pub fn set_state(&self, window_id: WindowId, new_state: WindowState, force_navigation_check: bool) {
        let previous = {
            let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
            let previous = windows.get(&window_id).map(|e| e.state.clone());
            let relevant_basis = previous.as_ref();
            let relevant = force_navigation_check || is_navigation_relevant(relevant_basis, &new_state);

            let entry = windows.entry(window_id).or_insert_with(|| WindowEntry {
                state: new_state.clone(),
                progress_floor: HashMap::new(),
                pending_outbound: None,
                timer_pending: false,
            });
            entry.state = new_state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));

            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state: new_state.clone(),
                previous_state: previous.clone(),
                is_navigation_relevant: relevant,
            });
            previous
        };
        let _ = previous;
        self.schedule_outbound(window_id);
    }

    /// Arms a debounce timer for `window_id` unless one is already in
    /// flight. Each call overwrites `pending_outbound`; only the first call
    /// in a burst spawns a timer (coalesces bursts per §4.4). The spawned
    /// task holds its own `Arc<Inner>` clone so it outlives this call.
    fn schedule_outbound(&self, window_id: WindowId) {
        let should_spawn = {
            let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
            match windows.get_mut(&window_id) {
                Some(entry) if !entry.timer_pending => {
                    entry.timer_pending = true;
                    true
                }
                _ => false,
            }
        };
        if !should_spawn {
            return;
        }
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            let payload = {
                let mut windows = inner.windows.lock().expect("state mutex poisoned");
                windows.get_mut(&window_id).and_then(|entry| {
                    entry.timer_pending = false;
                    entry.pending_outbound.take()
                })
            };
            if let Some(payload) = payload {
                let _ = inner.outbound_tx.send(payload);
            }
        });
    }

    /// Drains and returns the pending outbound payload for `window_id`, if
    /// any, without waiting for the debounce window. Intended for hosts that
    /// drive their own scheduling loop instead of using `spawn_debounce`.
    pub fn take_pending_outbound(&self, window_id: WindowId) -> Option<OutboundUpdate> {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        windows.get_mut(&window_id).and_then(|e| e.pending_outbound.take())
    }

    pub fn get_state(&self, window_id: WindowId) -> Option<WindowState> {
        self.inner.windows
            .lock()
            .expect("state mutex poisoned")
            .get(&window_id)
            .map(|e| e.state.clone())
    }

    pub fn get_all_states(&self) -> Vec<WindowState> {
        self.inner.windows
            .lock()
            .expect("state mutex poisoned")
            .values()
            .map(|e| e.state.clone())
            .collect()
    }

    pub fn remove_state(&self, window_id: WindowId) -> Option<WindowState> {
        self.inner.windows
            .lock()
            .expect("state mutex poisoned")
            .remove(&window_id)
            .map(|e| e.state)
    }

    pub fn add_tab(&self, window_id: WindowId, tab: TabState) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        if let Some(entry) = windows.get_mut(&window_id) {
            let previous = entry.state.clone();
            entry.state.tabs.push(tab);
            let new_state = entry.state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state,
                previous_state: Some(previous),
                is_navigation_relevant: true,
            });
        }
        drop(windows);
        self.schedule_outbound(window_id);
    }

    pub fn remove_tab(&self, window_id: WindowId, tab_id: TabId) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        if let Some(entry) = windows.get_mut(&window_id) {
            let previous = entry.state.clone();
            entry.state.tabs.retain(|t| t.id != tab_id);
            entry.progress_floor.remove(&tab_id);
            let new_state = entry.state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state,
                previous_state: Some(previous),
                is_navigation_relevant: true,
            });
        }
        drop(windows);
        self.schedule_outbound(window_id);
    }

    /// Applies a partial tab update, enforcing progress monotonicity: a new
    /// `loading_progress` below the recorded floor is clamped up to the
    /// floor, unless `url` changed in this same delta (which resets the
    /// floor to 0).
    pub fn update_tab(&self, window_id: WindowId, tab_id: TabId, delta: TabStateDelta) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        let Some(entry) = windows.get_mut(&window_id) else {
            return;
        };
        let previous = entry.state.clone();
        let url_changed = delta
            .url
            .as_ref()
            .and_then(|new_url| entry.state.tab(tab_id).map(|t| (new_url, &t.url)))
            .map(|(new_url, old_url)| new_url != old_url)
            .unwrap_or(false);

        if url_changed {
            entry.progress_floor.insert(tab_id, 0);
        }

        let mut relevant = false;
        if let Some(tab) = entry.state.tabs.iter_mut().find(|t| t.id == tab_id) {
            if let Some(url) = delta.url {
                if url != tab.url {
                    relevant = true;
                    tab.url = url;
                    tab.loading_progress = 0;
                }
            }
            if let Some(title) = delta.title {
                tab.title = title;
            }
            if let Some(favicon) = delta.favicon_url {
                tab.favicon_url = favicon;
            }
            if let Some(is_loading) = delta.is_loading {
                if is_loading != tab.is_loading {
                    relevant = true;
                }
                tab.is_loading = is_loading;
            }
            if let Some(progress) = delta.loading_progress {
                let floor = entry.progress_floor.entry(tab_id).or_insert(0);
                let clamped = progress.max(*floor);
                *floor = clamped;
                tab.loading_progress = clamped;
            }
            if let Some(back) = delta.can_go_back {
                tab.can_go_back = back;
            }
            if let Some(fwd) = delta.can_go_forward {
                tab.can_go_forward = fwd;
            }
            if let Some(err) = delta.error {
                tab.error = err;
            }
            if let Some(pool_state) = delta.pool_state {
                tab.pool_state = pool_state;
            }
            if let Some(bookmarked) = delta.is_bookmarked {
                tab.is_bookmarked = bookmarked;
            }
            tab.last_accessed = now_millis();
        }

        let new_state = entry.state.clone();
        entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
        self.inner.bus.emit(CoreEvent::StateChanged {
            window_id,
            new_state,
            previous_state: Some(previous),
            is_navigation_relevant: relevant,
        });
        drop(windows);
        self.schedule_outbound(window_id);
    }

    pub fn set_active_tab(&self, window_id: WindowId, tab_id: TabId) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        if let Some(entry) = windows.get_mut(&window_id) {
            let previous = entry.state.clone();
            entry.state.active_tab_id = tab_id;
            let new_state = entry.state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state,
                previous_state: Some(previous),
                is_navigation_relevant: true,
            });
        }
        drop(windows);
        self.schedule_outbound(window_id);
    }

    /// Bounds changes are never navigation-relevant (§4.4).
    pub fn set_bounds(&self, window_id: WindowId, bounds: Bounds) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        if let Some(entry) = windows.get_mut(&window_id) {
            let previous = entry.state.clone();
            entry.state.bounds = bounds;
            let new_state = entry.state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state,
                previous_state: Some(previous),
                is_navigation_relevant: false,
            });
        }
        drop(windows);
        self.schedule_outbound(window_id);
    }

    pub fn set_freeze_state(&self, window_id: WindowId, freeze_state: FreezeState) {
        let mut windows = self.inner.windows.lock().expect("state mutex poisoned");
        if let Some(entry) = windows.get_mut(&window_id) {
            let previous = entry.state.clone();
            entry.state.freeze_state = freeze_state;
            let new_state = entry.state.clone();
            entry.pending_outbound = Some(OutboundUpdate::from(&new_state));
            self.inner.bus.emit(CoreEvent::StateChanged {
                window_id,
                new_state,
                previous_state: Some(previous),
                is_navigation_relevant: false,
            });
        }
        drop(windows);
        self.schedule_outbound(window_id);
    }
}
