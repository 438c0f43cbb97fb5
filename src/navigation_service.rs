//! Maps user-initiated navigation commands onto the active tab's renderer (§4.6).

use url::Url;

use crate::config::CoreConfig;
use crate::errors::CoreError;
use crate::ids::WindowId;
use crate::state::{StateService, TabStateDelta};
use crate::url_policy::{is_authentication_url, is_navigable};
use crate::view_pool::ViewPool;

/// The canonical context-menu action set (§6).
#[derive(Debug, Clone, PartialEq)]
pub enum ContextMenuAction {
    LinkOpenNewTab { href: String },
    LinkOpenBackground { href: String },
    LinkCopy { href: String },
    ImageOpenNewTab { src: String },
    ImageCopyUrl { src: String },
    ImageSave { src: String },
    EditCopy,
    EditCut,
    EditPaste,
    EditUndo,
    EditRedo,
    EditSelectAll,
    Search { engine: String, query: String },
    NavigateBack,
    NavigateForward,
    NavigateReload,
    PageCopyUrl,
    DevViewSource,
    DevInspect,
}

/// Drives renderer navigation from the facade's public commands (§4.6).
pub struct NavigationService {
    state: StateService,
    config: CoreConfig,
}

impl NavigationService {
    pub fn new(state: StateService, config: CoreConfig) -> Self {
        Self { state, config }
    }

    /// Security-validates `url`, acquires the active tab's renderer if it is
    /// not resident, instructs it to load, and eagerly updates the state
    /// `url` so reload suppression in `ViewManager` sees it immediately.
    pub fn load_url(&self, pool: &mut ViewPool, window_id: WindowId, url: &str) -> Result<(), CoreError> {
        let window = self.state.get_state(window_id).ok_or(CoreError::UnknownWindow(window_id))?;
        let tab_id = window.active_tab_id;

        let parsed = Url::parse(url).map_err(|e| CoreError::NavigationFailed {
            tab_id,
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        if !is_navigable(&parsed) {
            return Err(CoreError::InsecureUrl { url: url.to_string() });
        }

        let renderer = pool.acquire(tab_id, window_id)?;
        let result = renderer.load(&parsed);

        self.state.update_tab(
            window_id,
            tab_id,
            TabStateDelta { url: Some(parsed.to_string()), is_loading: Some(true), ..Default::default() },
        );

        if let Err(err) = result {
            if is_authentication_url(&parsed, &self.config) {
                log::debug!("navigation aborted on authentication url {}: {:?}", parsed, err);
            } else {
                log::error!("load_url failed for {}: {:?}", parsed, err);
                self.state.update_tab(
                    window_id,
                    tab_id,
                    TabStateDelta { error: Some(Some(err.to_string())), is_loading: Some(false), ..Default::default() },
                );
            }
            return Err(err);
        }
        Ok(())
    }

    /// Forwards to the active tab's renderer when resident; no-op otherwise.
    pub fn go_back(&self, pool: &mut ViewPool, window_id: WindowId) -> Result<(), CoreError> {
        self.with_active_renderer(pool, window_id, |r| r.go_back())
    }

    pub fn go_forward(&self, pool: &mut ViewPool, window_id: WindowId) -> Result<(), CoreError> {
        self.with_active_renderer(pool, window_id, |r| r.go_forward())
    }

    pub fn reload(&self, pool: &mut ViewPool, window_id: WindowId, ignore_cache: bool) -> Result<(), CoreError> {
        self.with_active_renderer(pool, window_id, |r| r.reload(ignore_cache))
    }

    pub fn stop(&self, pool: &mut ViewPool, window_id: WindowId) -> Result<(), CoreError> {
        self.with_active_renderer(pool, window_id, |r| {
            r.stop();
            Ok(())
        })
    }

    /// Executes a context-menu action. Navigation-shaped actions delegate to
    /// the corresponding method above; the rest are presently opaque to the
    /// Core and are accepted as no-ops (the facade's outbound event path is
    /// the place a host hooks clipboard/tab-creation side effects).
    pub fn execute_context_menu_action(
        &self,
        pool: &mut ViewPool,
        window_id: WindowId,
        action: ContextMenuAction,
    ) -> Result<(), CoreError> {
        match action {
            ContextMenuAction::NavigateBack => self.go_back(pool, window_id),
            ContextMenuAction::NavigateForward => self.go_forward(pool, window_id),
            ContextMenuAction::NavigateReload => self.reload(pool, window_id, false),
            _ => Ok(()),
        }
    }

    fn with_active_renderer(
        &self,
        pool: &mut ViewPool,
        window_id: WindowId,
        f: impl FnOnce(&mut dyn crate::renderer::Renderer) -> Result<(), CoreError>,
    ) -> Result<(), CoreError> {
        let window = self.state.get_state(window_id).ok_or(CoreError::UnknownWindow(window_id))?;
        if let Some(renderer) = pool.get(window.active_tab_id) {
            f(renderer)
        } else {
            Ok(())
        }
    }
}
