//! The `Renderer` abstraction: the interface the Core drives on the embedded
//! web-content engine without depending on its concrete type.
//!
//! The real engine's internals are an external collaborator and out of scope
//! for this crate. [`SimulatedRenderer`] is a dependency-free stand-in good
//! enough to exercise `ViewPool`/`ViewManager` in tests and in hosts that
//! haven't wired up a real engine yet.

use crate::errors::CoreError;
use crate::ids::{TabId, WindowId};
use url::Url;

/// A captured bitmap of a renderer's last-visible frame, encoded as a data
/// URL (per the glossary: "a raster bitmap... encoded as a data URL").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub data_url: String,
}

/// Everything the Core needs from a heavyweight web-content renderer.
///
/// Implementors own a real process/instance; `bind` re-homes the closures the
/// real engine calls back into the Core with `(tab_id, window_id)` so that
/// emitted events always carry the right context, even across a window
/// transfer (§4.2, "Event binding").
pub trait Renderer: Send {
    /// The last committed or currently-loading URL.
    fn current_url(&self) -> &str;

    /// Whether a navigation is currently in flight.
    fn is_loading(&self) -> bool;

    /// Re-bind this renderer's event context to `(tab_id, window_id)`.
    fn bind(&mut self, tab_id: TabId, window_id: WindowId);

    /// Begin loading `url`. Implementations update `current_url`/`is_loading`.
    fn load(&mut self, url: &Url) -> Result<(), CoreError>;

    fn go_back(&mut self) -> Result<(), CoreError>;
    fn go_forward(&mut self) -> Result<(), CoreError>;
    fn reload(&mut self, ignore_cache: bool) -> Result<(), CoreError>;
    fn stop(&mut self);

    /// Capture the current frame. Implementations should fail if nothing has
    /// ever been rendered.
    fn capture(&self) -> Result<Snapshot, CoreError>;

    /// Stop audio/loading and release engine-side resources. Idempotent.
    fn close(&mut self);
}

/// An in-memory stand-in for a real web-content renderer.
///
/// Tracks just enough state (current URL, loading flag) to drive the Core's
/// reconciliation logic in tests, and answers `capture` with a small
/// synthetic data URL rather than a real bitmap.
#[derive(Debug, Clone)]
pub struct SimulatedRenderer {
    tab_id: Option<TabId>,
    window_id: Option<WindowId>,
    current_url: String,
    loading: bool,
    closed: bool,
}

impl SimulatedRenderer {
    pub fn new() -> Self {
        Self {
            tab_id: None,
            window_id: None,
            current_url: String::new(),
            loading: false,
            closed: false,
        }
    }

    /// Marks the in-flight load as finished (as if the engine emitted
    /// `did-stop-loading`). Test helper; real renderers drive this internally.
    pub fn finish_loading(&mut self) {
        self.loading = false;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Default for SimulatedRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl Renderer for SimulatedRenderer {
    fn current_url(&self) -> &str {
        &self.current_url
    }

    fn is_loading(&self) -> bool {
        self.loading
    }

    fn bind(&mut self, tab_id: TabId, window_id: WindowId) {
        self.tab_id = Some(tab_id);
        self.window_id = Some(window_id);
    }

    fn load(&mut self, url: &Url) -> Result<(), CoreError> {
        self.current_url = url.to_string();
        self.loading = true;
        Ok(())
    }

    fn go_back(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn go_forward(&mut self) -> Result<(), CoreError> {
        Ok(())
    }

    fn reload(&mut self, _ignore_cache: bool) -> Result<(), CoreError> {
        self.loading = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.loading = false;
    }

    fn capture(&self) -> Result<Snapshot, CoreError> {
        if self.current_url.is_empty() {
            return Err(CoreError::CaptureFailed {
                window_id: self.window_id.unwrap_or_else(WindowId::new),
                reason: "nothing rendered yet".into(),
            });
        }
        Ok(Snapshot {
            data_url: format!("data:image/png;base64,SIMULATED:{}", self.current_url),
        })
    }

    fn close(&mut self) {
        self.closed = true;
        self.loading = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_renderer_has_no_capture() {
        let r = SimulatedRenderer::new();
        assert!(r.capture().is_err());
    }

    #[test]
    fn load_sets_url_and_loading() {
        let mut r = SimulatedRenderer::new();
        r.load(&Url::parse("https://example.com/").unwrap()).unwrap();
        assert_eq!(r.current_url(), "https://example.com/");
        assert!(r.is_loading());
    }

    #[test]
    fn capture_after_load_succeeds() {
        let mut r = SimulatedRenderer::new();
        r.load(&Url::parse("https://example.com/").unwrap()).unwrap();
        let snap = r.capture().unwrap();
        assert!(snap.data_url.contains("example.com"));
    }

    #[test]
    fn close_is_idempotent() {
        let mut r = SimulatedRenderer::new();
        r.close();
        r.close();
        assert!(r.is_closed());
    }
}
