#![forbid(unsafe_code)]

//! # Classic Browser Core
//!
//! A headless, engine-agnostic core for a tabbed, multi-window browser
//! surface. It owns the authoritative state of every window and tab,
//! arbitrates a bounded pool of live renderers, reconciles that state against
//! a host scene graph, and exposes both as a single typed command surface.
//!
//! The Core never touches a real rendering engine, a GPU surface, or a
//! window manager directly — those are external collaborators reached
//! through the [`Renderer`] and [`Scene`] traits. A host wires a concrete
//! implementation of each in and drives everything else through
//! [`ClassicBrowserService`].
//!
//! ## Quick start
//!
//! ```rust
//! use classic_browser_core::prelude::*;
//!
//! let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
//! let factory: Box<dyn RendererFactory> =
//!     Box::new(ClosureRendererFactory(|| Ok(Box::new(SimulatedRenderer::new()) as Box<dyn Renderer>)));
//! let mut service = ClassicBrowserService::new(
//!     CoreConfig::default(),
//!     factory,
//!     Box::new(ListScene::new()),
//!     tx,
//! );
//!
//! let window_id = WindowId::new();
//! service
//!     .dispatch(CoreCommand::CreateBrowserView {
//!         window_id,
//!         bounds: Bounds { x: 0, y: 0, width: 1280, height: 800 },
//!         url: Some("https://example.com/".to_string()),
//!     })
//!     .unwrap();
//! ```
//!
//! ## Modules
//! - [`facade`] — [`ClassicBrowserService`], the composition root and command surface
//! - [`state`] — authoritative [`WindowState`]/[`TabState`] and the [`StateService`] that owns them
//! - [`view_pool`] — the bounded LRU pool of live [`Renderer`]s
//! - [`snapshot_store`] — captured-bitmap cache and the freeze/unfreeze state machine
//! - [`view_manager`] — reconciles state against the host [`Scene`]
//! - [`tab_service`] — tab create/switch/close policy
//! - [`navigation_service`] — user-initiated navigation and context-menu actions
//! - [`event_bus`] — the in-process publish/subscribe bus
//! - [`config`] — [`CoreConfig`] and its validating builder
//! - [`errors`] — the crate's single error type
//! - [`ids`] — opaque [`WindowId`]/[`TabId`]
//! - [`url_policy`] — URL equivalence and the authentication-URL heuristic
//! - [`renderer`] — the [`Renderer`] trait and [`SimulatedRenderer`] test double
//! - [`scene`] — the [`Scene`] trait and [`ListScene`] test double

pub mod config;
pub mod errors;
pub mod event_bus;
pub mod facade;
pub mod ids;
pub mod navigation_service;
pub mod renderer;
pub mod scene;
pub mod snapshot_store;
pub mod state;
pub mod tab_service;
pub mod url_policy;
pub mod view_manager;
pub mod view_pool;

pub use config::{CoreConfig, CoreConfigBuilder, CoreConfigError};
pub use errors::CoreError;
pub use event_bus::{CoreEvent, EventBus, EventKind, SubscriptionId};
pub use facade::{ClassicBrowserService, CoreCommand, CoreCommandOutcome, HostWindowDescriptor};
pub use ids::{TabId, WindowId};
pub use navigation_service::ContextMenuAction;
pub use renderer::{Renderer, Snapshot};
pub use scene::Scene;
pub use state::{Bounds, FreezeState, OutboundUpdate, TabState, TabStateDelta, WindowState};

/// Everything most hosts need in scope to drive a [`ClassicBrowserService`].
pub mod prelude {
    pub use crate::{
        Bounds, ClassicBrowserService, ContextMenuAction, CoreCommand, CoreCommandOutcome,
        CoreConfig, CoreError, CoreEvent, EventBus, FreezeState, HostWindowDescriptor, Renderer,
        Scene, TabId, TabState, WindowId, WindowState,
    };
    pub use crate::renderer::SimulatedRenderer;
    pub use crate::scene::ListScene;
    pub use crate::view_pool::{ClosureRendererFactory, RendererFactory};
}
