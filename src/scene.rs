//! The host window's scene graph, abstracted.
//!
//! `ViewManager` is the only component that touches this; the real scene
//! graph (compositor layers, platform views) is an external collaborator.

use crate::ids::{TabId, WindowId};
use crate::state::Bounds;

/// An RGBA background color, as set behind a view before content paints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

/// The primitives `ViewManager`/the facade need from the host's scene graph.
/// Every method must be idempotent against the scene's actual membership (§4.7).
pub trait Scene: Send {
    /// Attaches `tab_id` to the scene at `bounds`. Idempotent: re-attaching
    /// an already-attached tab just updates its bounds.
    fn attach(&mut self, tab_id: TabId, bounds: Bounds);
    fn detach(&mut self, tab_id: TabId);
    fn set_visible(&mut self, tab_id: TabId, visible: bool);
    /// Re-homes `tab_id` to the top of the z-order (remove-then-add idiom).
    fn bring_to_top(&mut self, tab_id: TabId);
    fn is_attached(&self, tab_id: TabId) -> bool;
    fn is_visible(&self, tab_id: TabId) -> bool;
    /// Updates the bounds of an already-attached tab without re-homing it.
    fn set_bounds(&mut self, tab_id: TabId, bounds: Bounds);
    /// Sets the color painted behind `tab_id` before its content has loaded.
    fn set_background_color(&mut self, tab_id: TabId, color: Color);
    /// Dismisses any context-menu overlay the host is presenting for `window_id`.
    fn hide_context_menu_overlay(&mut self, window_id: WindowId);
    /// Supports downcasting a `Box<dyn Scene>` back to its concrete type in tests.
    fn as_any(&self) -> &dyn std::any::Any;
}

/// An in-memory scene used by default-constructed services and by tests: an
/// ordered list of attached tabs (ascending z-order) plus a visibility flag.
#[derive(Debug, Default)]
pub struct ListScene {
    order: Vec<TabId>,
    hidden: std::collections::HashSet<TabId>,
    background_colors: std::collections::HashMap<TabId, Color>,
    context_menu_hidden: std::collections::HashSet<WindowId>,
    bounds: std::collections::HashMap<TabId, Bounds>,
}

impl ListScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current attachment order, bottom to top. Test/debug helper.
    pub fn order(&self) -> &[TabId] {
        &self.order
    }

    pub fn background_color(&self, tab_id: TabId) -> Option<Color> {
        self.background_colors.get(&tab_id).copied()
    }

    pub fn is_context_menu_overlay_hidden(&self, window_id: WindowId) -> bool {
        self.context_menu_hidden.contains(&window_id)
    }

    pub fn bounds(&self, tab_id: TabId) -> Option<Bounds> {
        self.bounds.get(&tab_id).copied()
    }
}

impl Scene for ListScene {
    fn attach(&mut self, tab_id: TabId, bounds: Bounds) {
        if !self.order.contains(&tab_id) {
            self.order.push(tab_id);
        }
        self.bounds.insert(tab_id, bounds);
    }

    fn detach(&mut self, tab_id: TabId) {
        self.order.retain(|t| *t != tab_id);
        self.hidden.remove(&tab_id);
        self.bounds.remove(&tab_id);
    }

    fn set_visible(&mut self, tab_id: TabId, visible: bool) {
        if visible {
            self.hidden.remove(&tab_id);
        } else {
            self.hidden.insert(tab_id);
        }
    }

    fn bring_to_top(&mut self, tab_id: TabId) {
        self.order.retain(|t| *t != tab_id);
        self.order.push(tab_id);
    }

    fn is_attached(&self, tab_id: TabId) -> bool {
        self.order.contains(&tab_id)
    }

    fn is_visible(&self, tab_id: TabId) -> bool {
        self.is_attached(tab_id) && !self.hidden.contains(&tab_id)
    }

    fn set_bounds(&mut self, tab_id: TabId, bounds: Bounds) {
        self.bounds.insert(tab_id, bounds);
    }

    fn set_background_color(&mut self, tab_id: TabId, color: Color) {
        self.background_colors.insert(tab_id, color);
    }

    fn hide_context_menu_overlay(&mut self, window_id: WindowId) {
        self.context_menu_hidden.insert(window_id);
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bounds() -> Bounds {
        Bounds { x: 0, y: 0, width: 800, height: 600 }
    }

    #[test]
    fn attach_is_idempotent() {
        let mut s = ListScene::new();
        let t = TabId::new();
        s.attach(t, bounds());
        s.attach(t, bounds());
        assert_eq!(s.order().len(), 1);
    }

    #[test]
    fn bring_to_top_moves_to_end() {
        let mut s = ListScene::new();
        let (a, b) = (TabId::new(), TabId::new());
        s.attach(a, bounds());
        s.attach(b, bounds());
        s.bring_to_top(a);
        assert_eq!(s.order(), &[b, a]);
    }

    #[test]
    fn hidden_until_set_visible() {
        let mut s = ListScene::new();
        let t = TabId::new();
        s.attach(t, bounds());
        s.set_visible(t, false);
        assert!(s.is_attached(t));
        assert!(!s.is_visible(t));
        s.set_visible(t, true);
        assert!(s.is_visible(t));
    }

    #[test]
    fn detach_clears_visibility_state() {
        let mut s = ListScene::new();
        let t = TabId::new();
        s.attach(t, bounds());
        s.detach(t);
        assert!(!s.is_attached(t));
        assert!(!s.is_visible(t));
    }

    #[test]
    fn attach_records_bounds_and_set_bounds_updates_them() {
        let mut s = ListScene::new();
        let t = TabId::new();
        s.attach(t, bounds());
        assert_eq!(s.bounds(t), Some(bounds()));

        let resized = Bounds { x: 0, y: 0, width: 1024, height: 768 };
        s.set_bounds(t, resized);
        assert_eq!(s.bounds(t), Some(resized));
    }

    #[test]
    fn detach_clears_bounds() {
        let mut s = ListScene::new();
        let t = TabId::new();
        s.attach(t, bounds());
        s.detach(t);
        assert_eq!(s.bounds(t), None);
    }

    #[test]
    fn background_color_is_tracked_per_tab() {
        let mut s = ListScene::new();
        let t = TabId::new();
        assert_eq!(s.background_color(t), None);
        s.set_background_color(t, Color { r: 255, g: 255, b: 255, a: 255 });
        assert_eq!(s.background_color(t), Some(Color { r: 255, g: 255, b: 255, a: 255 }));
    }

    #[test]
    fn hide_context_menu_overlay_is_tracked_per_window() {
        let mut s = ListScene::new();
        let w = WindowId::new();
        assert!(!s.is_context_menu_overlay_hidden(w));
        s.hide_context_menu_overlay(w);
        assert!(s.is_context_menu_overlay_hidden(w));
    }
}
