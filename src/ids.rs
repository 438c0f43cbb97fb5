//! Opaque identifiers for logical windows and tabs.
//!
//! Both ids are thin newtypes over [`uuid::Uuid`] so that windows and tabs can
//! never be confused with each other at the type level, even though both are
//! "just a UUID" underneath.

use std::fmt;
use uuid::Uuid;

/// Identifies a logical browser window for the lifetime of that window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct WindowId(Uuid);

impl WindowId {
    /// Generates a fresh, random window id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for WindowId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for WindowId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifies a tab, unique across every window for the pool's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct TabId(Uuid);

impl TabId {
    /// Generates a fresh, random tab id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TabId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for TabId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(WindowId::new(), WindowId::new());
        assert_ne!(TabId::new(), TabId::new());
    }

    #[test]
    fn display_roundtrips_uuid_text() {
        let id = Uuid::new_v4();
        let w = WindowId::from(id);
        assert_eq!(w.to_string(), id.to_string());
    }
}
