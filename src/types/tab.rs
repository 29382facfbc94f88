use std::fmt;

use serde::{Deserialize, Serialize};

/// Host-assigned tab identifier. Only stable until the host replaces the tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i32);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host-assigned window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i32);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Loading state reported by the host for a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadStatus {
    Loading,
    Complete,
}

/// Read-only view of a live tab as reported by the tab directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TabSnapshot {
    pub id: TabId,
    pub window_id: WindowId,
    pub index: usize,
    pub url: String,
    pub status: LoadStatus,
    pub active: bool,
    pub pinned: bool,
    pub audible: bool,
    pub discarded: bool,
    pub auto_discardable: bool,
    pub highlighted: bool,
    pub opener_tab_id: Option<TabId>,
}

impl TabSnapshot {
    /// A complete, inactive, unpinned tab showing `url`.
    pub fn new(id: TabId, window_id: WindowId, url: &str) -> Self {
        Self {
            id,
            window_id,
            index: 0,
            url: url.to_string(),
            status: LoadStatus::Complete,
            active: false,
            pinned: false,
            audible: false,
            discarded: false,
            auto_discardable: true,
            highlighted: false,
            opener_tab_id: None,
        }
    }

    pub fn is_loading(&self) -> bool {
        self.status == LoadStatus::Loading
    }
}

/// Fields the host reports as changed in a tab update. `None` means unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TabChange {
    pub status: Option<LoadStatus>,
    pub url: Option<String>,
    pub audible: Option<bool>,
    pub pinned: Option<bool>,
    pub discarded: Option<bool>,
}

impl TabChange {
    pub fn status(status: LoadStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.url.is_none()
            && self.audible.is_none()
            && self.pinned.is_none()
            && self.discarded.is_none()
    }
}

/// Scroll offset of a page, as remembered across suspension.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct ScrollPosition {
    pub y: f64,
}

/// Filter for directory queries. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabQuery {
    pub active: Option<bool>,
    pub highlighted: Option<bool>,
    pub window_id: Option<WindowId>,
    /// Restrict to the window the host currently considers current.
    pub current_window: bool,
    /// Restrict to the window that last had focus.
    pub last_focused_window: bool,
}

impl TabQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn active() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn in_window(window_id: WindowId) -> Self {
        Self {
            window_id: Some(window_id),
            ..Self::default()
        }
    }
}

/// Patch applied through the tab directory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TabUpdate {
    pub url: Option<String>,
    pub auto_discardable: Option<bool>,
    pub active: Option<bool>,
}

impl TabUpdate {
    pub fn navigate(url: &str) -> Self {
        Self {
            url: Some(url.to_string()),
            ..Self::default()
        }
    }

    pub fn auto_discardable(value: bool) -> Self {
        Self {
            auto_discardable: Some(value),
            ..Self::default()
        }
    }
}

/// Properties for creating a new tab.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateTab {
    pub url: String,
    pub window_id: Option<WindowId>,
    pub index: Option<usize>,
    pub opener_tab_id: Option<TabId>,
    pub active: bool,
}
