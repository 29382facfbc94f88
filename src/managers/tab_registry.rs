//! Logical tab identity.
//!
//! The host renumbers a tab when it discards or prerenders it. Everything the
//! engine tracks about a tab is keyed by a [`TabHandle`] instead of the host
//! id, so a replacement only has to re-point one registry entry.

use std::collections::HashMap;
use std::fmt;

use uuid::Uuid;

use crate::types::tab::TabId;

/// Stable identity of a tab across host id changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TabHandle(Uuid);

impl TabHandle {
    fn new() -> Self {
        TabHandle(Uuid::new_v4())
    }
}

impl fmt::Display for TabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of applying a host id replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rekey {
    /// Handle that now resolves to the added id.
    pub moved: Option<TabHandle>,
    /// Handle the added id resolved to before the replacement, if it was a
    /// different one. Its state belongs to no live tab any more.
    pub orphaned: Option<TabHandle>,
}

/// Bidirectional map between host ids and logical handles.
#[derive(Debug, Default)]
pub struct TabRegistry {
    by_id: HashMap<TabId, TabHandle>,
    by_handle: HashMap<TabHandle, TabId>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the handle for `tab_id`, registering a new one on first sight.
    pub fn ensure(&mut self, tab_id: TabId) -> TabHandle {
        if let Some(handle) = self.by_id.get(&tab_id) {
            return *handle;
        }
        let handle = TabHandle::new();
        self.by_id.insert(tab_id, handle);
        self.by_handle.insert(handle, tab_id);
        handle
    }

    pub fn lookup(&self, tab_id: TabId) -> Option<TabHandle> {
        self.by_id.get(&tab_id).copied()
    }

    /// The host id `handle` currently resolves to.
    pub fn current_id(&self, handle: TabHandle) -> Option<TabId> {
        self.by_handle.get(&handle).copied()
    }

    /// Re-points the entry for `removed` at `added`.
    pub fn rekey(&mut self, removed: TabId, added: TabId) -> Rekey {
        if removed == added {
            return Rekey {
                moved: self.lookup(added),
                orphaned: None,
            };
        }
        let Some(handle) = self.by_id.remove(&removed) else {
            return Rekey::default();
        };
        let orphaned = self.by_id.insert(added, handle);
        if let Some(stale) = orphaned {
            self.by_handle.remove(&stale);
        }
        self.by_handle.insert(handle, added);
        Rekey {
            moved: Some(handle),
            orphaned,
        }
    }

    /// Forgets `tab_id`, returning the handle it resolved to.
    pub fn remove(&mut self, tab_id: TabId) -> Option<TabHandle> {
        let handle = self.by_id.remove(&tab_id)?;
        self.by_handle.remove(&handle);
        Some(handle)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}
