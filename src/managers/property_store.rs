//! Per-tab transient properties.
//!
//! Two stores exist: one for tabs showing their real page and one for tabs
//! showing the suspended placeholder. Both are keyed by [`TabHandle`].

use std::collections::HashMap;

use crate::managers::tab_registry::TabHandle;
use crate::managers::timer_manager::SuspendTimer;
use crate::types::status::SuspendReason;
use crate::types::tab::ScrollPosition;

/// Properties of a tab showing its real page.
#[derive(Debug, Default)]
pub struct UnsuspendedTabProps {
    pub timer: Option<SuspendTimer>,
    /// Suspend the tab once it finishes loading this URL. Consumed on the next load.
    pub suspend_on_reload_url: Option<String>,
    /// Reason recorded when suspension was requested. `ForcedDiscard` also
    /// marks a discard that has already been handled.
    pub pending_suspend_reason: Option<SuspendReason>,
}

impl UnsuspendedTabProps {
    pub fn take_suspend_on_reload_url(&mut self) -> Option<String> {
        self.suspend_on_reload_url.take()
    }

    pub fn is_discard_handled(&self) -> bool {
        self.pending_suspend_reason == Some(SuspendReason::ForcedDiscard)
    }
}

/// Properties of a tab showing the suspended placeholder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SuspendedTabProps {
    /// Temporarily whitelist the page on its next unsuspended load.
    pub temp_whitelist_on_reload: bool,
    /// Unsuspend instead of reloading the placeholder when it reloads with this URL.
    pub unsuspend_on_reload_url: Option<String>,
    pub suspend_reason: Option<SuspendReason>,
    pub scroll_position: Option<ScrollPosition>,
    /// Sampled once per suspension; `None` until sampled.
    pub show_banner: Option<bool>,
}

impl SuspendedTabProps {
    pub fn take_unsuspend_on_reload_url(&mut self) -> Option<String> {
        self.unsuspend_on_reload_url.take()
    }
}

/// Map from tab handle to a property bag.
#[derive(Debug)]
pub struct PropertyStore<P> {
    entries: HashMap<TabHandle, P>,
}

impl<P> Default for PropertyStore<P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<P: Default> PropertyStore<P> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, handle: TabHandle) -> Option<&P> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: TabHandle) -> Option<&mut P> {
        self.entries.get_mut(&handle)
    }

    /// Returns the entry for `handle`, creating an empty one if needed.
    pub fn entry(&mut self, handle: TabHandle) -> &mut P {
        self.entries.entry(handle).or_default()
    }

    pub fn remove(&mut self, handle: TabHandle) -> Option<P> {
        self.entries.remove(&handle)
    }

    pub fn contains(&self, handle: TabHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
