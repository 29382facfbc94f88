//! Focused and stationary tab tracking.
//!
//! A tab becomes *stationary* once it has held focus for the debounce delay
//! without another focus event superseding it. Tab and window focus each have
//! their own debounce alarm; restarting one drops (and so aborts) the old one.

use std::collections::HashMap;
use std::time::Duration;

use tracing::debug;

use crate::managers::tab_registry::TabHandle;
use crate::managers::timer_manager::{Alarm, AlarmClock, AlarmToken};
use crate::types::tab::{TabSnapshot, WindowId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusKind {
    Tab,
    Window,
}

/// Expiry of a focus debounce alarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FocusSettled {
    pub kind: FocusKind,
    pub token: AlarmToken,
}

/// A tab that just became stationary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Promotion {
    pub focused: TabHandle,
    pub window_id: WindowId,
    /// The stationary tab this promotion displaces, if any.
    pub previous_stationary: Option<TabHandle>,
}

#[derive(Debug)]
struct PendingFocus {
    alarm: Alarm,
    tab: TabHandle,
    window_id: WindowId,
}

pub struct FocusTracker<E> {
    focused: HashMap<WindowId, TabHandle>,
    stationary: HashMap<WindowId, TabHandle>,
    focused_window: Option<WindowId>,
    stationary_window: Option<WindowId>,
    pending_tab: Option<PendingFocus>,
    pending_window: Option<PendingFocus>,
    clock: AlarmClock<E>,
    delay: Duration,
}

impl<E: From<FocusSettled> + Send + 'static> FocusTracker<E> {
    pub fn new(clock: AlarmClock<E>, delay: Duration) -> Self {
        Self {
            focused: HashMap::new(),
            stationary: HashMap::new(),
            focused_window: None,
            stationary_window: None,
            pending_tab: None,
            pending_window: None,
            clock,
            delay,
        }
    }

    /// Seeds state from a tab that is active at startup.
    pub fn seed(&mut self, window_id: WindowId, tab: TabHandle, is_current_window: bool) {
        self.focused.insert(window_id, tab);
        self.stationary.insert(window_id, tab);
        if is_current_window {
            self.focused_window = Some(window_id);
            self.stationary_window = Some(window_id);
        }
    }

    /// Records `tab` as focused in its window. Returns the previously focused tab.
    pub fn set_focused_tab(&mut self, window_id: WindowId, tab: TabHandle) -> Option<TabHandle> {
        self.focused.insert(window_id, tab)
    }

    pub fn set_focused_window(&mut self, window_id: WindowId) {
        self.focused_window = Some(window_id);
    }

    /// (Re)starts the tab debounce for `tab`.
    pub fn queue_tab_settle(&mut self, tab: TabHandle, window_id: WindowId) {
        let alarm = self.schedule(FocusKind::Tab);
        self.pending_tab = Some(PendingFocus {
            alarm,
            tab,
            window_id,
        });
    }

    /// (Re)starts the window debounce for the active tab of `window_id`.
    pub fn queue_window_settle(&mut self, tab: TabHandle, window_id: WindowId) {
        let alarm = self.schedule(FocusKind::Window);
        self.pending_window = Some(PendingFocus {
            alarm,
            tab,
            window_id,
        });
    }

    fn schedule(&self, kind: FocusKind) -> Alarm {
        self.clock
            .schedule(self.delay, |token| E::from(FocusSettled { kind, token }))
    }

    /// Applies a debounce expiry. Stale tokens yield nothing.
    pub fn settle(&mut self, settled: FocusSettled) -> Option<Promotion> {
        let slot = match settled.kind {
            FocusKind::Tab => &mut self.pending_tab,
            FocusKind::Window => &mut self.pending_window,
        };
        if !slot.as_ref().is_some_and(|p| p.alarm.is_current(settled.token)) {
            debug!(kind = ?settled.kind, "ignoring stale focus alarm");
            return None;
        }
        let pending = slot.take()?;

        let previous_stationary = match settled.kind {
            FocusKind::Tab => self.stationary.insert(pending.window_id, pending.tab),
            FocusKind::Window => {
                let previous_window = self.stationary_window.replace(pending.window_id);
                previous_window.and_then(|w| self.stationary.get(&w).copied())
            }
        };
        Some(Promotion {
            focused: pending.tab,
            window_id: pending.window_id,
            previous_stationary,
        })
    }

    /// Drops every reference to `tab`.
    pub fn forget(&mut self, tab: TabHandle) {
        self.focused.retain(|_, h| *h != tab);
        self.stationary.retain(|_, h| *h != tab);
    }

    pub fn focused_window(&self) -> Option<WindowId> {
        self.focused_window
    }

    pub fn stationary_window(&self) -> Option<WindowId> {
        self.stationary_window
    }

    pub fn focused_tab(&self, window_id: WindowId) -> Option<TabHandle> {
        self.focused.get(&window_id).copied()
    }

    pub fn stationary_tab(&self, window_id: WindowId) -> Option<TabHandle> {
        self.stationary.get(&window_id).copied()
    }

    /// Whether `tab` is the focused tab of the focused window. Falls back on
    /// the snapshot's `active` flag when its window has no recorded focus.
    pub fn is_focused(&self, handle: Option<TabHandle>, tab: &TabSnapshot) -> bool {
        if Some(tab.window_id) != self.focused_window {
            return false;
        }
        self.matches(&self.focused, handle, tab)
    }

    /// Stationary here means it has held focus for the debounce delay, so the
    /// tab may not have its `active` flag set.
    pub fn is_stationary(&self, handle: Option<TabHandle>, tab: &TabSnapshot) -> bool {
        if Some(tab.window_id) != self.stationary_window {
            return false;
        }
        self.matches(&self.stationary, handle, tab)
    }

    /// Whether `tab` is the focused tab of its own window, focused or not.
    pub fn is_active(&self, handle: Option<TabHandle>, tab: &TabSnapshot) -> bool {
        self.matches(&self.focused, handle, tab)
    }

    fn matches(
        &self,
        map: &HashMap<WindowId, TabHandle>,
        handle: Option<TabHandle>,
        tab: &TabSnapshot,
    ) -> bool {
        match map.get(&tab.window_id) {
            Some(recorded) => Some(*recorded) == handle,
            None => tab.active,
        }
    }
}
