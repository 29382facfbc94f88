//! Tab and window focus handling, stationary promotion and hotkey refresh.

use tracing::{debug, warn};

use super::{Engine, InternalEvent, SHORTCUTS_URL};
use crate::managers::focus_tracker::Promotion;
use crate::types::tab::{LoadStatus, TabId, TabQuery, WindowId};

impl Engine {
    pub(super) async fn handle_window_focus_changed(&mut self, window_id: Option<WindowId>) {
        let Some(window_id) = window_id.filter(|w| w.0 >= 0) else {
            return;
        };
        debug!(window_id = %window_id, "window focus changed");
        self.focus.set_focused_window(window_id);

        let active_tabs = self.host.tabs.query(TabQuery::active()).await;
        let Some(focused_tab) = active_tabs
            .into_iter()
            .filter(|t| t.window_id == window_id)
            .last()
        else {
            warn!(window_id = %window_id, "couldn't find active tab in window, it may have been closed");
            return;
        };

        self.refresh_presentation(&focused_tab, None).await;

        // Users often key through intermediate windows; wait before treating this one as settled.
        let handle = self.registry.ensure(focused_tab.id);
        self.focus.queue_window_settle(handle, window_id);
    }

    pub(super) async fn handle_tab_focus_changed(&mut self, tab_id: TabId, window_id: WindowId) {
        debug!(tab_id = %tab_id, "tab gained focus");
        let handle = self.registry.ensure(tab_id);
        let previous_focused = self.focus.set_focused_tab(window_id, handle);

        if self.hotkey_refresh_pending {
            self.hotkey_refresh_pending = false;
            self.update_suspend_hotkey().await;
        }

        let Some(focused_tab) = self.host.tabs.get(tab_id).await else {
            warn!(tab_id = %tab_id, "focused tab no longer exists");
            return;
        };

        self.host.discards.unqueue(focused_tab.id);
        self.refresh_presentation(&focused_tab, None).await;
        self.focus.queue_tab_settle(handle, window_id);

        if focused_tab.url == SHORTCUTS_URL {
            self.hotkey_refresh_pending = true;
        }

        if !self.options.options().discard_after_suspend {
            return;
        }
        let Some(previous_handle) = previous_focused else {
            return;
        };
        let Some(previous_id) = self.registry.current_id(previous_handle) else {
            return;
        };
        let Some(previous_tab) = self.host.tabs.get(previous_id).await else {
            return;
        };
        if !self.urls.is_suspended_url_loose(&previous_tab.url) {
            return;
        }
        // Give the tab check queue time to pick the tab up first.
        self.clock.schedule_detached(
            self.config.discard_check_delay,
            InternalEvent::DiscardCheckDue(previous_handle),
        );
    }

    pub(super) async fn handle_new_stationary_focus(&mut self, promotion: Promotion) {
        let Some(tab_id) = self.registry.current_id(promotion.focused) else {
            return;
        };
        let Some(focused_tab) = self.host.tabs.get(tab_id).await else {
            return;
        };
        debug!(tab_id = %tab_id, "new stationary tab focus");

        if let Some(props) = self.unsuspended.get_mut(promotion.focused) {
            props.suspend_on_reload_url = None;
        }

        let displaced = promotion
            .previous_stationary
            .filter(|previous| *previous != promotion.focused);

        if self.urls.is_suspended_tab(&focused_tab) {
            if self.options.options().unsuspend_on_focus {
                if self.environment.online {
                    self.unsuspend_tab(&focused_tab).await;
                } else if let Err(e) = self.host.messenger.no_connectivity_notice(tab_id).await {
                    warn!(tab_id = %tab_id, error = %e, "failed to send no connectivity notice");
                }
            }
        } else if self
            .urls
            .is_normal_tab(&focused_tab, self.environment.file_access_allowed)
        {
            if focused_tab.status == LoadStatus::Complete {
                self.clear_auto_suspend_timer(&focused_tab);
            }
            // A popup closing can look like a refocus of the same tab.
            if displaced.is_some() {
                self.host.scheduler.dequeue(tab_id);
            }
        }

        let Some(previous_id) = displaced.and_then(|h| self.registry.current_id(h)) else {
            return;
        };
        let Some(previous_tab) = self.host.tabs.get(previous_id).await else {
            return;
        };
        if self
            .urls
            .is_normal_tab(&previous_tab, self.environment.file_access_allowed)
        {
            self.reset_auto_suspend_timer(&previous_tab);
        }
    }

    /// Rebuilds the suspend hotkey and pushes it to placeholders when it changed.
    async fn update_suspend_hotkey(&mut self) {
        let hotkey = self.host.hotkeys.suspend_toggle_hotkey();
        if hotkey == self.hotkey {
            return;
        }
        self.hotkey = hotkey.clone();
        if let Err(e) = self.host.messenger.refresh_suspended_pages(hotkey).await {
            debug!(error = %e, "failed to refresh hotkey on suspended pages");
        }
    }
}
