//! User-facing commands and status queries.
//!
//! These are the entry points a popup, context menu or keyboard shortcut
//! dispatcher calls. Most act on the "currently active tab": the active tab
//! of the current window, else of the stationary window, else that window's
//! stationary tab.

use serde::Deserialize;
use tracing::{debug, error, info, warn};

use super::{parse_content_status, Engine};
use crate::services::status_calculator;
use crate::services::suspended_url;
use crate::services::whitelist;
use crate::types::errors::EngineError;
use crate::types::events::DebugInfo;
use crate::types::status::{SuspendPriority, TabStatus};
use crate::types::tab::{CreateTab, TabId, TabQuery, TabSnapshot, TabUpdate};

/// A command from a dispatcher. `force` requests bypass most eligibility checks.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum UserCommand {
    SuspendHighlightedTab,
    UnsuspendHighlightedTab,
    ToggleSuspendedStateOfHighlightedTab,
    SuspendAllTabs { force: bool },
    SuspendAllTabsInAllWindows { force: bool },
    UnsuspendAllTabs,
    UnsuspendAllTabsInAllWindows,
    SuspendSelectedTabs,
    UnsuspendSelectedTabs,
    #[serde(rename_all = "camelCase")]
    ResuspendSuspendedTab { tab_id: TabId },
    #[serde(rename_all = "camelCase")]
    OpenLinkInSuspendedTab { parent_tab_id: TabId, url: String },
    #[serde(rename_all = "camelCase")]
    WhitelistHighlightedTab { include_path: bool },
    UnwhitelistHighlightedTab,
    ToggleTempWhitelistStateOfHighlightedTab,
    ResetAutoSuspendTimers,
}

impl Engine {
    /// Runs one dispatcher command.
    ///
    /// # Errors
    /// Only whitelist edits can fail, when the options cannot be saved.
    pub async fn execute(&mut self, command: UserCommand) -> Result<(), EngineError> {
        debug!(?command, "executing command");
        match command {
            UserCommand::SuspendHighlightedTab => self.suspend_highlighted_tab().await,
            UserCommand::UnsuspendHighlightedTab => self.unsuspend_highlighted_tab().await,
            UserCommand::ToggleSuspendedStateOfHighlightedTab => {
                self.toggle_suspended_state_of_highlighted_tab().await
            }
            UserCommand::SuspendAllTabs { force } => self.suspend_all_tabs(force).await,
            UserCommand::SuspendAllTabsInAllWindows { force } => {
                self.suspend_all_tabs_in_all_windows(force).await
            }
            UserCommand::UnsuspendAllTabs => self.unsuspend_all_tabs().await,
            UserCommand::UnsuspendAllTabsInAllWindows => {
                self.unsuspend_all_tabs_in_all_windows().await
            }
            UserCommand::SuspendSelectedTabs => self.suspend_selected_tabs().await,
            UserCommand::UnsuspendSelectedTabs => self.unsuspend_selected_tabs().await,
            UserCommand::ResuspendSuspendedTab { tab_id } => {
                self.resuspend_suspended_tab(tab_id).await
            }
            UserCommand::OpenLinkInSuspendedTab { parent_tab_id, url } => {
                self.open_link_in_suspended_tab(parent_tab_id, &url).await
            }
            UserCommand::WhitelistHighlightedTab { include_path } => {
                return self.whitelist_highlighted_tab(include_path).await;
            }
            UserCommand::UnwhitelistHighlightedTab => {
                self.unwhitelist_highlighted_tab().await?;
            }
            UserCommand::ToggleTempWhitelistStateOfHighlightedTab => {
                self.toggle_temp_whitelist_state_of_highlighted_tab().await;
            }
            UserCommand::ResetAutoSuspendTimers => {
                self.reset_auto_suspend_timer_for_all_tabs().await
            }
        }
        Ok(())
    }

    pub async fn currently_active_tab(&self) -> Option<TabSnapshot> {
        let current = TabQuery {
            active: Some(true),
            current_window: true,
            ..TabQuery::default()
        };
        if let Some(tab) = self.host.tabs.query(current).await.into_iter().next() {
            return Some(tab);
        }

        let window_id = self.focus.stationary_window()?;
        let stationary = TabQuery {
            active: Some(true),
            ..TabQuery::in_window(window_id)
        };
        if let Some(tab) = self.host.tabs.query(stationary).await.into_iter().next() {
            return Some(tab);
        }

        let handle = self.focus.stationary_tab(window_id)?;
        let tab_id = self.registry.current_id(handle)?;
        self.host.tabs.get(tab_id).await
    }

    pub async fn tab_status(&self, tab_id: TabId) -> TabStatus {
        match self.host.tabs.get(tab_id).await {
            Some(tab) => self.calculate_tab_status(&tab, None).await,
            None => TabStatus::Unknown,
        }
    }

    pub async fn active_tab_status(&self) -> TabStatus {
        match self.currently_active_tab().await {
            Some(tab) => self.calculate_tab_status(&tab, None).await,
            None => TabStatus::Unknown,
        }
    }

    pub async fn debug_info(&self, tab_id: TabId) -> DebugInfo {
        let mut info = DebugInfo {
            window_id: None,
            tab_id: None,
            status: TabStatus::Unknown,
            timer_up: self.timer_up(tab_id),
        };
        let Some(tab) = self.host.tabs.get(tab_id).await else {
            error!(tab_id = %tab_id, "debug info requested for unknown tab");
            return info;
        };
        info.window_id = Some(tab.window_id);
        info.tab_id = Some(tab.id);

        let file_access = self.environment.file_access_allowed;
        if self.urls.is_normal_tab(&tab, file_access) && !tab.discarded {
            let known = match self.host.messenger.request_info(tab.id).await {
                Ok(response) => parse_content_status(tab.id, &response),
                Err(e) => {
                    warn!(tab_id = %tab.id, error = %e, "failed to get debug info");
                    None
                }
            };
            info.status =
                status_calculator::compute_status(&tab, known, &self.status_context(&tab));
        } else {
            info.status = self.calculate_tab_status(&tab, None).await;
        }
        info
    }

    pub async fn suspend_highlighted_tab(&mut self) {
        if let Some(tab) = self.currently_active_tab().await {
            self.request_suspension(&tab, SuspendPriority::Manual);
        }
    }

    pub async fn unsuspend_highlighted_tab(&mut self) {
        if let Some(tab) = self.currently_active_tab().await {
            self.unsuspend_tab(&tab).await;
        }
    }

    pub async fn toggle_suspended_state_of_highlighted_tab(&mut self) {
        let Some(tab) = self.currently_active_tab().await else {
            return;
        };
        if self.urls.is_suspended_tab(&tab) {
            self.unsuspend_tab(&tab).await;
        } else {
            self.request_suspension(&tab, SuspendPriority::Manual);
        }
    }

    /// Suspends every inactive tab in the current window.
    pub async fn suspend_all_tabs(&mut self, force: bool) {
        let Some(active) = self.currently_active_tab().await else {
            warn!("could not determine currently active window");
            return;
        };
        let priority = SuspendPriority::for_force(force);
        let tabs = self.host.tabs.query(TabQuery::in_window(active.window_id)).await;
        for tab in tabs.iter().filter(|t| !t.active) {
            self.request_suspension(tab, priority);
        }
    }

    pub async fn suspend_all_tabs_in_all_windows(&mut self, force: bool) {
        let priority = SuspendPriority::for_force(force);
        let tabs = self.host.tabs.query(TabQuery::all()).await;
        for tab in &tabs {
            self.request_suspension(tab, priority);
        }
    }

    /// Unsuspends the current window's suspended tabs and re-arms the rest.
    pub async fn unsuspend_all_tabs(&mut self) {
        let Some(active) = self.currently_active_tab().await else {
            warn!("could not determine currently active window");
            return;
        };
        let file_access = self.environment.file_access_allowed;
        let tabs = self.host.tabs.query(TabQuery::in_window(active.window_id)).await;
        for tab in &tabs {
            self.host.scheduler.dequeue(tab.id);
            if self.urls.is_suspended_tab(tab) {
                self.unsuspend_tab(tab).await;
            } else if self.urls.is_normal_tab(tab, file_access) && !tab.active {
                self.reset_auto_suspend_timer(tab);
            }
        }
    }

    /// Unsuspending steals window focus, so the current window goes last.
    pub async fn unsuspend_all_tabs_in_all_windows(&mut self) {
        let current_window = self.host.tabs.last_focused_window().await;
        let file_access = self.environment.file_access_allowed;
        let tabs = self.host.tabs.query(TabQuery::all()).await;
        let mut deferred = Vec::new();
        for tab in &tabs {
            self.host.scheduler.dequeue(tab.id);
            if self.urls.is_suspended_tab(tab) {
                if Some(tab.window_id) == current_window {
                    deferred.push(tab);
                } else {
                    self.unsuspend_tab(tab).await;
                }
            } else if self.urls.is_normal_tab(tab, file_access) {
                self.reset_auto_suspend_timer(tab);
            }
        }
        for tab in deferred {
            self.unsuspend_tab(tab).await;
        }
    }

    fn selected_tabs_query() -> TabQuery {
        TabQuery {
            highlighted: Some(true),
            last_focused_window: true,
            ..TabQuery::default()
        }
    }

    pub async fn suspend_selected_tabs(&mut self) {
        let tabs = self.host.tabs.query(Self::selected_tabs_query()).await;
        for tab in &tabs {
            self.request_suspension(tab, SuspendPriority::Manual);
        }
    }

    pub async fn unsuspend_selected_tabs(&mut self) {
        let tabs = self.host.tabs.query(Self::selected_tabs_query()).await;
        for tab in &tabs {
            self.host.scheduler.dequeue(tab.id);
            if self.urls.is_suspended_tab(tab) {
                self.unsuspend_tab(tab).await;
            }
        }
    }

    /// Reloads a suspended tab without letting the reload unsuspend it.
    pub async fn resuspend_suspended_tab(&mut self, tab_id: TabId) {
        if let Err(e) = self.host.messenger.disable_unsuspend_on_reload(tab_id).await {
            warn!(tab_id = %tab_id, error = %e, "failed to disable unsuspend on reload");
            return;
        }
        if let Err(e) = self.host.tabs.reload(tab_id).await {
            warn!(tab_id = %tab_id, error = %e, "failed to reload tab");
        }
    }

    /// Opens `url` in a background tab that suspends as soon as it has loaded.
    /// The new tab goes after the parent and any tabs already opened from it.
    pub async fn open_link_in_suspended_tab(&mut self, parent_tab_id: TabId, url: &str) {
        let Some(parent) = self.host.tabs.get(parent_tab_id).await else {
            warn!(tab_id = %parent_tab_id, "parent tab no longer exists");
            return;
        };
        let mut tabs = self.host.tabs.query(TabQuery::in_window(parent.window_id)).await;
        tabs.sort_by_key(|t| t.index);

        let mut index = parent.index + 1;
        while tabs
            .get(index)
            .is_some_and(|t| t.opener_tab_id == Some(parent.id))
        {
            index += 1;
        }

        let props = CreateTab {
            url: url.to_string(),
            window_id: Some(parent.window_id),
            index: Some(index),
            opener_tab_id: Some(parent.id),
            active: false,
        };
        match self.host.tabs.create(props).await {
            Ok(tab) => self.set_suspend_on_reload_url(tab.id, &tab.url),
            Err(e) => warn!(tab_id = %parent_tab_id, error = %e, "failed to open link"),
        }
    }

    /// Whitelists the active tab's site (or page, with `include_path`).
    ///
    /// # Errors
    /// Returns `EngineError::Settings` if the whitelist cannot be saved.
    pub async fn whitelist_highlighted_tab(&mut self, include_path: bool) -> Result<(), EngineError> {
        let Some(tab) = self.currently_active_tab().await else {
            return Ok(());
        };
        if self.urls.is_suspended_tab(&tab) {
            let original = suspended_url::original_url(&tab.url).unwrap_or_default();
            self.save_to_whitelist(&whitelist::root_url(&original, include_path))?;
            self.unsuspend_tab(&tab).await;
        } else {
            self.save_to_whitelist(&whitelist::root_url(&tab.url, include_path))?;
            self.refresh_presentation(&tab, None).await;
        }
        Ok(())
    }

    /// Removes every whitelist entry matching the active tab and returns its new status.
    ///
    /// # Errors
    /// Returns `EngineError::Settings` if the whitelist cannot be saved.
    pub async fn unwhitelist_highlighted_tab(&mut self) -> Result<TabStatus, EngineError> {
        let Some(tab) = self.currently_active_tab().await else {
            return Ok(TabStatus::Unknown);
        };
        let updated = whitelist::remove_matching(&self.options.options().whitelist, &tab.url);
        self.options.set_whitelist(updated)?;
        Ok(self.refresh_presentation(&tab, None).await)
    }

    fn save_to_whitelist(&mut self, entry: &str) -> Result<(), EngineError> {
        let updated = whitelist::add_entry(&self.options.options().whitelist, entry);
        self.options.set_whitelist(updated)?;
        info!(entry, "added to whitelist");
        Ok(())
    }

    /// Toggles the temporary whitelist of the active tab and returns its new status.
    pub async fn toggle_temp_whitelist_state_of_highlighted_tab(&mut self) -> TabStatus {
        let Some(tab) = self.currently_active_tab().await else {
            return TabStatus::Unknown;
        };
        if self.urls.is_suspended_tab(&tab) {
            if let Err(e) = self.host.messenger.temporary_whitelist_suspended(tab.id).await {
                warn!(tab_id = %tab.id, error = %e, "failed to temporarily whitelist suspended tab");
            }
            return TabStatus::Unknown;
        }

        let status = self.calculate_tab_status(&tab, None).await;
        let enable = match status {
            TabStatus::Active | TabStatus::Normal => true,
            TabStatus::TempWhitelist | TabStatus::FormInput => false,
            other => return other,
        };

        let known = match self.host.messenger.set_temporary_whitelist(tab.id, enable).await {
            Ok(response) => parse_content_status(tab.id, &response),
            Err(e) => {
                warn!(tab_id = %tab.id, enable, error = %e, "failed to toggle temporary whitelist");
                None
            }
        };
        let new_status = self.refresh_presentation(&tab, known).await;

        // Keep the host from discarding a tab the user asked to keep.
        let whitelisted = new_status == TabStatus::TempWhitelist;
        if whitelisted == tab.auto_discardable {
            let update = TabUpdate::auto_discardable(!whitelisted);
            if let Err(e) = self.host.tabs.update(tab.id, update).await {
                warn!(tab_id = %tab.id, error = %e, "failed to update auto-discardable flag");
            }
        }
        new_status
    }

    /// Re-arms every tab that is neither suspended nor special.
    pub async fn reset_auto_suspend_timer_for_all_tabs(&mut self) {
        let file_access = self.environment.file_access_allowed;
        let tabs = self.host.tabs.query(TabQuery::all()).await;
        for tab in &tabs {
            if self.urls.is_suspended_tab(tab) || self.urls.is_special_url(&tab.url, file_access) {
                continue;
            }
            self.reset_auto_suspend_timer(tab);
        }
    }
}
