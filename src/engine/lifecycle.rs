//! Host lifecycle events: creation, removal, replacement and updates.

use tracing::{debug, error, info, warn};

use super::{Engine, SHORTCUTS_URL};
use crate::services::suspended_url::{self, TabClass};
use crate::services::whitelist;
use crate::types::errors::EngineError;
use crate::types::events::{ContentRequest, HostEvent, NormalPageInit, SuspendedPageInit};
use crate::types::status::{ContentStatus, SuspendPriority, SuspendReason, TabStatus};
use crate::types::tab::{LoadStatus, TabChange, TabId, TabSnapshot, TabUpdate};

/// Shown on the placeholder of a tab the host discarded under memory pressure.
const LOW_MEMORY_REASON: &str = "This tab was suspended to save memory.";

/// Stored previews shorter than this are treated as failed captures.
const MIN_PREVIEW_LEN: usize = 10_000;

impl Engine {
    /// Dispatches one host event.
    ///
    /// # Errors
    /// Returns `EngineError::Malformed` for content messages that do not parse.
    /// Nothing is changed in that case.
    pub async fn handle_event(&mut self, event: HostEvent) -> Result<(), EngineError> {
        match event {
            HostEvent::TabCreated(tab) => {
                debug!(tab_id = %tab.id, url = %tab.url, "tab created");
                self.queue_session_save();
                if self.urls.is_suspended_url_loose(&tab.url) {
                    self.host.tab_checks.queue_tab_check(&tab);
                }
            }
            HostEvent::TabRemoved(tab_id) => {
                debug!(tab_id = %tab_id, "tab removed");
                self.queue_session_save();
                self.remove_tab_references(tab_id);
            }
            HostEvent::TabReplaced { added, removed } => self.update_tab_id_references(added, removed),
            HostEvent::TabUpdated { change, tab } => self.handle_tab_updated(change, tab).await,
            HostEvent::TabActivated { tab_id, window_id } => {
                self.handle_tab_focus_changed(tab_id, window_id).await
            }
            HostEvent::WindowFocusChanged(window_id) => {
                self.handle_window_focus_changed(window_id).await
            }
            HostEvent::WindowCreated(window_id) => {
                debug!(window_id = %window_id, "window created");
                self.queue_session_save();
            }
            HostEvent::WindowRemoved(window_id) => {
                debug!(window_id = %window_id, "window removed");
                self.queue_session_save();
            }
            HostEvent::ChargingChanged(charging) => self.handle_charging_changed(charging).await,
            HostEvent::ConnectivityChanged(online) => {
                self.handle_connectivity_changed(online).await
            }
            HostEvent::ContentMessage { sender, payload } => {
                let request: ContentRequest = serde_json::from_value(payload)
                    .map_err(|e| EngineError::Malformed(format!("content message: {}", e)))?;
                self.handle_content_request(sender, request).await;
            }
        }
        Ok(())
    }

    /// Re-points the registry entry of `removed` at `added`. Property stores,
    /// focus maps and armed timers refer to the handle and follow automatically.
    fn update_tab_id_references(&mut self, added: TabId, removed: TabId) {
        debug!(tab_id = %removed, new_tab_id = %added, "updating tab id references");
        let rekey = self.registry.rekey(removed, added);
        if let Some(orphaned) = rekey.orphaned {
            self.unsuspended.remove(orphaned);
            self.suspended.remove(orphaned);
            self.focus.forget(orphaned);
        }
    }

    fn remove_tab_references(&mut self, tab_id: TabId) {
        let Some(handle) = self.registry.remove(tab_id) else {
            return;
        };
        self.focus.forget(handle);
        self.unsuspended.remove(handle);
        self.suspended.remove(handle);
    }

    async fn handle_tab_updated(&mut self, change: TabChange, tab: TabSnapshot) {
        if let Some(url) = &change.url {
            debug!(tab_id = %tab.id, url = %url, "tab url changed");
            if url == SHORTCUTS_URL {
                self.hotkey_refresh_pending = true;
            }
            self.queue_session_save();
        }

        match self.urls.classify(&tab, self.environment.file_access_allowed) {
            TabClass::Suspended => self.handle_suspended_tab_state_changed(&tab, &change).await,
            TabClass::Normal => self.handle_unsuspended_tab_state_changed(&tab, &change).await,
            TabClass::Other => {}
        }
    }

    async fn handle_unsuspended_tab_state_changed(&mut self, tab: &TabSnapshot, change: &TabChange) {
        if change.status.is_none()
            && change.audible.is_none()
            && change.pinned.is_none()
            && change.discarded.is_none()
        {
            return;
        }
        debug!(tab_id = %tab.id, ?change, "unsuspended tab state changed");

        if change.discarded == Some(true) {
            let handle = self.registry.ensure(tab.id);
            let props = self.unsuspended.entry(handle);
            if props.is_discard_handled() {
                debug!(tab_id = %tab.id, "discard already handled");
                return;
            }
            info!(tab_id = %tab.id, url = %tab.url, "unsuspended tab has been discarded");
            props.pending_suspend_reason = Some(SuspendReason::ForcedDiscard);
            self.host.discards.handle_discarded_unsuspended(tab);
            // The host assigns a new id on discard; the session must pick it up.
            self.queue_session_save();
            return;
        }

        let options = self.options.options();
        let rearm_for_audio = change.audible == Some(false) && options.ignore_audio;
        let rearm_for_unpin = change.pinned == Some(false) && options.ignore_pinned;
        let mut status_changed = change.audible.is_some() || change.pinned.is_some();
        if rearm_for_audio || rearm_for_unpin {
            self.reset_auto_suspend_timer(tab);
        }

        if change.status == Some(LoadStatus::Complete) {
            let handle = self.registry.ensure(tab.id);
            let props = self.unsuspended.entry(handle);
            // A normal page loaded, so any forced discard episode is over.
            if props.is_discard_handled() {
                props.pending_suspend_reason = None;
            }
            let reload_url = props.take_suspend_on_reload_url();
            if reload_url.as_deref() == Some(tab.url.as_str()) {
                info!(tab_id = %tab.id, "suspend on reload flag set, suspending tab");
                self.request_suspension(tab, SuspendPriority::Manual);
                return;
            }

            status_changed = true;
            self.reset_auto_suspend_timer(tab);

            let (temp_whitelist, scroll_position) = self
                .suspended
                .get(handle)
                .map(|props| (props.temp_whitelist_on_reload, props.scroll_position))
                .unwrap_or_default();
            let init = NormalPageInit {
                ignore_forms: self.options.options().ignore_forms,
                temp_whitelist,
                scroll_position,
            };
            if let Err(e) = self.host.messenger.init_normal_page(tab.id, init).await {
                warn!(tab_id = %tab.id, error = %e, "failed to init content script, tab may not behave as expected");
            }
            self.suspended.remove(handle);
        }

        if status_changed && self.is_current_focused_tab(tab) {
            self.refresh_presentation(tab, None).await;
        }
    }

    async fn handle_suspended_tab_state_changed(&mut self, tab: &TabSnapshot, change: &TabChange) {
        let Some(status) = change.status else {
            return;
        };
        debug!(tab_id = %tab.id, ?status, "suspended tab status changed");

        match status {
            LoadStatus::Loading => {
                let unsuspend_url = self
                    .registry
                    .lookup(tab.id)
                    .and_then(|handle| self.suspended.get_mut(handle))
                    .and_then(|props| props.take_unsuspend_on_reload_url());
                if unsuspend_url.as_deref() == Some(tab.url.as_str()) {
                    info!(tab_id = %tab.id, "unsuspend on reload flag set, unsuspending tab");
                    self.unsuspend_tab(tab).await;
                }
            }
            LoadStatus::Complete => {
                self.host.scheduler.dequeue(tab.id);

                let handle = self.registry.ensure(tab.id);
                let pending_reason = self
                    .unsuspended
                    .remove(handle)
                    .and_then(|props| props.pending_suspend_reason);
                // The reason is fixed for the whole episode; reloads keep the first one.
                let props = self.suspended.entry(handle);
                if props.suspend_reason.is_none() {
                    props.suspend_reason = pending_reason;
                }
                let props = self.prepare_suspended_props(handle, tab);

                let init = self
                    .build_suspended_page_init(tab, props.show_banner, props.suspend_reason)
                    .await;
                match self.host.messenger.init_suspended_page(tab.id, init).await {
                    Ok(()) => {
                        if self.is_current_focused_tab(tab) {
                            self.host.presentation.show_status(tab.id, TabStatus::Suspended);
                        } else {
                            self.host.tab_checks.queue_tab_check(tab);
                        }
                    }
                    Err(e) => warn!(tab_id = %tab.id, error = %e, "failed to init suspended page"),
                }
            }
        }
    }

    async fn build_suspended_page_init(
        &self,
        tab: &TabSnapshot,
        show_banner: Option<bool>,
        reason: Option<SuspendReason>,
    ) -> SuspendedPageInit {
        let options = self.options.options();
        let original = suspended_url::original_url(&tab.url).unwrap_or_default();

        let info = match self.host.tab_info.fetch_tab_info(&original).await {
            Ok(info) => info,
            Err(e) => {
                warn!(tab_id = %tab.id, error = %e, "failed to fetch tab info");
                None
            }
        };
        let (title, fav_icon_url) = info
            .map(|info| (info.title, info.fav_icon_url))
            .unwrap_or_default();
        let fav_icon_url = fav_icon_url
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| suspended_url::generated_favicon_url(&original));
        let title = title
            .filter(|t| !t.is_empty())
            .or_else(|| suspended_url::suspended_title(&tab.url))
            .unwrap_or_else(|| original.clone());

        let preview_uri = match self.host.tab_info.fetch_preview_image(&original).await {
            Ok(preview) => preview.filter(|img| img != "data:," && img.len() > MIN_PREVIEW_LEN),
            Err(e) => {
                warn!(tab_id = %tab.id, error = %e, "failed to fetch preview image");
                None
            }
        };

        SuspendedPageInit {
            tab_id: tab.id,
            tab_active: tab.active,
            request_unsuspend_on_reload: true,
            whitelisted: whitelist::is_whitelisted(&original, &options.whitelist),
            url: original,
            fav_icon_url,
            title: suspended_url::html_encode(&title),
            theme: options.theme,
            show_banner: show_banner.unwrap_or(false),
            preview_mode: options.screen_capture,
            preview_uri,
            command: self.host.hotkeys.suspend_toggle_hotkey(),
            reason: (reason == Some(SuspendReason::ForcedDiscard))
                .then(|| LOW_MEMORY_REASON.to_string()),
        }
    }

    /// Restores a suspended tab, in place when its placeholder still responds.
    pub async fn unsuspend_tab(&self, tab: &TabSnapshot) {
        if !self.urls.is_suspended_tab(tab) {
            return;
        }
        info!(tab_id = %tab.id, "unsuspending tab");
        let original = suspended_url::original_url(&tab.url);

        // A discarded placeholder has no script to message.
        if tab.discarded {
            if let Some(url) = original {
                self.navigate(tab.id, &url).await;
            }
            return;
        }

        if let Err(e) = self.host.messenger.request_unsuspend(tab.id).await {
            warn!(tab_id = %tab.id, error = %e, "failed to send unsuspend request");
            if let Some(url) = original {
                debug!(tab_id = %tab.id, "will reload directly");
                self.navigate(tab.id, &url).await;
            }
        }
    }

    async fn navigate(&self, tab_id: TabId, url: &str) {
        if let Err(e) = self.host.tabs.update(tab_id, TabUpdate::navigate(url)).await {
            warn!(tab_id = %tab_id, error = %e, "failed to navigate tab");
        }
    }

    async fn handle_content_request(&mut self, sender: TabSnapshot, request: ContentRequest) {
        match request {
            ContentRequest::ReportTabState { status } => {
                let content_status = match status.as_deref().map(str::parse::<ContentStatus>) {
                    Some(Ok(status)) => Some(status),
                    Some(Err(e)) => {
                        error!(tab_id = %sender.id, error = %e, "malformed tab state report");
                        return;
                    }
                    None => None,
                };
                let keep_alive = matches!(
                    content_status,
                    Some(ContentStatus::FormInput | ContentStatus::TempWhitelist)
                );
                if keep_alive || !sender.auto_discardable {
                    let update = TabUpdate::auto_discardable(!keep_alive);
                    if let Err(e) = self.host.tabs.update(sender.id, update).await {
                        warn!(tab_id = %sender.id, error = %e, "failed to update auto-discardable flag");
                    }
                }
                if self.is_current_focused_tab(&sender) {
                    self.refresh_presentation(&sender, content_status).await;
                }
            }
            ContentRequest::SavePreviewData {
                preview_url,
                error_msg,
            } => {
                match preview_url {
                    Some(preview) => {
                        if let Err(e) = self.host.tab_info.add_preview_image(&sender.url, &preview).await {
                            warn!(tab_id = %sender.id, error = %e, "failed to store preview");
                        }
                    }
                    None => warn!(
                        tab_id = %sender.id,
                        error = error_msg.as_deref().unwrap_or("unknown"),
                        "savePreviewData reported an error"
                    ),
                }
                self.host.scheduler.resume_queued(&sender);
            }
        }
    }

    async fn handle_charging_changed(&mut self, charging: bool) {
        self.environment.charging = charging;
        debug!(charging, "charging state changed");
        self.refresh_active_tab_presentation().await;
        // Tabs may have been held back while charging.
        if !charging && self.options.options().ignore_when_charging {
            self.reset_auto_suspend_timer_for_all_tabs().await;
        }
    }

    async fn handle_connectivity_changed(&mut self, online: bool) {
        self.environment.online = online;
        info!(online, "connectivity changed");
        if online && self.options.options().ignore_when_offline {
            self.reset_auto_suspend_timer_for_all_tabs().await;
        }
        self.refresh_active_tab_presentation().await;
    }
}
