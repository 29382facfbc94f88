//! Collaborator interfaces the engine talks to.
//!
//! Anything that crosses into the host (tab directory, page messaging,
//! metadata store) is async; in-process queues owned by other components are
//! plain synchronous calls. Every collaborator is shared behind an `Arc` so
//! callers can keep a handle for inspection.

pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;

use crate::types::errors::{DirectoryError, MessagingError, SettingsError, StoreError};
use crate::types::events::{NormalPageInit, SuspendedPageInit, TabInfo};
use crate::types::settings::SuspenderSettings;
use crate::types::status::{SuspendPriority, TabStatus};
use crate::types::tab::{CreateTab, TabId, TabQuery, TabSnapshot, TabUpdate, WindowId};

/// Query and mutation interface over the host's live tabs and windows.
#[async_trait]
pub trait TabDirectory: Send + Sync {
    async fn query(&self, query: TabQuery) -> Vec<TabSnapshot>;
    /// Returns `None` when the tab no longer exists.
    async fn get(&self, tab_id: TabId) -> Option<TabSnapshot>;
    async fn update(&self, tab_id: TabId, update: TabUpdate) -> Result<TabSnapshot, DirectoryError>;
    async fn create(&self, props: CreateTab) -> Result<TabSnapshot, DirectoryError>;
    async fn reload(&self, tab_id: TabId) -> Result<(), DirectoryError>;
    async fn last_focused_window(&self) -> Option<WindowId>;
}

/// Request/response messaging to content scripts and placeholder pages.
///
/// Responses from content scripts are returned as raw JSON; the engine parses
/// them at its own boundary.
#[async_trait]
pub trait PageMessenger: Send + Sync {
    async fn init_normal_page(
        &self,
        tab_id: TabId,
        init: NormalPageInit,
    ) -> Result<serde_json::Value, MessagingError>;
    async fn init_suspended_page(
        &self,
        tab_id: TabId,
        init: SuspendedPageInit,
    ) -> Result<(), MessagingError>;
    async fn request_unsuspend(&self, tab_id: TabId) -> Result<(), MessagingError>;
    async fn request_info(&self, tab_id: TabId) -> Result<serde_json::Value, MessagingError>;
    async fn set_temporary_whitelist(
        &self,
        tab_id: TabId,
        enabled: bool,
    ) -> Result<serde_json::Value, MessagingError>;
    async fn temporary_whitelist_suspended(&self, tab_id: TabId) -> Result<(), MessagingError>;
    async fn disable_unsuspend_on_reload(&self, tab_id: TabId) -> Result<(), MessagingError>;
    async fn no_connectivity_notice(&self, tab_id: TabId) -> Result<(), MessagingError>;
    async fn refresh_suspended_pages(&self, hotkey: Option<String>) -> Result<(), MessagingError>;
}

/// Source of user options.
pub trait OptionsSource: Send + Sync {
    fn options(&self) -> &SuspenderSettings;
    fn set_whitelist(&mut self, whitelist: String) -> Result<(), SettingsError>;
}

impl OptionsSource for SuspenderSettings {
    fn options(&self) -> &SuspenderSettings {
        self
    }

    fn set_whitelist(&mut self, whitelist: String) -> Result<(), SettingsError> {
        self.whitelist = whitelist;
        Ok(())
    }
}

/// External queue that performs suspensions.
pub trait SuspensionScheduler: Send + Sync {
    fn enqueue(&self, tab: &TabSnapshot, priority: SuspendPriority);
    fn dequeue(&self, tab_id: TabId);
    /// Continue a queued suspension that was waiting on preview capture.
    fn resume_queued(&self, tab: &TabSnapshot);
}

/// External queue that repairs suspended tabs stuck in a broken state.
pub trait TabCheckQueue: Send + Sync {
    fn queue_tab_check(&self, tab: &TabSnapshot);
    fn is_queued(&self, tab_id: TabId) -> bool;
}

/// External queue that discards tabs to free memory.
pub trait DiscardQueue: Send + Sync {
    fn queue_for_discard(&self, tab: &TabSnapshot);
    fn unqueue(&self, tab_id: TabId);
    /// Take over an unsuspended tab the host has just discarded.
    fn handle_discarded_unsuspended(&self, tab: &TabSnapshot);
}

/// Per-URL favicon/title/preview cache.
#[async_trait]
pub trait TabInfoStore: Send + Sync {
    async fn fetch_tab_info(&self, url: &str) -> Result<Option<TabInfo>, StoreError>;
    async fn fetch_preview_image(&self, url: &str) -> Result<Option<String>, StoreError>;
    async fn add_preview_image(&self, url: &str, data: &str) -> Result<(), StoreError>;
}

/// Session store hook, called after tab/window bookkeeping settles.
pub trait SessionRecorder: Send + Sync {
    fn update_current_session(&self);
}

/// Provides the keyboard shortcut shown on placeholder pages.
pub trait HotkeySource: Send + Sync {
    fn suspend_toggle_hotkey(&self) -> Option<String>;
}

/// Thin consumer of computed statuses (toolbar icon, context menu).
pub trait Presentation: Send + Sync {
    fn show_status(&self, tab_id: TabId, status: TabStatus);
}

/// Bundle of every collaborator the engine needs.
#[derive(Clone)]
pub struct Collaborators {
    pub tabs: Arc<dyn TabDirectory>,
    pub messenger: Arc<dyn PageMessenger>,
    pub scheduler: Arc<dyn SuspensionScheduler>,
    pub tab_checks: Arc<dyn TabCheckQueue>,
    pub discards: Arc<dyn DiscardQueue>,
    pub tab_info: Arc<dyn TabInfoStore>,
    pub session: Arc<dyn SessionRecorder>,
    pub hotkeys: Arc<dyn HotkeySource>,
    pub presentation: Arc<dyn Presentation>,
}
