use serde::{Deserialize, Serialize};

use super::settings::{PreviewMode, Theme};
use super::status::TabStatus;
use super::tab::{ScrollPosition, TabChange, TabId, TabSnapshot, WindowId};

/// Lifecycle events delivered by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    TabCreated(TabSnapshot),
    TabRemoved(TabId),
    /// Two ids refer to the same logical tab, e.g. after a discard.
    TabReplaced { added: TabId, removed: TabId },
    TabUpdated { change: TabChange, tab: TabSnapshot },
    TabActivated { tab_id: TabId, window_id: WindowId },
    /// `None` when focus left every browser window.
    WindowFocusChanged(Option<WindowId>),
    WindowCreated(WindowId),
    WindowRemoved(WindowId),
    ChargingChanged(bool),
    ConnectivityChanged(bool),
    /// Raw JSON sent by a content script running in `sender`.
    ContentMessage {
        sender: TabSnapshot,
        payload: serde_json::Value,
    },
}

/// Parsed content script request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ContentRequest {
    #[serde(rename_all = "camelCase")]
    ReportTabState { status: Option<String> },
    #[serde(rename_all = "camelCase")]
    SavePreviewData {
        preview_url: Option<String>,
        error_msg: Option<String>,
    },
}

/// Context pushed to a normal page's content script after it loads.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalPageInit {
    pub ignore_forms: bool,
    pub temp_whitelist: bool,
    pub scroll_position: Option<ScrollPosition>,
}

/// Everything the placeholder page needs to render a suspended tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuspendedPageInit {
    pub tab_id: TabId,
    pub tab_active: bool,
    pub request_unsuspend_on_reload: bool,
    pub url: String,
    pub fav_icon_url: String,
    pub title: String,
    pub whitelisted: bool,
    pub theme: Theme,
    pub show_banner: bool,
    pub preview_mode: PreviewMode,
    pub preview_uri: Option<String>,
    pub command: Option<String>,
    pub reason: Option<String>,
}

/// Cached metadata for an original URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabInfo {
    pub url: String,
    pub title: Option<String>,
    pub fav_icon_url: Option<String>,
}

/// Diagnostic snapshot of one tab.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    pub window_id: Option<WindowId>,
    pub tab_id: Option<TabId>,
    pub status: TabStatus,
    /// Milliseconds since the Unix epoch at which the tab will auto-suspend.
    pub timer_up: Option<u64>,
}
