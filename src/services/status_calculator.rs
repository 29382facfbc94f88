//! Suspend-eligibility status calculation.
//!
//! A strict priority chain: the first matching rule wins. Reasons that make
//! suspension impossible (loading, special, discarded, already suspended) come
//! before policy reasons, and the whitelist and "never" checks come before the
//! content page is asked for its own status.

use crate::services::suspended_url::UrlClassifier;
use crate::services::whitelist;
use crate::types::settings::SuspenderSettings;
use crate::types::status::{ContentStatus, TabStatus};
use crate::types::tab::TabSnapshot;

/// Host-wide conditions that influence eligibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub charging: bool,
    pub online: bool,
    pub file_access_allowed: bool,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            charging: false,
            online: true,
            file_access_allowed: false,
        }
    }
}

/// Everything besides the tab itself that the calculation reads.
#[derive(Debug, Clone, Copy)]
pub struct StatusContext<'a> {
    pub options: &'a SuspenderSettings,
    pub environment: Environment,
    pub urls: &'a UrlClassifier,
    /// Whether the focus tracker considers this the active tab of its window.
    pub is_current_active: bool,
}

pub fn is_protected_pinned(tab: &TabSnapshot, options: &SuspenderSettings) -> bool {
    options.ignore_pinned && tab.pinned
}

pub fn is_protected_audible(tab: &TabSnapshot, options: &SuspenderSettings) -> bool {
    options.ignore_audio && tab.audible
}

pub fn is_protected_active(is_current_active: bool, options: &SuspenderSettings) -> bool {
    options.ignore_active_tabs && is_current_active
}

/// Rules that can be decided without asking the content page.
pub fn precheck(tab: &TabSnapshot, ctx: &StatusContext<'_>) -> Option<TabStatus> {
    let file_access = ctx.environment.file_access_allowed;
    if tab.is_loading() {
        return Some(TabStatus::Loading);
    }
    if ctx.urls.is_blocked_file(&tab.url, file_access) {
        return Some(TabStatus::BlockedFile);
    }
    if ctx.urls.is_special_url(&tab.url, file_access) {
        return Some(TabStatus::Special);
    }
    if tab.discarded {
        return Some(TabStatus::Discarded);
    }
    if ctx.urls.is_suspended_tab(tab) {
        return Some(TabStatus::Suspended);
    }
    if whitelist::is_whitelisted(&tab.url, &ctx.options.whitelist) {
        return Some(TabStatus::Whitelisted);
    }
    if ctx.options.is_never_suspend() {
        return Some(TabStatus::Never);
    }
    None
}

/// Rules applied once the content sub-status is known (or known to be absent).
pub fn finish(
    tab: &TabSnapshot,
    sub_status: Option<ContentStatus>,
    ctx: &StatusContext<'_>,
) -> TabStatus {
    let options = ctx.options;
    match sub_status {
        Some(status) if status != ContentStatus::Normal => return status.as_tab_status(),
        _ => {}
    }
    if options.ignore_when_charging && ctx.environment.charging {
        return TabStatus::Charging;
    }
    if options.ignore_when_offline && !ctx.environment.online {
        return TabStatus::NoConnectivity;
    }
    if is_protected_pinned(tab, options) {
        return TabStatus::Pinned;
    }
    if is_protected_audible(tab, options) {
        return TabStatus::Audible;
    }
    if is_protected_active(ctx.is_current_active, options) {
        return TabStatus::Active;
    }
    sub_status.map_or(TabStatus::Unknown, ContentStatus::as_tab_status)
}

/// Full calculation with an already-known sub-status.
pub fn compute_status(
    tab: &TabSnapshot,
    sub_status: Option<ContentStatus>,
    ctx: &StatusContext<'_>,
) -> TabStatus {
    precheck(tab, ctx).unwrap_or_else(|| finish(tab, sub_status, ctx))
}
