use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Suspend-eligibility status of a tab.
///
/// Every status other than [`TabStatus::Normal`] and [`TabStatus::Active`]
/// means "this tab will not be auto-suspended right now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TabStatus {
    Loading,
    BlockedFile,
    Special,
    Discarded,
    Suspended,
    Whitelisted,
    Never,
    TempWhitelist,
    FormInput,
    Normal,
    Charging,
    NoConnectivity,
    Pinned,
    Audible,
    Active,
    Unknown,
}

impl TabStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TabStatus::Loading => "loading",
            TabStatus::BlockedFile => "blockedFile",
            TabStatus::Special => "special",
            TabStatus::Discarded => "discarded",
            TabStatus::Suspended => "suspended",
            TabStatus::Whitelisted => "whitelisted",
            TabStatus::Never => "never",
            TabStatus::TempWhitelist => "tempWhitelist",
            TabStatus::FormInput => "formInput",
            TabStatus::Normal => "normal",
            TabStatus::Charging => "charging",
            TabStatus::NoConnectivity => "noConnectivity",
            TabStatus::Pinned => "pinned",
            TabStatus::Audible => "audible",
            TabStatus::Active => "active",
            TabStatus::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status a content script reports about its own page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ContentStatus {
    Normal,
    TempWhitelist,
    FormInput,
}

impl ContentStatus {
    pub fn as_tab_status(self) -> TabStatus {
        match self {
            ContentStatus::Normal => TabStatus::Normal,
            ContentStatus::TempWhitelist => TabStatus::TempWhitelist,
            ContentStatus::FormInput => TabStatus::FormInput,
        }
    }
}

impl FromStr for ContentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ContentStatus::Normal),
            "tempWhitelist" => Ok(ContentStatus::TempWhitelist),
            "formInput" => Ok(ContentStatus::FormInput),
            other => Err(format!("unknown content status: {}", other)),
        }
    }
}

/// Why a tab was suspended. Fixed once per suspension episode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SuspendReason {
    Automatic,
    Manual,
    ForcedDiscard,
}

/// Urgency of a suspension request, consumed by the external scheduler.
///
/// `Manual` bypasses most eligibility checks, `Soft` is a user request that
/// still respects them, `Automatic` comes from an expired timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SuspendPriority {
    Manual = 1,
    Soft = 2,
    Automatic = 3,
}

impl SuspendPriority {
    pub fn for_force(force: bool) -> Self {
        if force {
            SuspendPriority::Manual
        } else {
            SuspendPriority::Soft
        }
    }

    pub fn reason(self) -> SuspendReason {
        match self {
            SuspendPriority::Automatic => SuspendReason::Automatic,
            SuspendPriority::Manual | SuspendPriority::Soft => SuspendReason::Manual,
        }
    }
}

/// Toolbar icon variant derived from a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IconState {
    SuspensionActive,
    SuspensionPaused,
}

impl IconState {
    pub fn for_status(status: TabStatus) -> Self {
        match status {
            TabStatus::Normal | TabStatus::Active => IconState::SuspensionActive,
            _ => IconState::SuspensionPaused,
        }
    }
}
