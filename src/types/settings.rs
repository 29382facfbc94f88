use serde::{Deserialize, Serialize};

/// User options consulted by the suspension engine.
///
/// Field names match the keys accepted by `SettingsEngine::set_value`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuspenderSettings {
    /// Minutes of inactivity before auto-suspend. Stored as text; `"0"` means never.
    pub suspend_time: String,
    pub ignore_audio: bool,
    pub ignore_pinned: bool,
    pub ignore_active_tabs: bool,
    pub ignore_forms: bool,
    pub ignore_when_charging: bool,
    pub ignore_when_offline: bool,
    pub discard_after_suspend: bool,
    pub unsuspend_on_focus: bool,
    pub screen_capture: PreviewMode,
    pub context_menu: bool,
    /// Newline-separated whitelist entries. `/.../` entries are regular expressions.
    pub whitelist: String,
    pub theme: Theme,
    pub no_nag: bool,
}

impl Default for SuspenderSettings {
    fn default() -> Self {
        Self {
            suspend_time: "60".to_string(),
            ignore_audio: true,
            ignore_pinned: true,
            ignore_active_tabs: true,
            ignore_forms: true,
            ignore_when_charging: false,
            ignore_when_offline: false,
            discard_after_suspend: false,
            unsuspend_on_focus: false,
            screen_capture: PreviewMode::Off,
            context_menu: true,
            whitelist: String::new(),
            theme: Theme::Light,
            no_nag: false,
        }
    }
}

impl SuspenderSettings {
    /// Parsed suspend delay in minutes, `None` when the stored text is not numeric.
    pub fn suspend_delay_minutes(&self) -> Option<f64> {
        self.suspend_time
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|m| m.is_finite())
    }

    /// True when the delay is set to "never suspend".
    pub fn is_never_suspend(&self) -> bool {
        matches!(self.suspend_delay_minutes(), Some(m) if m <= 0.0)
    }
}

/// Whether suspended placeholders show a page preview.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PreviewMode {
    Off,
    Screen,
    FullPage,
}

/// Placeholder page theme.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}
