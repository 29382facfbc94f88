//! The tab lifecycle engine.
//!
//! [`Engine`] owns all tracked state and is driven either directly (tests
//! call the handler methods and then [`Engine::process_due`]) or as an actor
//! through [`Engine::run`] and an [`EngineHandle`].

mod commands;
mod focus;
mod lifecycle;

use std::time::{Duration, UNIX_EPOCH};

use rand::Rng;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::adapters::{Collaborators, OptionsSource};
use crate::managers::focus_tracker::{FocusSettled, FocusTracker};
use crate::managers::property_store::{PropertyStore, SuspendedTabProps, UnsuspendedTabProps};
use crate::managers::tab_registry::{TabHandle, TabRegistry};
use crate::managers::timer_manager::{
    Alarm, AlarmClock, AlarmToken, ArmOutcome, AutoSuspendDue, TimerManager,
};
use crate::services::status_calculator::{self, Environment, StatusContext};
use crate::services::suspended_url::{self, TabClass, UrlClassifier};
use crate::types::errors::EngineError;
use crate::types::events::{DebugInfo, HostEvent};
use crate::types::settings::SuspenderSettings;
use crate::types::status::{ContentStatus, SuspendPriority, SuspendReason, TabStatus};
use crate::types::tab::{TabId, TabQuery, TabSnapshot};

pub use commands::UserCommand;

/// Page whose visit means the user may have changed the keyboard shortcut.
pub const SHORTCUTS_URL: &str = "chrome://extensions/shortcuts";

/// Timing constants and the placeholder page location.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub suspended_page: String,
    /// How long a tab or window must hold focus to become stationary.
    pub focus_delay: Duration,
    /// Delay before a previously focused suspended tab is queued for discard.
    pub discard_check_delay: Duration,
    /// Debounce for session saves.
    pub session_save_delay: Duration,
    /// Capacity of the [`EngineHandle`] channel.
    pub channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            suspended_page: "chrome-extension://tab-suspender/suspended.html".to_string(),
            focus_delay: Duration::from_millis(500),
            discard_check_delay: Duration::from_secs(2),
            session_save_delay: Duration::from_secs(1),
            channel_capacity: 256,
        }
    }
}

/// Events the engine posts to itself.
#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    AutoSuspendDue(AutoSuspendDue),
    FocusSettled(FocusSettled),
    SessionSaveDue(AlarmToken),
    DiscardCheckDue(TabHandle),
}

impl From<AutoSuspendDue> for InternalEvent {
    fn from(due: AutoSuspendDue) -> Self {
        InternalEvent::AutoSuspendDue(due)
    }
}

impl From<FocusSettled> for InternalEvent {
    fn from(settled: FocusSettled) -> Self {
        InternalEvent::FocusSettled(settled)
    }
}

/// Messages accepted by a running engine.
#[derive(Debug)]
pub enum EngineMessage {
    Host(HostEvent),
    Command(UserCommand),
    TabStatus {
        tab_id: TabId,
        reply: oneshot::Sender<TabStatus>,
    },
    ActiveTabStatus {
        reply: oneshot::Sender<TabStatus>,
    },
    DebugInfo {
        tab_id: TabId,
        reply: oneshot::Sender<DebugInfo>,
    },
    Shutdown,
}

/// Cloneable sender side of a running engine.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    sender: mpsc::Sender<EngineMessage>,
}

impl EngineHandle {
    pub async fn send_event(&self, event: HostEvent) -> Result<(), EngineError> {
        self.send(EngineMessage::Host(event)).await
    }

    pub async fn command(&self, command: UserCommand) -> Result<(), EngineError> {
        self.send(EngineMessage::Command(command)).await
    }

    pub async fn tab_status(&self, tab_id: TabId) -> Result<TabStatus, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::TabStatus { tab_id, reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn active_tab_status(&self) -> Result<TabStatus, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::ActiveTabStatus { reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn debug_info(&self, tab_id: TabId) -> Result<DebugInfo, EngineError> {
        let (reply, rx) = oneshot::channel();
        self.send(EngineMessage::DebugInfo { tab_id, reply }).await?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    pub async fn shutdown(&self) -> Result<(), EngineError> {
        self.send(EngineMessage::Shutdown).await
    }

    async fn send(&self, message: EngineMessage) -> Result<(), EngineError> {
        self.sender
            .send(message)
            .await
            .map_err(|_| EngineError::Stopped)
    }
}

/// Single owner of every piece of tracked tab state.
pub struct Engine {
    config: EngineConfig,
    host: Collaborators,
    options: Box<dyn OptionsSource>,
    urls: UrlClassifier,
    environment: Environment,
    registry: TabRegistry,
    unsuspended: PropertyStore<UnsuspendedTabProps>,
    suspended: PropertyStore<SuspendedTabProps>,
    focus: FocusTracker<InternalEvent>,
    timers: TimerManager<InternalEvent>,
    clock: AlarmClock<InternalEvent>,
    internal_rx: mpsc::UnboundedReceiver<InternalEvent>,
    session_alarm: Option<Alarm>,
    hotkey_refresh_pending: bool,
    hotkey: Option<String>,
}

impl Engine {
    pub fn new(config: EngineConfig, host: Collaborators, options: Box<dyn OptionsSource>) -> Self {
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let clock = AlarmClock::new(internal_tx);
        Self {
            urls: UrlClassifier::new(&config.suspended_page),
            focus: FocusTracker::new(clock.clone(), config.focus_delay),
            timers: TimerManager::new(clock.clone()),
            clock,
            internal_rx,
            config,
            host,
            options,
            environment: Environment::default(),
            registry: TabRegistry::new(),
            unsuspended: PropertyStore::new(),
            suspended: PropertyStore::new(),
            session_alarm: None,
            hotkey_refresh_pending: false,
            hotkey: None,
        }
    }

    /// Creates the channel a running engine listens on.
    pub fn channel(&self) -> (EngineHandle, mpsc::Receiver<EngineMessage>) {
        let (sender, receiver) = mpsc::channel(self.config.channel_capacity.max(1));
        (EngineHandle { sender }, receiver)
    }

    /// Seeds per-tab properties and focus state from the tabs already open.
    pub async fn initialise(&mut self) {
        let file_access = self.environment.file_access_allowed;
        let tabs = self.host.tabs.query(TabQuery::all()).await;
        for tab in &tabs {
            if self.urls.is_suspended_tab(tab) {
                let handle = self.registry.ensure(tab.id);
                self.prepare_suspended_props(handle, tab);
            } else if self.urls.is_normal_tab(tab, file_access) {
                self.reset_auto_suspend_timer(tab);
            }
        }

        let active_tabs = self.host.tabs.query(TabQuery::active()).await;
        let current_window = self.host.tabs.last_focused_window().await;
        for tab in &active_tabs {
            let handle = self.registry.ensure(tab.id);
            self.focus
                .seed(tab.window_id, handle, current_window == Some(tab.window_id));
        }

        self.hotkey = self.host.hotkeys.suspend_toggle_hotkey();
        info!(tabs = tabs.len(), "engine initialised");
    }

    /// Runs until shutdown or until every [`EngineHandle`] is dropped.
    pub async fn run(mut self, mut messages: mpsc::Receiver<EngineMessage>) {
        info!("engine running");
        loop {
            tokio::select! {
                biased;
                Some(event) = self.internal_rx.recv() => self.handle_internal(event).await,
                message = messages.recv() => match message {
                    Some(EngineMessage::Shutdown) | None => break,
                    Some(message) => self.handle_message(message).await,
                },
            }
        }
        info!("engine stopped");
    }

    async fn handle_message(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Host(event) => {
                if let Err(e) = self.handle_event(event).await {
                    error!(error = %e, "dropping host event");
                }
            }
            EngineMessage::Command(command) => {
                if let Err(e) = self.execute(command).await {
                    warn!(error = %e, "command failed");
                }
            }
            EngineMessage::TabStatus { tab_id, reply } => {
                let _ = reply.send(self.tab_status(tab_id).await);
            }
            EngineMessage::ActiveTabStatus { reply } => {
                let _ = reply.send(self.active_tab_status().await);
            }
            EngineMessage::DebugInfo { tab_id, reply } => {
                let _ = reply.send(self.debug_info(tab_id).await);
            }
            EngineMessage::Shutdown => {}
        }
    }

    /// Handles every internal event that is already due. Returns how many ran.
    pub async fn process_due(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.internal_rx.try_recv() {
            self.handle_internal(event).await;
            handled += 1;
        }
        handled
    }

    async fn handle_internal(&mut self, event: InternalEvent) {
        match event {
            InternalEvent::AutoSuspendDue(due) => self.handle_auto_suspend_due(due).await,
            InternalEvent::FocusSettled(settled) => {
                if let Some(promotion) = self.focus.settle(settled) {
                    self.handle_new_stationary_focus(promotion).await;
                }
            }
            InternalEvent::SessionSaveDue(token) => {
                if self
                    .session_alarm
                    .as_ref()
                    .is_some_and(|alarm| alarm.is_current(token))
                {
                    self.session_alarm = None;
                    debug!("updating current session");
                    self.host.session.update_current_session();
                }
            }
            InternalEvent::DiscardCheckDue(handle) => self.handle_discard_check_due(handle).await,
        }
    }

    /// The tab may have been closed, replaced or unsuspended since focus left it.
    async fn handle_discard_check_due(&mut self, handle: TabHandle) {
        let Some(tab_id) = self.registry.current_id(handle) else {
            return;
        };
        let Some(tab) = self.host.tabs.get(tab_id).await else {
            return;
        };
        if !self.urls.is_suspended_url_loose(&tab.url) {
            debug!(tab_id = %tab.id, "tab is no longer suspended, not discarding");
            return;
        }
        if self.host.tab_checks.is_queued(tab.id) {
            debug!(tab_id = %tab.id, "tab is queued for a tab check, not discarding");
            return;
        }
        debug!(tab_id = %tab.id, "discarding previously focused tab");
        self.host.discards.queue_for_discard(&tab);
    }

    async fn handle_auto_suspend_due(&mut self, due: AutoSuspendDue) {
        let Some(props) = self.unsuspended.get_mut(due.handle) else {
            return;
        };
        if !self.timers.take_expired(props, due.token) {
            return;
        }
        let Some(tab_id) = self.registry.current_id(due.handle) else {
            return;
        };
        let Some(tab) = self.host.tabs.get(tab_id).await else {
            warn!(tab_id = %tab_id, "couldn't find tab, aborting suspension");
            return;
        };
        let options = self.options.options();
        if (options.ignore_when_offline && !self.environment.online)
            || (options.ignore_when_charging && self.environment.charging)
        {
            // The recovery sweep re-arms the timer.
            debug!(tab_id = %tab.id, "auto-suspend timer expired while suspension is paused");
            return;
        }
        info!(tab_id = %tab.id, "auto-suspend timer expired");
        self.request_suspension(&tab, SuspendPriority::Automatic);
    }

    /// Debounced session save.
    fn queue_session_save(&mut self) {
        self.session_alarm = Some(
            self.clock
                .schedule(self.config.session_save_delay, InternalEvent::SessionSaveDue),
        );
    }

    /// Hands `tab` to the scheduler and, for normal tabs, remembers why.
    /// Placeholders already carry the reason of their episode.
    fn request_suspension(&mut self, tab: &TabSnapshot, priority: SuspendPriority) {
        self.host.scheduler.enqueue(tab, priority);
        if self.urls.classify(tab, self.environment.file_access_allowed) != TabClass::Normal {
            return;
        }
        let handle = self.registry.ensure(tab.id);
        self.unsuspended.entry(handle).pending_suspend_reason = Some(priority.reason());
    }

    /// Re-arms the auto-suspend timer of an unsuspended tab.
    fn reset_auto_suspend_timer(&mut self, tab: &TabSnapshot) -> ArmOutcome {
        let handle = self.registry.ensure(tab.id);
        let is_active = self.focus.is_active(Some(handle), tab);
        let props = self.unsuspended.entry(handle);
        self.timers
            .arm(props, handle, tab, self.options.options(), is_active)
    }

    fn clear_auto_suspend_timer(&mut self, tab: &TabSnapshot) {
        if let Some(props) = self
            .registry
            .lookup(tab.id)
            .and_then(|handle| self.unsuspended.get_mut(handle))
        {
            self.timers.disarm(props);
        }
    }

    /// Samples the banner once and records the scroll position of a suspended tab.
    fn prepare_suspended_props(&mut self, handle: TabHandle, tab: &TabSnapshot) -> SuspendedTabProps {
        let no_nag = self.options.options().no_nag;
        let props = self.suspended.entry(handle);
        if !no_nag && props.show_banner.is_none() {
            props.show_banner = Some(rand::rng().random_bool(1.0 / 20.0));
        }
        props.scroll_position = suspended_url::suspended_scroll_position(&tab.url);
        props.clone()
    }

    fn status_context(&self, tab: &TabSnapshot) -> StatusContext<'_> {
        StatusContext {
            options: self.options.options(),
            environment: self.environment,
            urls: &self.urls,
            is_current_active: self.is_current_active_tab(tab),
        }
    }

    /// Status of `tab`, asking its content script when nothing cheaper decides.
    pub async fn calculate_tab_status(
        &self,
        tab: &TabSnapshot,
        known: Option<ContentStatus>,
    ) -> TabStatus {
        if let Some(status) = status_calculator::precheck(tab, &self.status_context(tab)) {
            return status;
        }
        let sub_status = match known {
            Some(status) => Some(status),
            None => match self.host.messenger.request_info(tab.id).await {
                Ok(info) => parse_content_status(tab.id, &info),
                Err(e) => {
                    debug!(tab_id = %tab.id, error = %e, "no content status");
                    None
                }
            },
        };
        status_calculator::finish(tab, sub_status, &self.status_context(tab))
    }

    async fn refresh_presentation(&self, tab: &TabSnapshot, known: Option<ContentStatus>) -> TabStatus {
        let status = self.calculate_tab_status(tab, known).await;
        self.host.presentation.show_status(tab.id, status);
        status
    }

    async fn refresh_active_tab_presentation(&self) {
        if let Some(tab) = self.currently_active_tab().await {
            self.refresh_presentation(&tab, None).await;
        }
    }

    // === Property entry points ===

    /// Suspend `tab_id` once it next finishes loading `url`.
    pub fn set_suspend_on_reload_url(&mut self, tab_id: TabId, url: &str) {
        let handle = self.registry.ensure(tab_id);
        self.unsuspended.entry(handle).suspend_on_reload_url = Some(url.to_string());
    }

    /// Unsuspend `tab_id` when its placeholder next reloads with `url`.
    pub fn set_unsuspend_on_reload_url(&mut self, tab_id: TabId, url: &str) {
        let handle = self.registry.ensure(tab_id);
        self.suspended.entry(handle).unsuspend_on_reload_url = Some(url.to_string());
    }

    pub fn set_temp_whitelist_on_reload(&mut self, tab_id: TabId, enabled: bool) {
        let handle = self.registry.ensure(tab_id);
        self.suspended.entry(handle).temp_whitelist_on_reload = enabled;
    }

    /// Records why `tab_id` is being suspended. Applied when it loads as suspended.
    pub fn record_suspend_reason(&mut self, tab_id: TabId, reason: SuspendReason) {
        let handle = self.registry.ensure(tab_id);
        self.unsuspended.entry(handle).pending_suspend_reason = Some(reason);
    }

    pub fn unsuspended_props(&self, tab_id: TabId) -> Option<&UnsuspendedTabProps> {
        self.registry
            .lookup(tab_id)
            .and_then(|handle| self.unsuspended.get(handle))
    }

    pub fn suspended_props(&self, tab_id: TabId) -> Option<&SuspendedTabProps> {
        self.registry
            .lookup(tab_id)
            .and_then(|handle| self.suspended.get(handle))
    }

    pub fn is_timer_armed(&self, tab_id: TabId) -> bool {
        self.timer_deadline(tab_id).is_some()
    }

    pub fn timer_deadline(&self, tab_id: TabId) -> Option<Instant> {
        self.unsuspended_props(tab_id)
            .and_then(|props| props.timer.as_ref())
            .map(|timer| timer.alarm.deadline())
    }

    /// Milliseconds since the Unix epoch at which `tab_id` is due to suspend.
    fn timer_up(&self, tab_id: TabId) -> Option<u64> {
        self.unsuspended_props(tab_id)
            .and_then(|props| props.timer.as_ref())
            .and_then(|timer| timer.suspend_at.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as u64)
    }

    pub fn handle_for(&self, tab_id: TabId) -> Option<TabHandle> {
        self.registry.lookup(tab_id)
    }

    // === Focus queries ===

    pub fn is_current_focused_tab(&self, tab: &TabSnapshot) -> bool {
        self.focus.is_focused(self.registry.lookup(tab.id), tab)
    }

    pub fn is_current_stationary_tab(&self, tab: &TabSnapshot) -> bool {
        self.focus.is_stationary(self.registry.lookup(tab.id), tab)
    }

    pub fn is_current_active_tab(&self, tab: &TabSnapshot) -> bool {
        self.focus.is_active(self.registry.lookup(tab.id), tab)
    }

    pub fn options(&self) -> &SuspenderSettings {
        self.options.options()
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn set_file_access_allowed(&mut self, allowed: bool) {
        self.environment.file_access_allowed = allowed;
    }

    pub fn urls(&self) -> &UrlClassifier {
        &self.urls
    }
}

/// Reads the `status` field of a content script response.
fn parse_content_status(tab_id: TabId, response: &Value) -> Option<ContentStatus> {
    let raw = response.get("status")?.as_str()?;
    match raw.parse::<ContentStatus>() {
        Ok(status) => Some(status),
        Err(e) => {
            let e = EngineError::Malformed(e);
            error!(tab_id = %tab_id, error = %e, "unexpected content status");
            None
        }
    }
}
