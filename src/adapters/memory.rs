//! In-memory collaborators.
//!
//! Used by the demo binary and the test suites. Each one records what the
//! engine asked of it so callers can inspect the interaction afterwards.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{
    Collaborators, DiscardQueue, HotkeySource, PageMessenger, Presentation, SessionRecorder,
    SuspensionScheduler, TabCheckQueue, TabDirectory, TabInfoStore,
};
use crate::types::errors::{DirectoryError, MessagingError, StoreError};
use crate::types::events::{NormalPageInit, SuspendedPageInit, TabInfo};
use crate::types::status::{SuspendPriority, TabStatus};
use crate::types::tab::{CreateTab, LoadStatus, TabId, TabQuery, TabSnapshot, TabUpdate, WindowId};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// === Tab directory ===

#[derive(Default)]
struct DirectoryState {
    tabs: Vec<TabSnapshot>,
    next_id: i32,
    focused_window: Option<WindowId>,
    updates: Vec<(TabId, TabUpdate)>,
    reloads: Vec<TabId>,
}

/// Tab directory backed by a vector of snapshots.
#[derive(Default)]
pub struct InMemoryTabDirectory {
    state: Mutex<DirectoryState>,
}

impl InMemoryTabDirectory {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(DirectoryState {
                next_id: 1000,
                ..DirectoryState::default()
            }),
        }
    }

    /// Inserts or replaces the snapshot with the same id.
    pub fn put(&self, tab: TabSnapshot) {
        let mut state = lock(&self.state);
        match state.tabs.iter_mut().find(|t| t.id == tab.id) {
            Some(existing) => *existing = tab,
            None => state.tabs.push(tab),
        }
    }

    pub fn remove(&self, tab_id: TabId) {
        lock(&self.state).tabs.retain(|t| t.id != tab_id);
    }

    /// Renumbers a tab the way a host does when it discards or prerenders.
    pub fn renumber(&self, old: TabId, new: TabId) {
        let mut state = lock(&self.state);
        if let Some(tab) = state.tabs.iter_mut().find(|t| t.id == old) {
            tab.id = new;
        }
    }

    pub fn set_focused_window(&self, window_id: Option<WindowId>) {
        lock(&self.state).focused_window = window_id;
    }

    pub fn tab(&self, tab_id: TabId) -> Option<TabSnapshot> {
        lock(&self.state).tabs.iter().find(|t| t.id == tab_id).cloned()
    }

    pub fn updates(&self) -> Vec<(TabId, TabUpdate)> {
        lock(&self.state).updates.clone()
    }

    pub fn reloads(&self) -> Vec<TabId> {
        lock(&self.state).reloads.clone()
    }
}

#[async_trait]
impl TabDirectory for InMemoryTabDirectory {
    async fn query(&self, query: TabQuery) -> Vec<TabSnapshot> {
        let state = lock(&self.state);
        let focused = state.focused_window;
        state
            .tabs
            .iter()
            .filter(|t| query.active.map_or(true, |a| t.active == a))
            .filter(|t| query.highlighted.map_or(true, |h| t.highlighted == h))
            .filter(|t| query.window_id.map_or(true, |w| t.window_id == w))
            .filter(|t| {
                !(query.current_window || query.last_focused_window)
                    || Some(t.window_id) == focused
            })
            .cloned()
            .collect()
    }

    async fn get(&self, tab_id: TabId) -> Option<TabSnapshot> {
        self.tab(tab_id)
    }

    async fn update(&self, tab_id: TabId, update: TabUpdate) -> Result<TabSnapshot, DirectoryError> {
        let mut state = lock(&self.state);
        state.updates.push((tab_id, update.clone()));
        let tab = state
            .tabs
            .iter_mut()
            .find(|t| t.id == tab_id)
            .ok_or(DirectoryError::TabNotFound(tab_id))?;
        if let Some(url) = update.url {
            tab.url = url;
            tab.status = LoadStatus::Loading;
            tab.discarded = false;
        }
        if let Some(auto_discardable) = update.auto_discardable {
            tab.auto_discardable = auto_discardable;
        }
        if let Some(active) = update.active {
            tab.active = active;
        }
        Ok(tab.clone())
    }

    async fn create(&self, props: CreateTab) -> Result<TabSnapshot, DirectoryError> {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let window_id = props
            .window_id
            .or(state.focused_window)
            .unwrap_or(WindowId(1));
        let mut tab = TabSnapshot::new(TabId(state.next_id), window_id, &props.url);
        tab.index = props.index.unwrap_or(state.tabs.len());
        tab.opener_tab_id = props.opener_tab_id;
        tab.active = props.active;
        tab.status = LoadStatus::Loading;
        state.tabs.push(tab.clone());
        Ok(tab)
    }

    async fn reload(&self, tab_id: TabId) -> Result<(), DirectoryError> {
        let mut state = lock(&self.state);
        if !state.tabs.iter().any(|t| t.id == tab_id) {
            return Err(DirectoryError::TabNotFound(tab_id));
        }
        state.reloads.push(tab_id);
        Ok(())
    }

    async fn last_focused_window(&self) -> Option<WindowId> {
        lock(&self.state).focused_window
    }
}

// === Page messenger ===

/// One message the engine sent to a page.
#[derive(Debug, Clone, PartialEq)]
pub enum SentMessage {
    InitNormal(TabId, NormalPageInit),
    InitSuspended(TabId, SuspendedPageInit),
    Unsuspend(TabId),
    RequestInfo(TabId),
    TemporaryWhitelist(TabId, bool),
    TemporaryWhitelistSuspended(TabId),
    DisableUnsuspendOnReload(TabId),
    NoConnectivity(TabId),
    RefreshSuspended(Option<String>),
}

#[derive(Default)]
struct MessengerState {
    sent: Vec<SentMessage>,
    unreachable: HashSet<TabId>,
    info: HashMap<TabId, Value>,
}

/// Messenger that answers from canned responses and records every call.
#[derive(Default)]
pub struct RecordingMessenger {
    state: Mutex<MessengerState>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every message to `tab_id` fail with `NoResponder`.
    pub fn set_unreachable(&self, tab_id: TabId, unreachable: bool) {
        let mut state = lock(&self.state);
        if unreachable {
            state.unreachable.insert(tab_id);
        } else {
            state.unreachable.remove(&tab_id);
        }
    }

    /// Sets the JSON returned by `request_info` for `tab_id`.
    pub fn set_info(&self, tab_id: TabId, info: Value) {
        lock(&self.state).info.insert(tab_id, info);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.state).sent.clone()
    }

    pub fn clear(&self) {
        lock(&self.state).sent.clear();
    }

    fn record(&self, tab_id: Option<TabId>, message: SentMessage) -> Result<(), MessagingError> {
        let mut state = lock(&self.state);
        state.sent.push(message);
        match tab_id {
            Some(id) if state.unreachable.contains(&id) => Err(MessagingError::NoResponder(id)),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl PageMessenger for RecordingMessenger {
    async fn init_normal_page(
        &self,
        tab_id: TabId,
        init: NormalPageInit,
    ) -> Result<Value, MessagingError> {
        let status = if init.temp_whitelist { "tempWhitelist" } else { "normal" };
        self.record(Some(tab_id), SentMessage::InitNormal(tab_id, init))?;
        Ok(json!({ "status": status }))
    }

    async fn init_suspended_page(
        &self,
        tab_id: TabId,
        init: SuspendedPageInit,
    ) -> Result<(), MessagingError> {
        self.record(Some(tab_id), SentMessage::InitSuspended(tab_id, init))
    }

    async fn request_unsuspend(&self, tab_id: TabId) -> Result<(), MessagingError> {
        self.record(Some(tab_id), SentMessage::Unsuspend(tab_id))
    }

    async fn request_info(&self, tab_id: TabId) -> Result<Value, MessagingError> {
        self.record(Some(tab_id), SentMessage::RequestInfo(tab_id))?;
        lock(&self.state)
            .info
            .get(&tab_id)
            .cloned()
            .ok_or(MessagingError::NoResponder(tab_id))
    }

    async fn set_temporary_whitelist(
        &self,
        tab_id: TabId,
        enabled: bool,
    ) -> Result<Value, MessagingError> {
        self.record(Some(tab_id), SentMessage::TemporaryWhitelist(tab_id, enabled))?;
        let status = if enabled { "tempWhitelist" } else { "normal" };
        let response = json!({ "status": status });
        lock(&self.state).info.insert(tab_id, response.clone());
        Ok(response)
    }

    async fn temporary_whitelist_suspended(&self, tab_id: TabId) -> Result<(), MessagingError> {
        self.record(Some(tab_id), SentMessage::TemporaryWhitelistSuspended(tab_id))
    }

    async fn disable_unsuspend_on_reload(&self, tab_id: TabId) -> Result<(), MessagingError> {
        self.record(Some(tab_id), SentMessage::DisableUnsuspendOnReload(tab_id))
    }

    async fn no_connectivity_notice(&self, tab_id: TabId) -> Result<(), MessagingError> {
        self.record(Some(tab_id), SentMessage::NoConnectivity(tab_id))
    }

    async fn refresh_suspended_pages(&self, hotkey: Option<String>) -> Result<(), MessagingError> {
        self.record(None, SentMessage::RefreshSuspended(hotkey))
    }
}

// === Queues ===

/// Suspension scheduler that only records requests.
#[derive(Default)]
pub struct RecordingScheduler {
    enqueued: Mutex<Vec<(TabId, SuspendPriority)>>,
    dequeued: Mutex<Vec<TabId>>,
    resumed: Mutex<Vec<TabId>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueued(&self) -> Vec<(TabId, SuspendPriority)> {
        lock(&self.enqueued).clone()
    }

    pub fn dequeued(&self) -> Vec<TabId> {
        lock(&self.dequeued).clone()
    }

    pub fn resumed(&self) -> Vec<TabId> {
        lock(&self.resumed).clone()
    }
}

impl SuspensionScheduler for RecordingScheduler {
    fn enqueue(&self, tab: &TabSnapshot, priority: SuspendPriority) {
        lock(&self.enqueued).push((tab.id, priority));
    }

    fn dequeue(&self, tab_id: TabId) {
        lock(&self.dequeued).push(tab_id);
    }

    fn resume_queued(&self, tab: &TabSnapshot) {
        lock(&self.resumed).push(tab.id);
    }
}

/// Tab health-check queue that remembers which tabs were queued.
#[derive(Default)]
pub struct RecordingTabChecks {
    queued: Mutex<Vec<TabId>>,
}

impl RecordingTabChecks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> Vec<TabId> {
        lock(&self.queued).clone()
    }
}

impl TabCheckQueue for RecordingTabChecks {
    fn queue_tab_check(&self, tab: &TabSnapshot) {
        lock(&self.queued).push(tab.id);
    }

    fn is_queued(&self, tab_id: TabId) -> bool {
        lock(&self.queued).contains(&tab_id)
    }
}

/// Discard queue that records requests.
#[derive(Default)]
pub struct RecordingDiscards {
    queued: Mutex<Vec<TabId>>,
    unqueued: Mutex<Vec<TabId>>,
    discarded_unsuspended: Mutex<Vec<TabId>>,
}

impl RecordingDiscards {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queued(&self) -> Vec<TabId> {
        lock(&self.queued).clone()
    }

    pub fn unqueued(&self) -> Vec<TabId> {
        lock(&self.unqueued).clone()
    }

    pub fn discarded_unsuspended(&self) -> Vec<TabId> {
        lock(&self.discarded_unsuspended).clone()
    }
}

impl DiscardQueue for RecordingDiscards {
    fn queue_for_discard(&self, tab: &TabSnapshot) {
        lock(&self.queued).push(tab.id);
    }

    fn unqueue(&self, tab_id: TabId) {
        lock(&self.unqueued).push(tab_id);
    }

    fn handle_discarded_unsuspended(&self, tab: &TabSnapshot) {
        lock(&self.discarded_unsuspended).push(tab.id);
    }
}

// === Stores and sinks ===

/// Metadata store held in hash maps.
#[derive(Default)]
pub struct MemoryTabInfoStore {
    info: Mutex<HashMap<String, TabInfo>>,
    previews: Mutex<HashMap<String, String>>,
}

impl MemoryTabInfoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_info(&self, info: TabInfo) {
        lock(&self.info).insert(info.url.clone(), info);
    }
}

#[async_trait]
impl TabInfoStore for MemoryTabInfoStore {
    async fn fetch_tab_info(&self, url: &str) -> Result<Option<TabInfo>, StoreError> {
        Ok(lock(&self.info).get(url).cloned())
    }

    async fn fetch_preview_image(&self, url: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.previews).get(url).cloned())
    }

    async fn add_preview_image(&self, url: &str, data: &str) -> Result<(), StoreError> {
        lock(&self.previews).insert(url.to_string(), data.to_string());
        Ok(())
    }
}

/// Counts session updates.
#[derive(Default)]
pub struct CountingSessionRecorder {
    updates: Mutex<usize>,
}

impl CountingSessionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> usize {
        *lock(&self.updates)
    }
}

impl SessionRecorder for CountingSessionRecorder {
    fn update_current_session(&self) {
        *lock(&self.updates) += 1;
    }
}

/// Hotkey source with a settable value.
#[derive(Default)]
pub struct StaticHotkeys {
    hotkey: Mutex<Option<String>>,
}

impl StaticHotkeys {
    pub fn new(hotkey: Option<&str>) -> Self {
        Self {
            hotkey: Mutex::new(hotkey.map(str::to_string)),
        }
    }

    pub fn set(&self, hotkey: Option<&str>) {
        *lock(&self.hotkey) = hotkey.map(str::to_string);
    }
}

impl HotkeySource for StaticHotkeys {
    fn suspend_toggle_hotkey(&self) -> Option<String> {
        lock(&self.hotkey).clone()
    }
}

/// Records the last status shown per tab.
#[derive(Default)]
pub struct RecordingPresentation {
    shown: Mutex<Vec<(TabId, TabStatus)>>,
}

impl RecordingPresentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shown(&self) -> Vec<(TabId, TabStatus)> {
        lock(&self.shown).clone()
    }

    pub fn last_for(&self, tab_id: TabId) -> Option<TabStatus> {
        lock(&self.shown)
            .iter()
            .rev()
            .find(|(id, _)| *id == tab_id)
            .map(|(_, status)| *status)
    }
}

impl Presentation for RecordingPresentation {
    fn show_status(&self, tab_id: TabId, status: TabStatus) {
        lock(&self.shown).push((tab_id, status));
    }
}

/// Full set of in-memory collaborators with typed handles kept for inspection.
#[derive(Clone)]
pub struct MemoryHost {
    pub tabs: Arc<InMemoryTabDirectory>,
    pub messenger: Arc<RecordingMessenger>,
    pub scheduler: Arc<RecordingScheduler>,
    pub tab_checks: Arc<RecordingTabChecks>,
    pub discards: Arc<RecordingDiscards>,
    pub tab_info: Arc<MemoryTabInfoStore>,
    pub session: Arc<CountingSessionRecorder>,
    pub hotkeys: Arc<StaticHotkeys>,
    pub presentation: Arc<RecordingPresentation>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            tabs: Arc::new(InMemoryTabDirectory::new()),
            messenger: Arc::new(RecordingMessenger::new()),
            scheduler: Arc::new(RecordingScheduler::new()),
            tab_checks: Arc::new(RecordingTabChecks::new()),
            discards: Arc::new(RecordingDiscards::new()),
            tab_info: Arc::new(MemoryTabInfoStore::new()),
            session: Arc::new(CountingSessionRecorder::new()),
            hotkeys: Arc::new(StaticHotkeys::new(None)),
            presentation: Arc::new(RecordingPresentation::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            tabs: self.tabs.clone(),
            messenger: self.messenger.clone(),
            scheduler: self.scheduler.clone(),
            tab_checks: self.tab_checks.clone(),
            discards: self.discards.clone(),
            tab_info: self.tab_info.clone(),
            session: self.session.clone(),
            hotkeys: self.hotkeys.clone(),
            presentation: self.presentation.clone(),
        }
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}
