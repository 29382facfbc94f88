//! Cancellable alarms and the per-tab auto-suspend timer.
//!
//! An [`Alarm`] is a spawned tokio task that sleeps and then posts one event
//! to the engine's internal channel. Dropping the alarm aborts the task. Each
//! alarm carries an [`AlarmToken`]; the engine compares it with the token it
//! has stored before acting, so an expiry that raced a cancel does nothing.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::managers::property_store::UnsuspendedTabProps;
use crate::managers::tab_registry::TabHandle;
use crate::services::status_calculator::{
    is_protected_active, is_protected_audible, is_protected_pinned,
};
use crate::types::settings::SuspenderSettings;
use crate::types::tab::TabSnapshot;

/// Longest delay an alarm accepts. Longer auto-suspend delays count as "never".
pub const MAX_ALARM_DELAY: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AlarmToken(u64);

/// A pending alarm. Aborted when dropped.
pub struct Alarm {
    token: AlarmToken,
    deadline: Instant,
    handle: JoinHandle<()>,
}

impl Alarm {
    pub fn token(&self) -> AlarmToken {
        self.token
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    pub fn is_current(&self, token: AlarmToken) -> bool {
        self.token == token
    }
}

impl Drop for Alarm {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl fmt::Debug for Alarm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Alarm")
            .field("token", &self.token)
            .field("deadline", &self.deadline)
            .finish()
    }
}

/// Spawns alarms that deliver events of type `E`.
pub struct AlarmClock<E> {
    sender: UnboundedSender<E>,
    next_token: Arc<AtomicU64>,
}

impl<E> Clone for AlarmClock<E> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            next_token: Arc::clone(&self.next_token),
        }
    }
}

impl<E: Send + 'static> AlarmClock<E> {
    pub fn new(sender: UnboundedSender<E>) -> Self {
        Self {
            sender,
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }

    fn next_token(&self) -> AlarmToken {
        AlarmToken(self.next_token.fetch_add(1, Ordering::Relaxed))
    }

    /// Posts `make(token)` after `delay` unless the returned alarm is dropped first.
    pub fn schedule(&self, delay: Duration, make: impl FnOnce(AlarmToken) -> E) -> Alarm {
        let token = self.next_token();
        let event = make(token);
        let sender = self.sender.clone();
        let deadline = Instant::now() + delay.min(MAX_ALARM_DELAY);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            // A closed channel means the engine has stopped.
            let _ = sender.send(event);
        });
        Alarm {
            token,
            deadline,
            handle,
        }
    }

    /// Posts `event` after `delay`. Cannot be cancelled.
    pub fn schedule_detached(&self, delay: Duration, event: E) {
        let sender = self.sender.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay.min(MAX_ALARM_DELAY)).await;
            let _ = sender.send(event);
        });
    }
}

/// Expiry of a tab's auto-suspend timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AutoSuspendDue {
    pub handle: TabHandle,
    pub token: AlarmToken,
}

/// The armed auto-suspend timer of one tab.
#[derive(Debug)]
pub struct SuspendTimer {
    pub alarm: Alarm,
    /// Wall-clock time the tab is due, reported in debug info.
    pub suspend_at: SystemTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmOutcome {
    Armed(Duration),
    Protected,
    Never,
}

/// Configured auto-suspend delay, or `None` for "never", unparsable values and
/// anything beyond [`MAX_ALARM_DELAY`].
pub fn suspend_delay(options: &SuspenderSettings) -> Option<Duration> {
    let minutes = options.suspend_delay_minutes()?;
    if minutes <= 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(minutes * 60.0)
        .ok()
        .filter(|delay| *delay <= MAX_ALARM_DELAY)
}

/// Pinned, audible and active tabs are never armed while their policy applies.
pub fn is_protected(tab: &TabSnapshot, options: &SuspenderSettings, is_current_active: bool) -> bool {
    is_protected_pinned(tab, options)
        || is_protected_audible(tab, options)
        || is_protected_active(is_current_active, options)
}

/// Arms and disarms auto-suspend timers stored in [`UnsuspendedTabProps`].
pub struct TimerManager<E> {
    clock: AlarmClock<E>,
}

impl<E: From<AutoSuspendDue> + Send + 'static> TimerManager<E> {
    pub fn new(clock: AlarmClock<E>) -> Self {
        Self { clock }
    }

    /// Cancels any existing timer, then starts a fresh one unless the tab is
    /// protected or the delay means "never".
    pub fn arm(
        &self,
        props: &mut UnsuspendedTabProps,
        handle: TabHandle,
        tab: &TabSnapshot,
        options: &SuspenderSettings,
        is_current_active: bool,
    ) -> ArmOutcome {
        props.timer = None;

        if is_protected(tab, options, is_current_active) {
            debug!(tab_id = %tab.id, "tab is protected, timer not armed");
            return ArmOutcome::Protected;
        }
        let Some((delay, suspend_at)) = suspend_delay(options)
            .and_then(|delay| Some((delay, SystemTime::now().checked_add(delay)?)))
        else {
            return ArmOutcome::Never;
        };

        let alarm = self
            .clock
            .schedule(delay, |token| E::from(AutoSuspendDue { handle, token }));
        props.timer = Some(SuspendTimer {
            alarm,
            suspend_at,
        });
        debug!(tab_id = %tab.id, delay_secs = delay.as_secs(), "auto-suspend timer armed");
        ArmOutcome::Armed(delay)
    }

    /// Clears the timer without side effects. Returns whether one was set.
    pub fn disarm(&self, props: &mut UnsuspendedTabProps) -> bool {
        props.timer.take().is_some()
    }

    /// Consumes the timer if `token` is the live one. Stale expiries return false.
    pub fn take_expired(&self, props: &mut UnsuspendedTabProps, token: AlarmToken) -> bool {
        match &props.timer {
            Some(timer) if timer.alarm.is_current(token) => {
                props.timer = None;
                true
            }
            _ => false,
        }
    }
}
