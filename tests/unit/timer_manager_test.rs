//! Unit tests for alarms and the auto-suspend timer.

use std::time::Duration;

use tab_suspender::managers::property_store::UnsuspendedTabProps;
use tab_suspender::managers::tab_registry::TabRegistry;
use tab_suspender::managers::timer_manager::{
    AlarmClock, ArmOutcome, AutoSuspendDue, TimerManager,
};
use tab_suspender::types::settings::SuspenderSettings;
use tab_suspender::types::tab::{TabId, TabSnapshot, WindowId};
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::Instant;

fn timers() -> (TimerManager<AutoSuspendDue>, UnboundedReceiver<AutoSuspendDue>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TimerManager::new(AlarmClock::new(tx)), rx)
}

fn five_minutes() -> SuspenderSettings {
    SuspenderSettings {
        suspend_time: "5".to_string(),
        ..SuspenderSettings::default()
    }
}

fn tab() -> TabSnapshot {
    TabSnapshot::new(TabId(7), WindowId(1), "https://example.com")
}

async fn wait(elapsed: Duration) {
    tokio::time::sleep(elapsed).await;
    tokio::task::yield_now().await;
}

#[tokio::test(start_paused = true)]
async fn test_armed_timer_fires_once_after_delay() {
    let (timers, mut rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    let outcome = timers.arm(&mut props, handle, &tab(), &five_minutes(), false);
    assert_eq!(outcome, ArmOutcome::Armed(Duration::from_secs(300)));
    let deadline = props.timer.as_ref().unwrap().alarm.deadline();
    assert_eq!(deadline - Instant::now(), Duration::from_secs(300));

    wait(Duration::from_secs(299)).await;
    assert!(rx.try_recv().is_err());

    wait(Duration::from_secs(2)).await;
    let due = rx.try_recv().expect("timer should fire");
    assert_eq!(due.handle, handle);
    assert!(timers.take_expired(&mut props, due.token));
    assert!(props.timer.is_none());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_rearm_replaces_previous_timer() {
    let (timers, mut rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);
    let first_token = props.timer.as_ref().unwrap().alarm.token();
    wait(Duration::from_secs(120)).await;
    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);
    let second_token = props.timer.as_ref().unwrap().alarm.token();
    assert_ne!(first_token, second_token);

    // The first deadline passes without an event.
    wait(Duration::from_secs(200)).await;
    assert!(rx.try_recv().is_err());

    wait(Duration::from_secs(101)).await;
    let due = rx.try_recv().unwrap();
    assert_eq!(due.token, second_token);
}

#[tokio::test(start_paused = true)]
async fn test_stale_token_does_not_consume_timer() {
    let (timers, _rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);
    let stale = props.timer.as_ref().unwrap().alarm.token();
    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);

    assert!(!timers.take_expired(&mut props, stale));
    assert!(props.timer.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_pinned_tab_is_protected_and_loses_its_timer() {
    let (timers, mut rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();
    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);

    let mut pinned = tab();
    pinned.pinned = true;
    let outcome = timers.arm(&mut props, handle, &pinned, &five_minutes(), false);

    assert_eq!(outcome, ArmOutcome::Protected);
    assert!(props.timer.is_none());
    wait(Duration::from_secs(301)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_active_and_audible_protection_follow_options() {
    let (timers, _rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    assert_eq!(
        timers.arm(&mut props, handle, &tab(), &five_minutes(), true),
        ArmOutcome::Protected
    );

    let mut audible = tab();
    audible.audible = true;
    let permissive = SuspenderSettings {
        ignore_audio: false,
        ignore_active_tabs: false,
        ..five_minutes()
    };
    assert!(matches!(
        timers.arm(&mut props, handle, &audible, &permissive, true),
        ArmOutcome::Armed(_)
    ));
}

#[tokio::test]
async fn test_never_and_unparsable_delays_do_not_arm() {
    let (timers, _rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    for value in ["0", "garbage"] {
        let options = SuspenderSettings {
            suspend_time: value.to_string(),
            ..SuspenderSettings::default()
        };
        assert_eq!(
            timers.arm(&mut props, handle, &tab(), &options, false),
            ArmOutcome::Never
        );
        assert!(props.timer.is_none());
    }
}

#[tokio::test]
async fn test_disarm_reports_whether_a_timer_was_set() {
    let (timers, _rx) = timers();
    let mut registry = TabRegistry::new();
    let handle = registry.ensure(TabId(7));
    let mut props = UnsuspendedTabProps::default();

    assert!(!timers.disarm(&mut props));
    timers.arm(&mut props, handle, &tab(), &five_minutes(), false);
    assert!(timers.disarm(&mut props));
    assert!(props.timer.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_detached_alarm_delivers_event() {
    let (tx, mut rx) = mpsc::unbounded_channel::<&'static str>();
    let clock = AlarmClock::new(tx);
    clock.schedule_detached(Duration::from_secs(2), "due");

    wait(Duration::from_secs(3)).await;
    assert_eq!(rx.try_recv().ok(), Some("due"));
}
