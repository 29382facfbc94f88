//! Engine-level tests for host lifecycle events: timers, replacement,
//! reload flags, discards and malformed input.

use std::time::Duration;

use serde_json::json;
use tab_suspender::adapters::memory::{MemoryHost, SentMessage};
use tab_suspender::engine::{Engine, EngineConfig};
use tab_suspender::types::errors::EngineError;
use tab_suspender::types::events::{HostEvent, TabInfo};
use tab_suspender::types::settings::SuspenderSettings;
use tab_suspender::types::status::{SuspendPriority, SuspendReason, TabStatus};
use tab_suspender::types::tab::{LoadStatus, TabChange, TabId, TabSnapshot, WindowId};

const ACTIVE: TabId = TabId(1);
const NORMAL: TabId = TabId(7);

fn options(suspend_time: &str) -> SuspenderSettings {
    SuspenderSettings {
        suspend_time: suspend_time.to_string(),
        ..SuspenderSettings::default()
    }
}

/// Window 1 holds an active tab and an inactive one, both complete.
async fn setup(options: SuspenderSettings) -> (MemoryHost, Engine) {
    let host = MemoryHost::new();
    let mut active = TabSnapshot::new(ACTIVE, WindowId(1), "https://active.example.com");
    active.active = true;
    host.tabs.put(active);
    let mut normal = TabSnapshot::new(NORMAL, WindowId(1), "https://example.com/article");
    normal.index = 1;
    host.tabs.put(normal);
    host.tabs.set_focused_window(Some(WindowId(1)));

    let mut engine = Engine::new(EngineConfig::default(), host.collaborators(), Box::new(options));
    engine.initialise().await;
    (host, engine)
}

async fn wait(engine: &mut Engine, elapsed: Duration) {
    tokio::time::sleep(elapsed).await;
    tokio::task::yield_now().await;
    engine.process_due().await;
}

fn tab(host: &MemoryHost, tab_id: TabId) -> TabSnapshot {
    host.tabs.tab(tab_id).expect("tab should exist")
}

fn complete() -> TabChange {
    TabChange::status(LoadStatus::Complete)
}

/// Simulates the external scheduler finishing a suspension of `tab_id`.
fn suspend_in_place(engine: &Engine, host: &MemoryHost, tab_id: TabId) -> TabSnapshot {
    let mut snapshot = tab(host, tab_id);
    snapshot.url = engine.urls().encode(&snapshot.url, "Article", None);
    host.tabs.put(snapshot.clone());
    snapshot
}

#[tokio::test(start_paused = true)]
async fn test_inactive_tab_is_auto_suspended_after_delay() {
    let (host, mut engine) = setup(options("5")).await;
    assert!(engine.is_timer_armed(NORMAL));
    assert!(!engine.is_timer_armed(ACTIVE), "The active tab is protected");

    wait(&mut engine, Duration::from_secs(299)).await;
    assert!(host.scheduler.enqueued().is_empty());

    wait(&mut engine, Duration::from_secs(2)).await;
    assert_eq!(host.scheduler.enqueued(), vec![(NORMAL, SuspendPriority::Automatic)]);
    assert_eq!(
        engine.unsuspended_props(NORMAL).and_then(|p| p.pending_suspend_reason),
        Some(SuspendReason::Automatic)
    );
    assert!(!engine.is_timer_armed(NORMAL));
}

#[tokio::test(start_paused = true)]
async fn test_never_setting_arms_nothing() {
    let (host, mut engine) = setup(options("0")).await;
    assert!(!engine.is_timer_armed(NORMAL));
    wait(&mut engine, Duration::from_secs(3600)).await;
    assert!(host.scheduler.enqueued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_completed_load_rearms_and_inits_content_script() {
    let (host, mut engine) = setup(options("5")).await;
    wait(&mut engine, Duration::from_secs(200)).await;

    engine
        .handle_event(HostEvent::TabUpdated {
            change: complete(),
            tab: tab(&host, NORMAL),
        })
        .await
        .unwrap();

    let remaining = engine.timer_deadline(NORMAL).unwrap() - tokio::time::Instant::now();
    assert_eq!(remaining, Duration::from_secs(300));
    assert!(host
        .messenger
        .sent()
        .iter()
        .any(|m| matches!(m, SentMessage::InitNormal(id, init) if *id == NORMAL && init.ignore_forms)));
}

#[tokio::test(start_paused = true)]
async fn test_replaced_tab_keeps_reason_and_banner() {
    let (host, mut engine) = setup(options("5")).await;
    wait(&mut engine, Duration::from_secs(301)).await;
    assert_eq!(host.scheduler.enqueued(), vec![(NORMAL, SuspendPriority::Automatic)]);

    // The scheduler navigates tab 7 to the placeholder; it finishes loading.
    let suspended = suspend_in_place(&engine, &host, NORMAL);
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: suspended })
        .await
        .unwrap();
    let before = engine.suspended_props(NORMAL).cloned().expect("suspended props");
    assert_eq!(before.suspend_reason, Some(SuspendReason::Automatic));
    assert!(before.show_banner.is_some());
    assert!(engine.unsuspended_props(NORMAL).is_none());

    // The host swaps the tab for a new id, e.g. after discarding it.
    host.tabs.renumber(NORMAL, TabId(9));
    engine
        .handle_event(HostEvent::TabReplaced { added: TabId(9), removed: NORMAL })
        .await
        .unwrap();
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: tab(&host, TabId(9)) })
        .await
        .unwrap();

    let after = engine.suspended_props(TabId(9)).cloned().expect("props follow the new id");
    assert_eq!(after.suspend_reason, before.suspend_reason);
    assert_eq!(after.show_banner, before.show_banner);
    assert!(engine.suspended_props(NORMAL).is_none());
    assert!(host
        .messenger
        .sent()
        .iter()
        .any(|m| matches!(m, SentMessage::InitSuspended(id, _) if *id == TabId(9))));
}

#[tokio::test(start_paused = true)]
async fn test_armed_timer_follows_replacement() {
    let (host, mut engine) = setup(options("5")).await;
    host.tabs.renumber(NORMAL, TabId(9));
    engine
        .handle_event(HostEvent::TabReplaced { added: TabId(9), removed: NORMAL })
        .await
        .unwrap();
    assert!(engine.is_timer_armed(TabId(9)));

    wait(&mut engine, Duration::from_secs(301)).await;
    assert_eq!(host.scheduler.enqueued(), vec![(TabId(9), SuspendPriority::Automatic)]);
}

#[tokio::test(start_paused = true)]
async fn test_suspend_on_reload_flag_is_one_shot() {
    let (host, mut engine) = setup(options("5")).await;
    let url = tab(&host, NORMAL).url;
    engine.set_suspend_on_reload_url(NORMAL, &url);

    let event = HostEvent::TabUpdated { change: complete(), tab: tab(&host, NORMAL) };
    engine.handle_event(event.clone()).await.unwrap();
    assert_eq!(host.scheduler.enqueued(), vec![(NORMAL, SuspendPriority::Manual)]);
    assert_eq!(
        engine.unsuspended_props(NORMAL).and_then(|p| p.suspend_on_reload_url.clone()),
        None
    );

    engine.handle_event(event).await.unwrap();
    assert_eq!(host.scheduler.enqueued().len(), 1, "Second load must not suspend again");
    assert!(engine.is_timer_armed(NORMAL));
}

#[tokio::test(start_paused = true)]
async fn test_suspend_on_reload_flag_ignores_other_urls() {
    let (host, mut engine) = setup(options("5")).await;
    engine.set_suspend_on_reload_url(NORMAL, "https://somewhere-else.com");

    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: tab(&host, NORMAL) })
        .await
        .unwrap();

    assert!(host.scheduler.enqueued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_discard_notification_is_handled_once() {
    let (host, mut engine) = setup(options("5")).await;
    let mut discarded = tab(&host, NORMAL);
    discarded.discarded = true;
    let event = HostEvent::TabUpdated {
        change: TabChange {
            discarded: Some(true),
            ..TabChange::default()
        },
        tab: discarded,
    };

    engine.handle_event(event.clone()).await.unwrap();
    engine.handle_event(event).await.unwrap();

    assert_eq!(host.discards.discarded_unsuspended(), vec![NORMAL]);
    assert_eq!(
        engine.unsuspended_props(NORMAL).and_then(|p| p.pending_suspend_reason),
        Some(SuspendReason::ForcedDiscard)
    );
}

#[tokio::test(start_paused = true)]
async fn test_forced_discard_reason_reaches_placeholder() {
    let (host, mut engine) = setup(options("5")).await;
    engine.record_suspend_reason(NORMAL, SuspendReason::ForcedDiscard);

    let suspended = suspend_in_place(&engine, &host, NORMAL);
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: suspended })
        .await
        .unwrap();

    let init = host
        .messenger
        .sent()
        .into_iter()
        .find_map(|m| match m {
            SentMessage::InitSuspended(id, init) if id == NORMAL => Some(init),
            _ => None,
        })
        .expect("placeholder init");
    assert!(init.reason.is_some());
    assert_eq!(init.url, "https://example.com/article");
    assert!(init.request_unsuspend_on_reload);
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_init_uses_cached_info() {
    let (host, mut engine) = setup(options("5")).await;
    host.tab_info.put_info(TabInfo {
        url: "https://example.com/article".to_string(),
        title: Some("<Cached>".to_string()),
        fav_icon_url: Some("https://example.com/icon.png".to_string()),
    });

    let suspended = suspend_in_place(&engine, &host, NORMAL);
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: suspended })
        .await
        .unwrap();

    let init = host
        .messenger
        .sent()
        .into_iter()
        .find_map(|m| match m {
            SentMessage::InitSuspended(_, init) => Some(init),
            _ => None,
        })
        .unwrap();
    assert_eq!(init.title, "&lt;Cached&gt;");
    assert_eq!(init.fav_icon_url, "https://example.com/icon.png");
    assert_eq!(init.reason, None);
    assert_eq!(init.preview_uri, None);
    // Not focused, so the tab check queue verifies it.
    assert_eq!(host.tab_checks.queued(), vec![NORMAL]);
}

#[tokio::test(start_paused = true)]
async fn test_unsuspend_on_reload_flag() {
    let (host, mut engine) = setup(options("5")).await;
    let mut suspended = suspend_in_place(&engine, &host, NORMAL);
    engine.set_unsuspend_on_reload_url(NORMAL, &suspended.url);

    suspended.status = LoadStatus::Loading;
    engine
        .handle_event(HostEvent::TabUpdated {
            change: TabChange::status(LoadStatus::Loading),
            tab: suspended,
        })
        .await
        .unwrap();

    assert!(host.messenger.sent().contains(&SentMessage::Unsuspend(NORMAL)));
    assert_eq!(
        engine.suspended_props(NORMAL).and_then(|p| p.unsuspend_on_reload_url.clone()),
        None
    );
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_placeholder_is_navigated_directly() {
    let (host, engine) = setup(options("5")).await;
    let suspended = suspend_in_place(&engine, &host, NORMAL);
    host.messenger.set_unreachable(NORMAL, true);

    engine.unsuspend_tab(&suspended).await;

    let updates = host.tabs.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].1.url.as_deref(), Some("https://example.com/article"));
}

#[tokio::test(start_paused = true)]
async fn test_unpin_rearms_timer() {
    let (host, mut engine) = setup(options("5")).await;
    let mut pinned = tab(&host, NORMAL);
    pinned.pinned = true;
    host.tabs.put(pinned.clone());
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: pinned })
        .await
        .unwrap();
    assert!(!engine.is_timer_armed(NORMAL));

    let unpinned = TabSnapshot { pinned: false, ..tab(&host, NORMAL) };
    host.tabs.put(unpinned.clone());
    engine
        .handle_event(HostEvent::TabUpdated {
            change: TabChange {
                pinned: Some(false),
                ..TabChange::default()
            },
            tab: unpinned,
        })
        .await
        .unwrap();
    assert!(engine.is_timer_armed(NORMAL));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_content_message_is_rejected() {
    let (host, mut engine) = setup(options("5")).await;
    let result = engine
        .handle_event(HostEvent::ContentMessage {
            sender: tab(&host, NORMAL),
            payload: json!({ "action": "launchRockets" }),
        })
        .await;

    assert!(matches!(result, Err(EngineError::Malformed(_))));
    assert!(host.tabs.updates().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_form_input_report_blocks_host_discard() {
    let (host, mut engine) = setup(options("5")).await;
    engine
        .handle_event(HostEvent::ContentMessage {
            sender: tab(&host, NORMAL),
            payload: json!({ "action": "reportTabState", "status": "formInput" }),
        })
        .await
        .unwrap();

    assert!(!tab(&host, NORMAL).auto_discardable);
}

#[tokio::test(start_paused = true)]
async fn test_saved_preview_resumes_queued_suspension() {
    let (host, mut engine) = setup(options("5")).await;
    engine
        .handle_event(HostEvent::ContentMessage {
            sender: tab(&host, NORMAL),
            payload: json!({ "action": "savePreviewData", "previewUrl": "data:image/png;base64,AAAA" }),
        })
        .await
        .unwrap();

    assert_eq!(host.scheduler.resumed(), vec![NORMAL]);
}

#[tokio::test(start_paused = true)]
async fn test_removed_tab_state_is_purged() {
    let (host, mut engine) = setup(options("5")).await;
    assert!(engine.is_timer_armed(NORMAL));

    host.tabs.remove(NORMAL);
    engine.handle_event(HostEvent::TabRemoved(NORMAL)).await.unwrap();

    assert!(engine.handle_for(NORMAL).is_none());
    assert!(engine.unsuspended_props(NORMAL).is_none());
    wait(&mut engine, Duration::from_secs(301)).await;
    assert!(host.scheduler.enqueued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_session_saves_are_debounced() {
    let (host, mut engine) = setup(options("5")).await;
    engine.handle_event(HostEvent::WindowCreated(WindowId(2))).await.unwrap();
    engine.handle_event(HostEvent::WindowRemoved(WindowId(2))).await.unwrap();
    engine
        .handle_event(HostEvent::TabCreated(TabSnapshot::new(TabId(20), WindowId(1), "about:blank")))
        .await
        .unwrap();

    wait(&mut engine, Duration::from_secs(2)).await;
    assert_eq!(host.session.updates(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_created_placeholder_is_checked() {
    let (host, mut engine) = setup(options("5")).await;
    let url = engine.urls().encode("https://restored.com", "Restored", None);
    let restored = TabSnapshot::new(TabId(30), WindowId(1), &url);

    engine.handle_event(HostEvent::TabCreated(restored)).await.unwrap();

    assert_eq!(host.tab_checks.queued(), vec![TabId(30)]);
}

#[tokio::test(start_paused = true)]
async fn test_focused_tab_status_is_presented() {
    let (host, mut engine) = setup(options("5")).await;
    let mut active = tab(&host, ACTIVE);
    active.pinned = true;
    host.tabs.put(active.clone());

    engine
        .handle_event(HostEvent::TabUpdated {
            change: TabChange {
                pinned: Some(true),
                ..TabChange::default()
            },
            tab: active,
        })
        .await
        .unwrap();

    assert_eq!(host.presentation.last_for(ACTIVE), Some(TabStatus::Pinned));
}

fn discarded_event(host: &MemoryHost, tab_id: TabId) -> HostEvent {
    let mut discarded = tab(host, tab_id);
    discarded.discarded = true;
    HostEvent::TabUpdated {
        change: TabChange {
            discarded: Some(true),
            ..TabChange::default()
        },
        tab: discarded,
    }
}

#[tokio::test(start_paused = true)]
async fn test_discard_after_reload_is_handled_again() {
    let (host, mut engine) = setup(options("5")).await;
    engine.handle_event(discarded_event(&host, NORMAL)).await.unwrap();

    // The user reloads the discarded tab and it loads normally.
    engine
        .handle_event(HostEvent::TabUpdated {
            change: complete(),
            tab: tab(&host, NORMAL),
        })
        .await
        .unwrap();
    assert_eq!(
        engine.unsuspended_props(NORMAL).and_then(|p| p.pending_suspend_reason),
        None
    );
    assert!(engine.is_timer_armed(NORMAL));

    engine.handle_event(discarded_event(&host, NORMAL)).await.unwrap();
    assert_eq!(host.discards.discarded_unsuspended(), vec![NORMAL, NORMAL]);
}

#[tokio::test(start_paused = true)]
async fn test_reload_of_normal_tab_keeps_scheduler_reason() {
    let (host, mut engine) = setup(options("5")).await;
    wait(&mut engine, Duration::from_secs(301)).await;

    // A load completing before the scheduler acts must not drop its reason.
    engine
        .handle_event(HostEvent::TabUpdated {
            change: complete(),
            tab: tab(&host, NORMAL),
        })
        .await
        .unwrap();
    assert_eq!(
        engine.unsuspended_props(NORMAL).and_then(|p| p.pending_suspend_reason),
        Some(SuspendReason::Automatic)
    );
}

#[tokio::test(start_paused = true)]
async fn test_placeholder_reload_keeps_original_reason() {
    let (host, mut engine) = setup(options("5")).await;
    engine.record_suspend_reason(NORMAL, SuspendReason::ForcedDiscard);
    let suspended = suspend_in_place(&engine, &host, NORMAL);
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: suspended.clone() })
        .await
        .unwrap();

    // Placeholders are handed to the scheduler too; that must not re-label them.
    engine.suspend_all_tabs_in_all_windows(true).await;
    assert!(host
        .scheduler
        .enqueued()
        .contains(&(NORMAL, SuspendPriority::Manual)));
    assert!(engine.unsuspended_props(NORMAL).is_none());

    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: suspended })
        .await
        .unwrap();
    assert_eq!(
        engine.suspended_props(NORMAL).and_then(|p| p.suspend_reason),
        Some(SuspendReason::ForcedDiscard)
    );
}

#[tokio::test(start_paused = true)]
async fn test_out_of_range_delay_means_never() {
    let (host, mut engine) = setup(options("1e300")).await;
    assert!(!engine.is_timer_armed(NORMAL));

    engine
        .handle_event(HostEvent::TabUpdated {
            change: complete(),
            tab: tab(&host, NORMAL),
        })
        .await
        .unwrap();
    assert!(!engine.is_timer_armed(NORMAL));

    wait(&mut engine, Duration::from_secs(3600)).await;
    assert!(host.scheduler.enqueued().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_audio_stopping_rearms_timer() {
    let (host, mut engine) = setup(options("5")).await;
    let playing = TabSnapshot { audible: true, ..tab(&host, NORMAL) };
    host.tabs.put(playing.clone());
    engine
        .handle_event(HostEvent::TabUpdated { change: complete(), tab: playing })
        .await
        .unwrap();
    assert!(!engine.is_timer_armed(NORMAL), "Audible tabs are protected");

    wait(&mut engine, Duration::from_secs(120)).await;
    let silent = TabSnapshot { audible: false, ..tab(&host, NORMAL) };
    host.tabs.put(silent.clone());
    engine
        .handle_event(HostEvent::TabUpdated {
            change: TabChange {
                audible: Some(false),
                ..TabChange::default()
            },
            tab: silent,
        })
        .await
        .unwrap();

    let remaining = engine.timer_deadline(NORMAL).unwrap() - tokio::time::Instant::now();
    assert_eq!(remaining, Duration::from_secs(300));
    wait(&mut engine, Duration::from_secs(301)).await;
    assert_eq!(host.scheduler.enqueued(), vec![(NORMAL, SuspendPriority::Automatic)]);
}
