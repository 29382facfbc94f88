//! Unit tests for the suspend-eligibility priority chain.

use rstest::rstest;
use tab_suspender::services::status_calculator::{compute_status, Environment, StatusContext};
use tab_suspender::services::suspended_url::UrlClassifier;
use tab_suspender::types::settings::SuspenderSettings;
use tab_suspender::types::status::{ContentStatus, TabStatus};
use tab_suspender::types::tab::{LoadStatus, TabId, TabSnapshot, WindowId};

const PAGE: &str = "chrome-extension://tab-suspender/suspended.html";

fn tab(url: &str) -> TabSnapshot {
    TabSnapshot::new(TabId(7), WindowId(1), url)
}

fn status_of(
    tab: &TabSnapshot,
    sub_status: Option<ContentStatus>,
    options: &SuspenderSettings,
    environment: Environment,
    is_current_active: bool,
) -> TabStatus {
    let urls = UrlClassifier::new(PAGE);
    let ctx = StatusContext {
        options,
        environment,
        urls: &urls,
        is_current_active,
    };
    compute_status(tab, sub_status, &ctx)
}

#[test]
fn test_plain_tab_reports_content_status() {
    let options = SuspenderSettings::default();
    let t = tab("https://example.com");
    assert_eq!(
        status_of(&t, Some(ContentStatus::Normal), &options, Environment::default(), false),
        TabStatus::Normal
    );
    assert_eq!(
        status_of(&t, None, &options, Environment::default(), false),
        TabStatus::Unknown
    );
}

#[test]
fn test_loading_beats_everything() {
    let mut options = SuspenderSettings::default();
    options.whitelist = "example.com".to_string();
    let mut t = tab("https://example.com");
    t.status = LoadStatus::Loading;
    t.pinned = true;
    assert_eq!(
        status_of(&t, Some(ContentStatus::FormInput), &options, Environment::default(), true),
        TabStatus::Loading
    );
}

#[rstest]
#[case("file:///tmp/a.html", TabStatus::BlockedFile)]
#[case("chrome://extensions", TabStatus::Special)]
#[case("chrome-extension://tab-suspender/suspended.html#uri=https://a.com", TabStatus::Suspended)]
fn test_url_based_statuses(#[case] url: &str, #[case] expected: TabStatus) {
    let options = SuspenderSettings::default();
    assert_eq!(
        status_of(&tab(url), None, &options, Environment::default(), false),
        expected
    );
}

#[test]
fn test_discarded_wins_over_suspended_url() {
    let options = SuspenderSettings::default();
    let mut t = tab("chrome-extension://tab-suspender/suspended.html#uri=https://a.com");
    t.discarded = true;
    assert_eq!(
        status_of(&t, None, &options, Environment::default(), false),
        TabStatus::Discarded
    );
}

#[test]
fn test_whitelist_beats_never() {
    let mut options = SuspenderSettings::default();
    options.whitelist = "example.com".to_string();
    options.suspend_time = "0".to_string();
    assert_eq!(
        status_of(&tab("https://example.com"), None, &options, Environment::default(), false),
        TabStatus::Whitelisted
    );
    assert_eq!(
        status_of(&tab("https://other.com"), None, &options, Environment::default(), false),
        TabStatus::Never
    );
}

#[rstest]
#[case(ContentStatus::TempWhitelist, TabStatus::TempWhitelist)]
#[case(ContentStatus::FormInput, TabStatus::FormInput)]
fn test_content_status_beats_policy(#[case] sub: ContentStatus, #[case] expected: TabStatus) {
    let mut options = SuspenderSettings::default();
    options.ignore_when_charging = true;
    let environment = Environment {
        charging: true,
        ..Environment::default()
    };
    let mut t = tab("https://example.com");
    t.pinned = true;
    assert_eq!(status_of(&t, Some(sub), &options, environment, true), expected);
}

#[test]
fn test_charging_then_offline() {
    let mut options = SuspenderSettings::default();
    options.ignore_when_charging = true;
    options.ignore_when_offline = true;
    let t = tab("https://example.com");

    let both = Environment {
        charging: true,
        online: false,
        file_access_allowed: false,
    };
    assert_eq!(
        status_of(&t, Some(ContentStatus::Normal), &options, both, false),
        TabStatus::Charging
    );

    let offline = Environment {
        online: false,
        ..Environment::default()
    };
    assert_eq!(
        status_of(&t, Some(ContentStatus::Normal), &options, offline, false),
        TabStatus::NoConnectivity
    );
}

#[test]
fn test_policy_flags_are_ignored_when_options_disabled() {
    let mut options = SuspenderSettings::default();
    options.ignore_pinned = false;
    options.ignore_audio = false;
    options.ignore_active_tabs = false;
    let mut t = tab("https://example.com");
    t.pinned = true;
    t.audible = true;
    assert_eq!(
        status_of(&t, Some(ContentStatus::Normal), &options, Environment::default(), true),
        TabStatus::Normal
    );
}

#[test]
fn test_pinned_then_audible_then_active() {
    let options = SuspenderSettings::default();
    let mut t = tab("https://example.com");
    t.pinned = true;
    t.audible = true;
    let env = Environment::default();
    assert_eq!(status_of(&t, Some(ContentStatus::Normal), &options, env, true), TabStatus::Pinned);
    t.pinned = false;
    assert_eq!(status_of(&t, Some(ContentStatus::Normal), &options, env, true), TabStatus::Audible);
    t.audible = false;
    assert_eq!(status_of(&t, Some(ContentStatus::Normal), &options, env, true), TabStatus::Active);
}
