//! tab-suspender demo.
//!
//! Drives the engine against in-memory collaborators, with the SQLite tab
//! info store, and prints what it asked of them.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use tab_suspender::adapters::memory::MemoryHost;
use tab_suspender::app::App;
use tab_suspender::engine::{EngineConfig, UserCommand};
use tab_suspender::services::suspended_url::UrlClassifier;
use tab_suspender::services::tab_info_store::SqliteTabInfoStore;
use tab_suspender::types::events::{HostEvent, TabInfo};
use tab_suspender::types::tab::{LoadStatus, TabChange, TabId, TabSnapshot, WindowId};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = EngineConfig::default();
    let urls = UrlClassifier::new(&config.suspended_page);
    let host = MemoryHost::new();

    let store = Arc::new(SqliteTabInfoStore::open_in_memory()?);
    store.save_tab_info(&TabInfo {
        url: "https://example.org/article".to_string(),
        title: Some("An article".to_string()),
        fav_icon_url: None,
    })?;
    let mut collaborators = host.collaborators();
    collaborators.tab_info = store;

    let window = WindowId(1);
    let mut active = TabSnapshot::new(TabId(1), window, "https://example.com");
    active.active = true;
    host.tabs.put(active);
    host.tabs.put(TabSnapshot::new(TabId(2), window, "https://example.org/article"));
    let suspended_url = urls.encode("https://example.org/article", "An article", None);
    host.tabs.put(TabSnapshot::new(TabId(3), window, &suspended_url));
    host.tabs.set_focused_window(Some(window));

    let settings = App::load_settings(None);
    let app = App::start(config, collaborators, settings).await;

    app.handle.send_event(HostEvent::TabUpdated {
        change: TabChange::status(LoadStatus::Complete),
        tab: TabSnapshot::new(TabId(3), window, &suspended_url),
    })
    .await?;
    app.handle.command(UserCommand::SuspendAllTabs { force: false }).await?;

    for id in [1, 2, 3] {
        let status = app.handle.tab_status(TabId(id)).await?;
        let debug = app.handle.debug_info(TabId(id)).await?;
        println!("tab {}: {} {}", id, status, serde_json::to_string(&debug)?);
    }
    println!("active tab: {}", app.handle.active_tab_status().await?);

    app.stop().await?;

    println!("suspension requests: {:?}", host.scheduler.enqueued());
    for message in host.messenger.sent() {
        println!("sent: {:?}", message);
    }
    Ok(())
}
