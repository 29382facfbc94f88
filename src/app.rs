//! App Core for tab-suspender.
//!
//! Loads the options, builds the engine from a set of collaborators and runs
//! it as a background task.

use std::path::PathBuf;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::adapters::Collaborators;
use crate::engine::{Engine, EngineConfig, EngineHandle};
use crate::services::settings_engine::{SettingsEngine, SettingsEngineTrait};
use crate::types::errors::EngineError;

/// A running engine and the task driving it.
pub struct App {
    pub handle: EngineHandle,
    task: JoinHandle<()>,
}

impl App {
    /// Loads options from `settings_path` (or the platform default), falling
    /// back to defaults when the file is unreadable.
    pub fn load_settings(settings_path: Option<PathBuf>) -> SettingsEngine {
        let mut settings = SettingsEngine::new(settings_path);
        if let Err(e) = settings.load() {
            warn!(error = %e, path = %settings.get_config_path().display(), "using default settings");
        }
        settings
    }

    /// Initialises the engine against the currently open tabs and spawns it.
    pub async fn start(config: EngineConfig, host: Collaborators, settings: SettingsEngine) -> Self {
        let mut engine = Engine::new(config, host, Box::new(settings));
        engine.initialise().await;
        let (handle, messages) = engine.channel();
        let task = tokio::spawn(engine.run(messages));
        info!("tab suspender started");
        Self { handle, task }
    }

    /// Stops the engine and waits for it to finish.
    pub async fn stop(self) -> Result<(), EngineError> {
        self.handle.shutdown().await?;
        self.task.await.map_err(|_| EngineError::Stopped)
    }
}
