use thiserror::Error;

use super::tab::{TabId, WindowId};

// === DirectoryError ===

/// Errors reported by the host tab directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Tab with the given ID no longer exists.
    #[error("Tab not found: {0}")]
    TabNotFound(TabId),
    /// Window with the given ID no longer exists.
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),
    /// The host rejected the request.
    #[error("Tab directory error: {0}")]
    Host(String),
}

// === MessagingError ===

/// Errors from messaging content scripts and placeholder pages.
///
/// All of these are recoverable: the page may simply be gone.
#[derive(Debug, Error)]
pub enum MessagingError {
    /// Nothing in the tab was listening for the message.
    #[error("No responder in tab: {0}")]
    NoResponder(TabId),
    /// The messaging layer gave up waiting for a response.
    #[error("Message to tab {0} timed out")]
    Timeout(TabId),
    /// The page answered with an error.
    #[error("Message rejected: {0}")]
    Rejected(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === StoreError ===

/// Errors from the per-URL tab metadata store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Tab info database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

// === EngineError ===

/// Errors surfaced by engine entry points. None of them are fatal.
#[derive(Debug, Error)]
pub enum EngineError {
    /// External data could not be parsed.
    #[error("Malformed data: {0}")]
    Malformed(String),
    /// The engine task has stopped.
    #[error("Engine is not running")]
    Stopped,
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Messaging(#[from] MessagingError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Store(#[from] StoreError),
}
