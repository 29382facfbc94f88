//! SQLite-backed cache of tab titles, favicons and page previews.
//!
//! Suspended pages read from here to render the placeholder for a URL.

use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::adapters::TabInfoStore;
use crate::database::Database;
use crate::types::errors::StoreError;
use crate::types::events::TabInfo;

pub struct SqliteTabInfoStore {
    db: Mutex<Database>,
}

impl SqliteTabInfoStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Ok(Self {
            db: Mutex::new(Database::open(path)?),
        })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self {
            db: Mutex::new(Database::open_in_memory()?),
        })
    }

    fn now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64
    }

    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StoreError> {
        let db = self
            .db
            .lock()
            .map_err(|_| StoreError::DatabaseError("tab info store lock poisoned".to_string()))?;
        f(&db).map_err(StoreError::from)
    }

    /// Inserts or replaces the cached info for `info.url`.
    pub fn save_tab_info(&self, info: &TabInfo) -> Result<(), StoreError> {
        self.with_db(|db| {
            db.connection().execute(
                "INSERT OR REPLACE INTO tab_info (url, title, fav_icon_url, updated_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![info.url, info.title, info.fav_icon_url, Self::now()],
            )?;
            Ok(())
        })
    }

    /// Drops previews older than `max_age_secs`. Returns the number removed.
    pub fn prune_previews(&self, max_age_secs: i64) -> Result<usize, StoreError> {
        let cutoff = Self::now() - max_age_secs;
        self.with_db(|db| {
            db.connection()
                .execute("DELETE FROM previews WHERE created_at < ?1", params![cutoff])
        })
    }
}

#[async_trait]
impl TabInfoStore for SqliteTabInfoStore {
    async fn fetch_tab_info(&self, url: &str) -> Result<Option<TabInfo>, StoreError> {
        self.with_db(|db| {
            db.connection()
                .query_row(
                    "SELECT url, title, fav_icon_url FROM tab_info WHERE url = ?1",
                    params![url],
                    |row| {
                        Ok(TabInfo {
                            url: row.get(0)?,
                            title: row.get(1)?,
                            fav_icon_url: row.get(2)?,
                        })
                    },
                )
                .optional()
        })
    }

    async fn fetch_preview_image(&self, url: &str) -> Result<Option<String>, StoreError> {
        self.with_db(|db| {
            db.connection()
                .query_row(
                    "SELECT img FROM previews WHERE url = ?1",
                    params![url],
                    |row| row.get(0),
                )
                .optional()
        })
    }

    async fn add_preview_image(&self, url: &str, data: &str) -> Result<(), StoreError> {
        self.with_db(|db| {
            db.connection().execute(
                "INSERT OR REPLACE INTO previews (url, img, created_at) VALUES (?1, ?2, ?3)",
                params![url, data, Self::now()],
            )?;
            Ok(())
        })
    }
}
