//! SQLite-backed event log.
//!
//! Every write opens its own connection on a blocking thread, so concurrent
//! dispatches never share a connection. Lock waits are bounded by the
//! configured busy timeout.

use crate::config::LogConfig;
use crate::core::EventStore;
use crate::errors::ConfigError;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, Connection};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info};

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("identifier pattern is valid"));

#[derive(Debug, Clone)]
pub struct SqliteEventStore {
    path: PathBuf,
    events_table: String,
    details_table: String,
    busy_timeout: Duration,
}

impl SqliteEventStore {
    /// Creates a store from the log configuration.
    ///
    /// Table names are interpolated into SQL, so they must be plain identifiers.
    pub fn new(config: &LogConfig) -> Result<Self, ConfigError> {
        for (field, table) in [
            ("log.events_table", &config.events_table),
            ("log.details_table", &config.details_table),
        ] {
            if !IDENTIFIER.is_match(table) {
                return Err(ConfigError::InvalidValue {
                    field,
                    reason: format!("'{}' is not a valid table name", table),
                });
            }
        }
        // SQLite compares identifiers case-insensitively.
        if config.events_table.eq_ignore_ascii_case(&config.details_table) {
            return Err(ConfigError::InvalidValue {
                field: "log.details_table",
                reason: "events and details must be stored in different tables".into(),
            });
        }

        Ok(Self {
            path: config.database_path.clone(),
            events_table: config.events_table.clone(),
            details_table: config.details_table.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        })
    }

    /// Creates the two tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        let store = self.clone();
        task::spawn_blocking(move || -> Result<()> {
            let conn = store.open()?;
            conn.execute_batch(&format!(
                "CREATE TABLE IF NOT EXISTS {events} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    severity TEXT NOT NULL,
                    event TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
                CREATE TABLE IF NOT EXISTS {details} (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    event_id INTEGER NOT NULL REFERENCES {events}(id),
                    \"key\" TEXT NOT NULL,
                    \"value\" TEXT NOT NULL
                );",
                events = store.events_table,
                details = store.details_table,
            ))?;
            Ok(())
        })
        .await??;
        info!(path = %self.path.display(), "Event log schema ready");
        Ok(())
    }

    fn open(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(conn)
    }
}

#[async_trait]
impl EventStore for SqliteEventStore {
    async fn insert_event(&self, level: &str, event: &str, at: DateTime<Utc>) -> Result<i64> {
        let store = self.clone();
        let level = level.to_string();
        let event = event.to_string();
        let id = task::spawn_blocking(move || -> Result<i64> {
            let conn = store.open()?;
            conn.execute(
                &format!(
                    "INSERT INTO {}(severity, event, created_at) VALUES (?1, ?2, ?3)",
                    store.events_table
                ),
                params![level, event, at.to_rfc3339()],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await??;
        debug!(id, "Inserted event row");
        Ok(id)
    }

    async fn insert_detail(&self, event_id: i64, key: &str, value: &str) -> Result<()> {
        let store = self.clone();
        let key = key.to_string();
        let value = value.to_string();
        task::spawn_blocking(move || -> Result<()> {
            let conn = store.open()?;
            conn.execute(
                &format!(
                    "INSERT INTO {}(event_id, \"key\", \"value\") VALUES (?1, ?2, ?3)",
                    store.details_table
                ),
                params![event_id, key, value],
            )?;
            Ok(())
        })
        .await??;
        Ok(())
    }
}
