//! Startup schema introspection.
//!
//! Some tables are optional (older installations never created them).
//! Their presence is checked once; handlers consult the result instead of
//! reacting to "no such table" errors per request.

use crate::errors::AppResult;
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::warn;

/// Check if a table exists in the main schema.
pub fn table_exists(conn: &Connection, name: &str) -> AppResult<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let exists: Option<String> = stmt.query_row([name], |row| row.get(0)).optional()?;
    Ok(exists.is_some())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub lookups: bool,
    pub task_data: bool,
}

impl Capabilities {
    pub fn detect(conn: &Connection) -> AppResult<Self> {
        Ok(Self {
            lookups: table_exists(conn, "lookups")?,
            task_data: table_exists(conn, "task_data")?,
        })
    }

    pub fn all() -> Self {
        Self {
            lookups: true,
            task_data: true,
        }
    }
}

/// Rate-limited "optional table missing" warnings, one per entity per window.
pub struct MissingTableWarner {
    every: Duration,
    last: Mutex<HashMap<&'static str, Instant>>,
}

impl MissingTableWarner {
    pub fn new(every: Duration) -> Self {
        Self {
            every,
            last: Mutex::new(HashMap::new()),
        }
    }

    /// Log a warning for `entity` unless one was logged within the window.
    /// Returns whether a warning was emitted.
    pub fn warn(&self, entity: &'static str) -> bool {
        self.warn_at(entity, Instant::now())
    }

    pub(crate) fn warn_at(&self, entity: &'static str, now: Instant) -> bool {
        let Ok(mut last) = self.last.lock() else {
            return false;
        };
        if let Some(prev) = last.get(entity)
            && now.duration_since(*prev) < self.every
        {
            return false;
        }
        last.insert(entity, now);
        warn!(entity, "optional table missing, serving empty result");
        true
    }
}

impl Default for MissingTableWarner {
    fn default() -> Self {
        Self::new(Duration::from_secs(60))
    }
}
