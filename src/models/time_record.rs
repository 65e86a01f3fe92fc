use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Clock-in / clock-out of a working shift.
    Shift,
    /// Time spent on one task.
    Task,
}

impl RecordKind {
    pub fn to_db_str(self) -> &'static str {
        match self {
            RecordKind::Shift => "shift",
            RecordKind::Task => "task",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "shift" => Some(RecordKind::Shift),
            "task" => Some(RecordKind::Task),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Web,
    Desktop,
    /// Replayed from a desktop client's offline queue.
    Offline,
}

impl RecordSource {
    pub fn to_db_str(self) -> &'static str {
        match self {
            RecordSource::Web => "web",
            RecordSource::Desktop => "desktop",
            RecordSource::Offline => "offline",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "web" => Some(RecordSource::Web),
            "desktop" => Some(RecordSource::Desktop),
            "offline" => Some(RecordSource::Offline),
            _ => None,
        }
    }
}

/// One `time_tracking` row.
///
/// Lifecycle: created open (`end_time` null, `finished` false), closed once
/// (`end_time`, `duration_minutes`, `finished` set), never touched again.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRecord {
    pub id: i64,
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub kind: RecordKind,
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_minutes: Option<i64>,
    pub finished: bool,
    pub note: String,
    pub idempotency_key: Option<String>,
    pub source: RecordSource,
    pub created_at: String,
}

impl TimeRecord {
    pub const COLUMNS: &'static str = "id, user_id, task_id, kind, start_time, end_time, \
         duration_minutes, finished, note, idempotency_key, source, created_at";

    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let kind_str: String = row.get("kind")?;
        let kind =
            RecordKind::from_db_str(&kind_str).ok_or_else(|| super::bad_enum("kind", &kind_str))?;
        let source_str: String = row.get("source")?;
        let source = RecordSource::from_db_str(&source_str)
            .ok_or_else(|| super::bad_enum("source", &source_str))?;

        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            task_id: row.get("task_id")?,
            kind,
            start_time: row.get("start_time")?,
            end_time: row.get("end_time")?,
            duration_minutes: row.get("duration_minutes")?,
            finished: row.get::<_, i64>("finished")? == 1,
            note: row.get("note")?,
            idempotency_key: row.get("idempotency_key")?,
            source,
            created_at: row.get("created_at")?,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.finished
    }
}

/// Key/value pair attached to a closed record (`task_data` table).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDatum {
    pub key: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDataRow {
    pub id: i64,
    pub time_tracking_id: i64,
    pub task_id: Option<i64>,
    pub key: String,
    pub value: String,
}

impl TaskDataRow {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            time_tracking_id: row.get("time_tracking_id")?,
            task_id: row.get("task_id")?,
            key: row.get("key")?,
            value: row.get("value")?,
        })
    }
}
