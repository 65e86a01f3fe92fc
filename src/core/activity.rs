//! Time-tracking state machine.
//!
//! A record is created open and closed exactly once. Every entry point is
//! idempotent under its client-supplied key so offline queues can be
//! replayed safely.

use crate::db::log::ttlog_quiet;
use crate::db::queries::time_tracking::{self as tt, NewRecord};
use crate::db::queries::{task_data, tasks, users};
use crate::db::schema::Capabilities;
use crate::db::{TrackedConn, TrackedDb};
use crate::errors::{AppError, AppResult, is_unique_violation};
use crate::models::time_record::{RecordKind, RecordSource, TaskDatum, TimeRecord};
use crate::utils::time::{format_timestamp, minutes_between, now, parse_optional_timestamp, parse_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

const MAX_KEY_LEN: usize = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    /// Same logical action seen before; nothing written.
    Duplicate,
    Closed,
    AlreadyClosed,
    /// Only produced by `sync` for an action that failed.
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResult {
    pub outcome: Outcome,
    pub duplicate: bool,
    pub record: TimeRecord,
}

impl ActivityResult {
    fn new(outcome: Outcome, record: TimeRecord) -> Self {
        Self {
            duplicate: matches!(outcome, Outcome::Duplicate),
            outcome,
            record,
        }
    }
}

/// Which record a finish request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordRef {
    Id(i64),
    Key(String),
}

impl RecordRef {
    pub fn from_parts(id: Option<i64>, key: Option<String>) -> AppResult<Self> {
        match (id, key) {
            (Some(id), _) => Ok(RecordRef::Id(id)),
            (None, Some(key)) if !key.trim().is_empty() => Ok(RecordRef::Key(key)),
            _ => Err(AppError::validation("id or key is required")),
        }
    }
}

/// One entry of a desktop client's offline queue.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum SyncAction {
    #[serde(rename_all = "camelCase")]
    ClockIn { at: Option<String>, key: String },
    #[serde(rename_all = "camelCase")]
    ClockOut {
        at: Option<String>,
        note: Option<String>,
        #[serde(default)]
        task_data: Vec<TaskDatum>,
        key: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    StartActivity {
        task_id: i64,
        at: Option<String>,
        key: String,
    },
    #[serde(rename_all = "camelCase")]
    FinishActivity {
        id: Option<i64>,
        key: Option<String>,
        at: Option<String>,
        note: Option<String>,
        #[serde(default)]
        task_data: Vec<TaskDatum>,
    },
}

impl SyncAction {
    pub fn name(&self) -> &'static str {
        match self {
            SyncAction::ClockIn { .. } => "clock-in",
            SyncAction::ClockOut { .. } => "clock-out",
            SyncAction::StartActivity { .. } => "start-activity",
            SyncAction::FinishActivity { .. } => "finish-activity",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncItem {
    pub index: usize,
    pub action: &'static str,
    pub outcome: Outcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<TimeRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn normalize_key(key: Option<&str>) -> AppResult<Option<&str>> {
    match key.map(str::trim) {
        None | Some("") => Ok(None),
        Some(k) if k.len() > MAX_KEY_LEN => Err(AppError::validation("idempotency key too long")),
        Some(k) => Ok(Some(k)),
    }
}

/// Record already carrying `key`; a key owned by someone else is a conflict.
fn owned_by_key(conn: &TrackedConn, key: &str, user_id: i64) -> AppResult<Option<TimeRecord>> {
    match tt::find_by_key(conn, key)? {
        Some(rec) if rec.user_id != user_id => Err(AppError::Conflict(
            "idempotency key already used by another user".to_string(),
        )),
        other => Ok(other),
    }
}

fn load(conn: &TrackedConn, id: i64) -> AppResult<TimeRecord> {
    tt::get(conn, id)?.ok_or_else(|| AppError::not_found("time record", id))
}

fn ensure_user(conn: &TrackedConn, user_id: i64) -> AppResult<()> {
    if users::exists(conn, user_id)? {
        Ok(())
    } else {
        Err(AppError::not_found("user", user_id))
    }
}

pub struct Tracker<'a> {
    db: &'a TrackedDb,
    caps: Capabilities,
}

impl<'a> Tracker<'a> {
    pub fn new(db: &'a TrackedDb, caps: Capabilities) -> Self {
        Self { db, caps }
    }

    // ------------------------------------------------
    // SHIFTS
    // ------------------------------------------------

    /// Open a shift. The open-shift check and the insert share one
    /// `BEGIN IMMEDIATE` transaction, so concurrent clock-ins serialize.
    pub async fn clock_in(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        key: Option<&str>,
        source: RecordSource,
    ) -> AppResult<ActivityResult> {
        let key = normalize_key(key)?.map(str::to_string);
        let start = format_timestamp(&at);

        self.db
            .transaction(move |tx| {
                if let Some(k) = key.as_deref()
                    && let Some(existing) = owned_by_key(tx, k, user_id)?
                {
                    return Ok(ActivityResult::new(Outcome::Duplicate, existing));
                }
                if let Some(open) = tt::find_open(tx, user_id, RecordKind::Shift)? {
                    return Err(AppError::Conflict(format!(
                        "shift {} is already open",
                        open.id
                    )));
                }
                ensure_user(tx, user_id)?;

                let id = match insert_or_duplicate(
                    tx,
                    &NewRecord {
                        user_id,
                        task_id: None,
                        kind: RecordKind::Shift,
                        start_time: &start,
                        idempotency_key: key.as_deref(),
                        source,
                    },
                )? {
                    Ok(id) => id,
                    Err(existing) => return Ok(ActivityResult::new(Outcome::Duplicate, existing)),
                };

                ttlog_quiet(
                    tx.raw(),
                    "clock_in",
                    &user_id.to_string(),
                    &format!("shift {id} opened at {start}"),
                );
                info!(user_id, record = id, "clock-in");
                Ok(ActivityResult::new(Outcome::Created, load(tx, id)?))
            })
            .await
    }

    /// Close the user's shift. `key` names the shift (the key used at
    /// clock-in); without it, or when unknown, the open shift is closed.
    pub async fn clock_out(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
        note: Option<&str>,
        data: &[TaskDatum],
        key: Option<&str>,
    ) -> AppResult<ActivityResult> {
        let key = normalize_key(key)?.map(str::to_string);
        let note = note.map(str::to_string);
        let data = data.to_vec();
        let caps = self.caps;

        self.db
            .transaction(move |tx| {
                let by_key = match key.as_deref() {
                    Some(k) => owned_by_key(tx, k, user_id)?.filter(|r| r.kind == RecordKind::Shift),
                    None => None,
                };
                let target = match by_key {
                    Some(rec) => rec,
                    None => tt::find_open(tx, user_id, RecordKind::Shift)?
                        .ok_or_else(|| AppError::Conflict("no open shift".to_string()))?,
                };

                if target.finished {
                    return Ok(ActivityResult::new(Outcome::AlreadyClosed, target));
                }
                if !close_record(tx, caps, &target, at, note.as_deref(), &data)? {
                    return Ok(ActivityResult::new(
                        Outcome::AlreadyClosed,
                        load(tx, target.id)?,
                    ));
                }
                ttlog_quiet(
                    tx.raw(),
                    "clock_out",
                    &user_id.to_string(),
                    &format!("shift {} closed", target.id),
                );

                info!(user_id, record = target.id, "clock-out");
                Ok(ActivityResult::new(Outcome::Closed, load(tx, target.id)?))
            })
            .await
    }

    // ------------------------------------------------
    // TASK ACTIVITIES
    // ------------------------------------------------

    pub async fn start_activity(
        &self,
        user_id: i64,
        task_id: i64,
        at: DateTime<Utc>,
        key: Option<&str>,
        source: RecordSource,
    ) -> AppResult<ActivityResult> {
        let key = normalize_key(key)?.map(str::to_string);
        let start = format_timestamp(&at);

        self.db
            .transaction(move |tx| {
                if let Some(k) = key.as_deref()
                    && let Some(existing) = owned_by_key(tx, k, user_id)?
                {
                    return Ok(ActivityResult::new(Outcome::Duplicate, existing));
                }
                if tasks::get(tx, task_id)?.is_none() {
                    return Err(AppError::not_found("task", task_id));
                }
                if let Some(open) = tt::find_open(tx, user_id, RecordKind::Task)? {
                    return Err(AppError::Conflict(format!(
                        "activity {} is still open",
                        open.id
                    )));
                }
                ensure_user(tx, user_id)?;

                let id = match insert_or_duplicate(
                    tx,
                    &NewRecord {
                        user_id,
                        task_id: Some(task_id),
                        kind: RecordKind::Task,
                        start_time: &start,
                        idempotency_key: key.as_deref(),
                        source,
                    },
                )? {
                    Ok(id) => id,
                    Err(existing) => return Ok(ActivityResult::new(Outcome::Duplicate, existing)),
                };

                info!(user_id, task_id, record = id, "activity started");
                Ok(ActivityResult::new(Outcome::Created, load(tx, id)?))
            })
            .await
    }

    pub async fn finish_activity(
        &self,
        user_id: i64,
        target: &RecordRef,
        at: DateTime<Utc>,
        note: Option<&str>,
        data: &[TaskDatum],
    ) -> AppResult<ActivityResult> {
        let target = target.clone();
        let note = note.map(str::to_string);
        let data = data.to_vec();
        let caps = self.caps;

        self.db
            .transaction(move |tx| {
                let rec = match &target {
                    RecordRef::Id(id) => tt::get(tx, *id)?,
                    RecordRef::Key(k) => tt::find_by_key(tx, k)?,
                }
                .filter(|r| r.user_id == user_id)
                .ok_or_else(|| AppError::NotFound("activity not found".to_string()))?;

                if rec.kind != RecordKind::Task {
                    return Err(AppError::validation(format!(
                        "record {} is a shift, use clock-out",
                        rec.id
                    )));
                }
                if rec.finished {
                    return Ok(ActivityResult::new(Outcome::AlreadyClosed, rec));
                }
                if !close_record(tx, caps, &rec, at, note.as_deref(), &data)? {
                    return Ok(ActivityResult::new(Outcome::AlreadyClosed, load(tx, rec.id)?));
                }

                info!(user_id, record = rec.id, "activity finished");
                Ok(ActivityResult::new(Outcome::Closed, load(tx, rec.id)?))
            })
            .await
    }

    // ------------------------------------------------
    // OFFLINE QUEUE
    // ------------------------------------------------

    /// Replay actions in order. A failing action does not stop the rest.
    pub async fn sync(&self, user_id: i64, actions: &[SyncAction]) -> Vec<SyncItem> {
        let mut out = Vec::with_capacity(actions.len());
        for (index, action) in actions.iter().enumerate() {
            let item = match self.apply(user_id, action).await {
                Ok(res) => SyncItem {
                    index,
                    action: action.name(),
                    outcome: res.outcome,
                    record: Some(res.record),
                    error: None,
                },
                Err(e) => {
                    if e.status().is_server_error() {
                        warn!(index, action = action.name(), error = %e, "sync action failed");
                    }
                    SyncItem {
                        index,
                        action: action.name(),
                        outcome: Outcome::Error,
                        record: None,
                        error: Some(e.public_message()),
                    }
                }
            };
            out.push(item);
        }
        out
    }

    async fn apply(&self, user_id: i64, action: &SyncAction) -> AppResult<ActivityResult> {
        let source = RecordSource::Offline;
        match action {
            SyncAction::ClockIn { at, key } => {
                let at = at_or_now(at.as_deref())?;
                self.clock_in(user_id, at, Some(key), source).await
            }
            SyncAction::ClockOut {
                at,
                note,
                task_data,
                key,
            } => {
                let at = at_or_now(at.as_deref())?;
                self.clock_out(user_id, at, note.as_deref(), task_data, key.as_deref())
                    .await
            }
            SyncAction::StartActivity { task_id, at, key } => {
                let at = at_or_now(at.as_deref())?;
                self.start_activity(user_id, *task_id, at, Some(key), source)
                    .await
            }
            SyncAction::FinishActivity {
                id,
                key,
                at,
                note,
                task_data,
            } => {
                let target = RecordRef::from_parts(*id, key.clone())?;
                let at = at_or_now(at.as_deref())?;
                self.finish_activity(user_id, &target, at, note.as_deref(), task_data)
                    .await
            }
        }
    }
}

/// Insert, or hand back the record that won a concurrent race on the same
/// idempotency key. Losing the one-open-record index is a conflict.
fn insert_or_duplicate(
    conn: &TrackedConn,
    rec: &NewRecord<'_>,
) -> AppResult<Result<i64, TimeRecord>> {
    match tt::insert(conn, rec) {
        Ok(id) => Ok(Ok(id)),
        Err(e) if is_unique_violation(&e) => {
            if let Some(k) = rec.idempotency_key
                && let Some(existing) = owned_by_key(conn, k, rec.user_id)?
            {
                return Ok(Err(existing));
            }
            Err(AppError::Conflict(match rec.kind {
                RecordKind::Shift => "a shift is already open".to_string(),
                RecordKind::Task => "an activity is still open".to_string(),
            }))
        }
        Err(e) => Err(e),
    }
}

/// Close `rec` at `at` and attach note and task data. False when another
/// request closed it first.
fn close_record(
    conn: &TrackedConn,
    caps: Capabilities,
    rec: &TimeRecord,
    at: DateTime<Utc>,
    note: Option<&str>,
    data: &[TaskDatum],
) -> AppResult<bool> {
    let start = parse_timestamp(&rec.start_time)?;
    if at < start {
        return Err(AppError::validation("end time is before start time"));
    }
    let minutes = minutes_between(start, at);
    if !tt::close(conn, rec.id, &format_timestamp(&at), minutes, note)? {
        return Ok(false);
    }

    if !data.is_empty() {
        if data.iter().any(|d| d.key.trim().is_empty()) {
            return Err(AppError::validation("task data key must not be empty"));
        }
        if caps.task_data {
            task_data::upsert_many(conn, rec.id, rec.task_id, data)?;
        } else {
            debug!(record = rec.id, "task_data table missing, task data dropped");
        }
    }
    Ok(true)
}

pub fn at_or_now(at: Option<&str>) -> AppResult<DateTime<Utc>> {
    Ok(parse_optional_timestamp(at)?.unwrap_or_else(now))
}
