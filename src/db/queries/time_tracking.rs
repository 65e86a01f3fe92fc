use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::time_record::{RecordKind, RecordSource, TimeRecord};
use crate::utils::time::now_str;
use rusqlite::{ToSql, params, params_from_iter};

fn select() -> String {
    format!("SELECT {} FROM time_tracking", TimeRecord::COLUMNS)
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<TimeRecord>> {
    conn.query_opt(
        &format!("{} WHERE id = ?1", select()),
        [id],
        TimeRecord::from_row,
    )
}

pub fn find_by_key(conn: &TrackedConn, key: &str) -> AppResult<Option<TimeRecord>> {
    conn.query_opt(
        &format!("{} WHERE idempotency_key = ?1", select()),
        [key],
        TimeRecord::from_row,
    )
}

/// Latest unfinished record of the given kind for a user.
pub fn find_open(
    conn: &TrackedConn,
    user_id: i64,
    kind: RecordKind,
) -> AppResult<Option<TimeRecord>> {
    conn.query_opt(
        &format!(
            "{} WHERE user_id = ?1 AND kind = ?2 AND finished = 0
             ORDER BY start_time DESC, id DESC LIMIT 1",
            select()
        ),
        params![user_id, kind.to_db_str()],
        TimeRecord::from_row,
    )
}

pub struct NewRecord<'a> {
    pub user_id: i64,
    pub task_id: Option<i64>,
    pub kind: RecordKind,
    pub start_time: &'a str,
    pub idempotency_key: Option<&'a str>,
    pub source: RecordSource,
}

pub fn insert(conn: &TrackedConn, rec: &NewRecord<'_>) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO time_tracking
            (user_id, task_id, kind, start_time, finished, idempotency_key, source, created_at)
         VALUES (?1, ?2, ?3, ?4, 0, ?5, ?6, ?7)",
        params![
            rec.user_id,
            rec.task_id,
            rec.kind.to_db_str(),
            rec.start_time,
            rec.idempotency_key,
            rec.source.to_db_str(),
            now_str()
        ],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

/// Close an open record. The `finished = 0` guard makes a second closure a
/// no-op; returns whether this call closed it.
pub fn close(
    conn: &TrackedConn,
    id: i64,
    end_time: &str,
    duration_minutes: i64,
    note: Option<&str>,
) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE time_tracking
         SET end_time = ?1, duration_minutes = ?2, finished = 1, note = COALESCE(?3, note)
         WHERE id = ?4 AND finished = 0",
        params![end_time, duration_minutes, note, id],
    )?;
    Ok(out.changes > 0)
}

#[derive(Debug, Clone, Default)]
pub struct RecordFilter {
    pub user_id: Option<i64>,
    pub kind: Option<RecordKind>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub open_only: bool,
    pub limit: Option<i64>,
}

pub fn list(conn: &TrackedConn, f: &RecordFilter) -> AppResult<Vec<TimeRecord>> {
    let mut sql = select();
    let mut conditions: Vec<&str> = Vec::new();
    let mut values: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(uid) = f.user_id {
        conditions.push("user_id = ?");
        values.push(Box::new(uid));
    }
    if let Some(kind) = f.kind {
        conditions.push("kind = ?");
        values.push(Box::new(kind.to_db_str()));
    }
    if let Some(from) = &f.from {
        conditions.push("start_time >= ?");
        values.push(Box::new(from.clone()));
    }
    if let Some(to) = &f.to {
        conditions.push("start_time < ?");
        values.push(Box::new(to.clone()));
    }
    if f.open_only {
        conditions.push("finished = 0");
    }

    if !conditions.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&conditions.join(" AND "));
    }
    sql.push_str(" ORDER BY start_time DESC, id DESC");
    if let Some(limit) = f.limit {
        sql.push_str(" LIMIT ?");
        values.push(Box::new(limit));
    }

    conn.query_all(
        &sql,
        params_from_iter(values.iter().map(|v| v.as_ref())),
        TimeRecord::from_row,
    )
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM time_tracking WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
