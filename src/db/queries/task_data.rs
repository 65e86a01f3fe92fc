use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::time_record::{TaskDataRow, TaskDatum};

/// Store key/value rows for a record; an existing key is overwritten.
pub fn upsert_many(
    conn: &TrackedConn,
    time_tracking_id: i64,
    task_id: Option<i64>,
    data: &[TaskDatum],
) -> AppResult<usize> {
    if data.is_empty() {
        return Ok(0);
    }
    let result = conn.execute_many(
        "INSERT INTO task_data (time_tracking_id, task_id, key, value)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(time_tracking_id, key) DO UPDATE SET value = excluded.value",
        data.iter()
            .map(|d| (time_tracking_id, task_id, d.key.as_str(), d.value.as_str())),
    )?;
    Ok(result.outcomes().iter().map(|o| o.changes).sum())
}

pub fn list_for_record(conn: &TrackedConn, time_tracking_id: i64) -> AppResult<Vec<TaskDataRow>> {
    conn.query_all(
        "SELECT id, time_tracking_id, task_id, key, value
         FROM task_data WHERE time_tracking_id = ?1 ORDER BY key ASC",
        [time_tracking_id],
        TaskDataRow::from_row,
    )
}
