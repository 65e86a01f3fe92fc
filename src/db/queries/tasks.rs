use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::task::{Task, TaskStatus};
use crate::utils::time::now_str;
use rusqlite::params;

const SELECT: &str = "SELECT id, project_id, title, category, status, assignee_id, external_key, \
     created_at FROM tasks";

pub fn list_by_project(conn: &TrackedConn, project_id: i64) -> AppResult<Vec<Task>> {
    conn.query_all(
        &format!("{SELECT} WHERE project_id = ?1 ORDER BY id ASC"),
        [project_id],
        Task::from_row,
    )
}

/// Tasks assigned to a user that are not done yet.
pub fn list_open_for_user(conn: &TrackedConn, user_id: i64) -> AppResult<Vec<Task>> {
    conn.query_all(
        &format!("{SELECT} WHERE assignee_id = ?1 AND status <> 'done' ORDER BY id ASC"),
        [user_id],
        Task::from_row,
    )
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<Task>> {
    conn.query_opt(&format!("{SELECT} WHERE id = ?1"), [id], Task::from_row)
}

pub fn insert(
    conn: &TrackedConn,
    project_id: i64,
    title: &str,
    category: &str,
    status: TaskStatus,
    assignee_id: Option<i64>,
    external_key: Option<&str>,
) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO tasks (project_id, title, category, status, assignee_id, external_key, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            project_id,
            title,
            category,
            status.to_db_str(),
            assignee_id,
            external_key,
            now_str()
        ],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

pub fn update(conn: &TrackedConn, t: &Task) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE tasks
         SET title = ?1, category = ?2, status = ?3, assignee_id = ?4, external_key = ?5
         WHERE id = ?6",
        params![
            t.title,
            t.category,
            t.status.to_db_str(),
            t.assignee_id,
            t.external_key,
            t.id
        ],
    )?;
    Ok(out.changes > 0)
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM tasks WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
