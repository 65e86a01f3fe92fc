use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::project::{Project, ProjectStatus};
use crate::utils::time::now_str;
use rusqlite::params;

const SELECT: &str =
    "SELECT id, customer_id, code, name, status, description, created_at FROM projects";

pub fn list(conn: &TrackedConn, customer_id: Option<i64>) -> AppResult<Vec<Project>> {
    match customer_id {
        Some(cid) => conn.query_all(
            &format!("{SELECT} WHERE customer_id = ?1 ORDER BY code ASC"),
            [cid],
            Project::from_row,
        ),
        None => conn.query_all(&format!("{SELECT} ORDER BY code ASC"), [], Project::from_row),
    }
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<Project>> {
    conn.query_opt(&format!("{SELECT} WHERE id = ?1"), [id], Project::from_row)
}

pub fn insert(
    conn: &TrackedConn,
    customer_id: i64,
    code: &str,
    name: &str,
    status: ProjectStatus,
    description: &str,
) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO projects (customer_id, code, name, status, description, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            customer_id,
            code,
            name,
            status.to_db_str(),
            description,
            now_str()
        ],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

pub fn update(conn: &TrackedConn, p: &Project) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE projects
         SET customer_id = ?1, code = ?2, name = ?3, status = ?4, description = ?5
         WHERE id = ?6",
        params![
            p.customer_id,
            p.code,
            p.name,
            p.status.to_db_str(),
            p.description,
            p.id
        ],
    )?;
    Ok(out.changes > 0)
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM projects WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
