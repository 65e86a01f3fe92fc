use crate::db::{ExecResult, TrackedConn};
use crate::errors::AppResult;
use crate::models::item::{Item, NewItem};
use crate::utils::time::now_str;
use rusqlite::params;

const SELECT: &str = "SELECT id, project_id, task_id, name, quantity, unit, created_at FROM items";

const INSERT: &str = "INSERT INTO items (project_id, task_id, name, quantity, unit, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)";

pub fn list(conn: &TrackedConn, project_id: Option<i64>) -> AppResult<Vec<Item>> {
    match project_id {
        Some(pid) => conn.query_all(
            &format!("{SELECT} WHERE project_id = ?1 ORDER BY id ASC"),
            [pid],
            Item::from_row,
        ),
        None => conn.query_all(&format!("{SELECT} ORDER BY id ASC"), [], Item::from_row),
    }
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<Item>> {
    conn.query_opt(&format!("{SELECT} WHERE id = ?1"), [id], Item::from_row)
}

pub fn insert(conn: &TrackedConn, item: &NewItem) -> AppResult<i64> {
    let out = conn.execute(
        INSERT,
        params![
            item.project_id,
            item.task_id,
            item.name,
            item.quantity,
            item.unit,
            now_str()
        ],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

/// Insert several items with one prepared statement. Returns the new ids in
/// input order. Meant to run inside a transaction.
pub fn insert_many(conn: &TrackedConn, items: &[NewItem]) -> AppResult<Vec<i64>> {
    let created_at = now_str();
    let result = conn.execute_many(
        INSERT,
        items.iter().map(|item| {
            (
                item.project_id,
                item.task_id,
                item.name.as_str(),
                item.quantity,
                item.unit.as_str(),
                created_at.as_str(),
            )
        }),
    )?;
    Ok(ids_of(&result))
}

fn ids_of(result: &ExecResult) -> Vec<i64> {
    result
        .outcomes()
        .into_iter()
        .filter_map(|o| o.last_insert_id)
        .collect()
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
