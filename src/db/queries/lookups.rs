use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::lookup::{Lookup, NewLookup};
use rusqlite::params;

const SELECT: &str = "SELECT id, category, code, label, sort_order FROM lookups";

pub fn list(conn: &TrackedConn, category: Option<&str>) -> AppResult<Vec<Lookup>> {
    match category {
        Some(cat) => conn.query_all(
            &format!("{SELECT} WHERE category = ?1 ORDER BY sort_order ASC, code ASC"),
            [cat],
            Lookup::from_row,
        ),
        None => conn.query_all(
            &format!("{SELECT} ORDER BY category ASC, sort_order ASC, code ASC"),
            [],
            Lookup::from_row,
        ),
    }
}

pub fn insert(conn: &TrackedConn, l: &NewLookup) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO lookups (category, code, label, sort_order) VALUES (?1, ?2, ?3, ?4)",
        params![l.category, l.code, l.label, l.sort_order],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}
