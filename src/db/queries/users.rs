use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::role::Role;
use crate::models::user::User;
use crate::utils::time::now_str;
use rusqlite::params;

pub fn list(conn: &TrackedConn) -> AppResult<Vec<User>> {
    conn.query_all(
        &format!("SELECT {} FROM users ORDER BY login ASC", User::COLUMNS),
        [],
        User::from_row,
    )
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<User>> {
    conn.query_opt(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        [id],
        User::from_row,
    )
}

pub fn exists(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    Ok(conn
        .query_opt("SELECT 1 FROM users WHERE id = ?1", [id], |_| Ok(()))?
        .is_some())
}

/// User plus stored password hash, for login.
pub fn find_credentials(conn: &TrackedConn, login: &str) -> AppResult<Option<(User, String)>> {
    conn.query_opt(
        &format!(
            "SELECT {}, password_hash FROM users WHERE login = ?1",
            User::COLUMNS
        ),
        [login],
        |row| Ok((User::from_row(row)?, row.get("password_hash")?)),
    )
}

pub fn insert(
    conn: &TrackedConn,
    login: &str,
    name: &str,
    password_hash: &str,
    role: Role,
) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO users (login, name, password_hash, role, active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![login, name, password_hash, role.to_db(), now_str()],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

pub fn update(
    conn: &TrackedConn,
    id: i64,
    name: &str,
    role: Role,
    active: bool,
) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE users SET name = ?1, role = ?2, active = ?3 WHERE id = ?4",
        params![name, role.to_db(), active as i64, id],
    )?;
    Ok(out.changes > 0)
}

pub fn set_password_hash(conn: &TrackedConn, id: i64, password_hash: &str) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE users SET password_hash = ?1 WHERE id = ?2",
        params![password_hash, id],
    )?;
    Ok(out.changes > 0)
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM users WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
