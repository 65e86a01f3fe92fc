use crate::db::TrackedConn;
use crate::errors::AppResult;
use crate::models::customer::Customer;
use crate::utils::time::now_str;
use rusqlite::params;

const SELECT: &str = "SELECT id, name, contact, email, phone, created_at FROM customers";

pub fn list(conn: &TrackedConn) -> AppResult<Vec<Customer>> {
    conn.query_all(&format!("{SELECT} ORDER BY name ASC"), [], Customer::from_row)
}

pub fn get(conn: &TrackedConn, id: i64) -> AppResult<Option<Customer>> {
    conn.query_opt(&format!("{SELECT} WHERE id = ?1"), [id], Customer::from_row)
}

pub fn insert(
    conn: &TrackedConn,
    name: &str,
    contact: &str,
    email: &str,
    phone: &str,
) -> AppResult<i64> {
    let out = conn.execute(
        "INSERT INTO customers (name, contact, email, phone, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![name, contact, email, phone, now_str()],
    )?;
    Ok(out.last_insert_id.unwrap_or_default())
}

pub fn update(conn: &TrackedConn, c: &Customer) -> AppResult<bool> {
    let out = conn.execute(
        "UPDATE customers SET name = ?1, contact = ?2, email = ?3, phone = ?4 WHERE id = ?5",
        params![c.name, c.contact, c.email, c.phone, c.id],
    )?;
    Ok(out.changes > 0)
}

pub fn delete(conn: &TrackedConn, id: i64) -> AppResult<bool> {
    let out = conn.execute("DELETE FROM customers WHERE id = ?1", [id])?;
    Ok(out.changes > 0)
}
