use crate::db::log::load_log;
use crate::errors::AppResult;
use crate::utils::time::format_minutes;
use crate::utils::colors::{CYAN, GREEN, RESET, YELLOW};
use rusqlite::{Connection, OptionalExtension};
use std::fs;

const COUNTED_TABLES: &[&str] = &[
    "users",
    "customers",
    "projects",
    "tasks",
    "items",
    "time_tracking",
    "lookups",
    "task_data",
];

const RECENT_LOG_LINES: usize = 5;

/// Row count per table; `None` when the table does not exist.
pub fn table_counts(conn: &Connection) -> AppResult<Vec<(&'static str, Option<i64>)>> {
    let mut out = Vec::new();
    for table in COUNTED_TABLES {
        let count = if crate::db::schema::table_exists(conn, table)? {
            Some(conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                row.get(0)
            })?)
        } else {
            None
        };
        out.push((*table, count));
    }
    Ok(out)
}

pub fn print_db_info(conn: &Connection, db_path: &str) -> AppResult<()> {
    println!();

    //
    // 1) FILE SIZE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path, RESET);
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) ROW COUNTS
    //
    for (table, count) in table_counts(conn)? {
        match count {
            Some(n) => println!("{}• {}:{} {}{}{}", CYAN, table, RESET, GREEN, n, RESET),
            None => println!("{}• {}:{} {}missing{}", CYAN, table, RESET, YELLOW, RESET),
        }
    }

    //
    // 3) OPEN RECORDS
    //
    if crate::db::schema::table_exists(conn, "time_tracking")? {
        let open: i64 = conn.query_row(
            "SELECT COUNT(*) FROM time_tracking WHERE finished = 0",
            [],
            |row| row.get(0),
        )?;
        let first: Option<String> = conn
            .query_row(
                "SELECT start_time FROM time_tracking ORDER BY start_time ASC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let tracked: i64 = conn.query_row(
            "SELECT COALESCE(SUM(duration_minutes), 0) FROM time_tracking WHERE finished = 1",
            [],
            |row| row.get(0),
        )?;
        println!("{}• Open records:{} {}", CYAN, RESET, open);
        println!("{}• Tracked time:{} {}", CYAN, RESET, format_minutes(tracked));
        if let Some(first) = first {
            println!("{}• First record:{} {}", CYAN, RESET, first);
        }
    }

    //
    // 4) RECENT OPERATIONS
    //
    let recent = load_log(conn, RECENT_LOG_LINES)?;
    if !recent.is_empty() {
        println!("{}• Recent operations:{}", CYAN, RESET);
        for row in recent {
            println!(
                "    {} {:<10} {:<12} {}",
                row.date, row.operation, row.target, row.message
            );
        }
    }

    println!();
    Ok(())
}
