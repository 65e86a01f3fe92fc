use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::open_connection;
use crate::db::stats;
use crate::errors::{AppError, AppResult};
use crate::utils::colors::{CYAN, GREEN, RED, RESET};
use rusqlite::Connection;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let Commands::Db {
        migrate,
        check,
        vacuum,
        info,
    } = cmd
    else {
        return Ok(());
    };

    if !(*migrate || *check || *vacuum || *info) {
        return Err(AppError::validation(
            "nothing to do: use --migrate, --check, --vacuum or --info",
        ));
    }

    // Opened on first use, shared by every step.
    let mut conn: Option<Connection> = None;
    fn get_conn<'a>(conn: &'a mut Option<Connection>, db_path: &str) -> AppResult<&'a Connection> {
        if conn.is_none() {
            *conn = Some(open_connection(db_path)?);
        }
        conn.as_ref()
            .ok_or_else(|| AppError::Other("connection not open".into()))
    }

    //
    // 1) MIGRATE
    //
    if *migrate {
        let conn = get_conn(&mut conn, &cfg.database)?;
        println!("{}▶ Running migrations…{}", CYAN, RESET);
        let applied = run_pending_migrations(conn)?;
        println!(
            "{}✔ Migration completed ({} applied).{}\n",
            GREEN,
            applied.len(),
            RESET
        );
    }

    //
    // 2) INFO
    //
    if *info {
        let conn = get_conn(&mut conn, &cfg.database)?;
        stats::print_db_info(conn, &cfg.database)?;
    }

    //
    // 3) CHECK
    //
    if *check {
        let conn = get_conn(&mut conn, &cfg.database)?;
        println!("{}▶ Running integrity check…{}", CYAN, RESET);

        let integrity: String = conn.query_row("PRAGMA integrity_check;", [], |row| row.get(0))?;
        if integrity == "ok" {
            println!("{}✔ Integrity check passed.{}\n", GREEN, RESET);
        } else {
            println!("{}✘ Integrity check failed:{} {}\n", RED, RESET, integrity);
            return Err(AppError::Other(format!("integrity check failed: {integrity}")));
        }
    }

    //
    // 4) VACUUM
    //
    if *vacuum {
        let conn = get_conn(&mut conn, &cfg.database)?;
        println!("{}▶ Running VACUUM…{}", CYAN, RESET);
        conn.execute_batch("VACUUM;")?;
        println!("{}✔ Vacuum completed.{}\n", GREEN, RESET);
    }

    Ok(())
}
