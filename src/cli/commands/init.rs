use crate::cli::parser::Cli;
use crate::config::Config;
use crate::db::log;
use crate::db::migrate::run_pending_migrations;
use crate::db::pool::open_connection;
use crate::errors::AppResult;
use crate::ui::messages::{info, success, warning};

/// Handle the `init` command
///
/// This initializes:
///  - the config directory (if missing)
///  - the configuration file (skipped with `--test`)
///  - the SQLite database and all pending migrations
pub fn handle(cli: &Cli) -> AppResult<()> {
    let db_path = Config::init_all(cli.db.clone(), cli.test)?;
    let db_path = db_path.to_string_lossy().to_string();

    info("Initializing worktrack…");
    if !cli.test {
        info(format!("Config file : {}", Config::config_file().display()));
    }
    info(format!("Database    : {}", db_path));

    let conn = open_connection(&db_path)?;
    let applied = run_pending_migrations(&conn)?;
    if applied.is_empty() {
        info("Schema already up to date");
    } else {
        info(format!("Applied migrations: {}", applied.join(", ")));
    }

    if let Err(e) = log::ttlog(
        &conn,
        "init",
        "database",
        &format!("Database initialized at {}", db_path),
    ) {
        warning(format!("Failed to write internal log: {}", e));
    }

    success(format!("Database initialized at {}", db_path));
    Ok(())
}
