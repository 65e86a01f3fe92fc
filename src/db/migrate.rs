use crate::errors::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension, params};

/// Ensure that the `log` table exists; migrations record themselves there.
fn ensure_log_table(conn: &Connection) -> AppResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

pub struct Migration {
    pub version: &'static str,
    pub description: &'static str,
    pub sql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "20250301_0001_core_tables",
        description: "Create users, customers, projects and tasks",
        sql: r#"
        CREATE TABLE IF NOT EXISTS users (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            login         TEXT NOT NULL UNIQUE,
            name          TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            role          INTEGER NOT NULL DEFAULT 3 CHECK(role IN (1,2,3)),
            active        INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS customers (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            name       TEXT NOT NULL UNIQUE,
            contact    TEXT NOT NULL DEFAULT '',
            email      TEXT NOT NULL DEFAULT '',
            phone      TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS projects (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id INTEGER NOT NULL REFERENCES customers(id),
            code        TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            status      TEXT NOT NULL DEFAULT 'planned' CHECK(status IN ('planned','active','closed')),
            description TEXT NOT NULL DEFAULT '',
            created_at  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_projects_customer ON projects(customer_id);

        CREATE TABLE IF NOT EXISTS tasks (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id   INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            title        TEXT NOT NULL,
            category     TEXT NOT NULL DEFAULT '',
            status       TEXT NOT NULL DEFAULT 'open' CHECK(status IN ('open','in_progress','done')),
            assignee_id  INTEGER REFERENCES users(id) ON DELETE SET NULL,
            external_key TEXT UNIQUE,
            created_at   TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_project ON tasks(project_id);
        CREATE INDEX IF NOT EXISTS idx_tasks_assignee ON tasks(assignee_id);
        "#,
    },
    Migration {
        version: "20250301_0002_items",
        description: "Create items",
        sql: r#"
        CREATE TABLE IF NOT EXISTS items (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id INTEGER NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
            task_id    INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            name       TEXT NOT NULL,
            quantity   REAL NOT NULL DEFAULT 1,
            unit       TEXT NOT NULL DEFAULT 'pcs',
            created_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_items_project ON items(project_id);
        "#,
    },
    Migration {
        version: "20250301_0003_time_tracking",
        description: "Create time_tracking",
        sql: r#"
        CREATE TABLE IF NOT EXISTS time_tracking (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id          INTEGER NOT NULL REFERENCES users(id),
            task_id          INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            kind             TEXT NOT NULL CHECK(kind IN ('shift','task')),
            start_time       TEXT NOT NULL,
            end_time         TEXT,
            duration_minutes INTEGER,
            finished         INTEGER NOT NULL DEFAULT 0,
            note             TEXT NOT NULL DEFAULT '',
            idempotency_key  TEXT UNIQUE,
            source           TEXT NOT NULL DEFAULT 'web' CHECK(source IN ('web','desktop','offline')),
            created_at       TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_tt_user_open ON time_tracking(user_id, kind, finished);
        CREATE INDEX IF NOT EXISTS idx_tt_start ON time_tracking(start_time);
        "#,
    },
    Migration {
        version: "20250315_0004_lookups",
        description: "Create optional lookups table",
        sql: r#"
        CREATE TABLE IF NOT EXISTS lookups (
            id         INTEGER PRIMARY KEY AUTOINCREMENT,
            category   TEXT NOT NULL,
            code       TEXT NOT NULL,
            label      TEXT NOT NULL,
            sort_order INTEGER NOT NULL DEFAULT 0,
            UNIQUE(category, code)
        );
        "#,
    },
    Migration {
        version: "20250315_0005_task_data",
        description: "Create optional task_data table",
        sql: r#"
        CREATE TABLE IF NOT EXISTS task_data (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            time_tracking_id INTEGER NOT NULL REFERENCES time_tracking(id) ON DELETE CASCADE,
            task_id          INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
            key              TEXT NOT NULL,
            value            TEXT NOT NULL DEFAULT '',
            UNIQUE(time_tracking_id, key)
        );
        "#,
    },
    Migration {
        version: "20250401_0006_one_open_record",
        description: "At most one open shift and one open activity per user",
        sql: r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_tt_one_open
            ON time_tracking(user_id, kind) WHERE finished = 0;
        "#,
    },
];

fn is_applied(conn: &Connection, version: &str) -> AppResult<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

fn apply(conn: &Connection, m: &Migration) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(m.sql)
        .map_err(|e| AppError::Migration(format!("{}: {}", m.version, e)))?;

    tx.execute(
        "INSERT INTO log (date, operation, target, message)
         VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
        params![m.version, m.description],
    )?;

    tx.commit()?;
    Ok(())
}

/// Run every migration not yet recorded in `log`.
/// Returns the versions applied by this call.
pub fn run_pending_migrations(conn: &Connection) -> AppResult<Vec<&'static str>> {
    ensure_log_table(conn)?;

    let mut applied = Vec::new();
    for m in MIGRATIONS {
        if is_applied(conn, m.version)? {
            continue;
        }
        apply(conn, m)?;
        tracing::info!(version = m.version, "migration applied");
        applied.push(m.version);
    }

    Ok(applied)
}
