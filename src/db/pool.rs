//! SQLite connection pool.
//!
//! Connections come from an `r2d2` pool whose manager applies the pragmas
//! every connection relies on. Work runs on the blocking thread pool; a
//! semaphore sized like the pool caps how many blocking calls wait at once.

use crate::errors::{AppError, AppResult};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const CHECKOUT_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON;
     PRAGMA journal_mode = WAL;
     PRAGMA synchronous = NORMAL;";

pub type PooledConn = r2d2::PooledConnection<SqliteConnectionManager>;

fn init_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(CONNECTION_PRAGMAS)
}

/// Open a standalone connection with the same pragmas as pooled ones.
///
/// Used by maintenance commands that run outside the async runtime.
pub fn open_connection(path: &str) -> AppResult<Connection> {
    let mut conn = Connection::open(Path::new(path))?;
    init_connection(&mut conn)?;
    Ok(conn)
}

pub struct DbPool {
    path: String,
    size: usize,
    pool: Mutex<Option<r2d2::Pool<SqliteConnectionManager>>>,
    permits: Arc<Semaphore>,
}

impl DbPool {
    pub fn open(path: &str, size: usize) -> AppResult<Arc<Self>> {
        if size == 0 {
            return Err(AppError::Config("pool size must be at least 1".into()));
        }

        let manager = SqliteConnectionManager::file(path).with_init(init_connection);
        let pool = r2d2::Pool::builder()
            .max_size(size as u32)
            .connection_timeout(CHECKOUT_TIMEOUT)
            .build(manager)?;

        Ok(Arc::new(Self {
            path: path.to_string(),
            size,
            pool: Mutex::new(Some(pool)),
            permits: Arc::new(Semaphore::new(size)),
        }))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn idle_count(&self) -> usize {
        self.handle()
            .map(|p| p.state().idle_connections as usize)
            .unwrap_or(0)
    }

    fn handle(&self) -> AppResult<r2d2::Pool<SqliteConnectionManager>> {
        self.pool
            .lock()
            .map_err(|_| AppError::PoolClosed)?
            .clone()
            .ok_or(AppError::PoolClosed)
    }

    /// Run `f` with a pooled connection on the blocking thread pool.
    pub async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(PooledConn) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::PoolClosed)?;
        let pool = self.handle()?;

        tokio::task::spawn_blocking(move || f(pool.get()?))
            .await
            .map_err(|e| AppError::Other(format!("database task failed: {e}")))?
    }

    /// Refuse new work and release idle connections. Connections still
    /// checked out are closed when their task finishes.
    pub fn close(&self) {
        self.permits.close();
        if let Ok(mut pool) = self.pool.lock() {
            pool.take();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }
}
