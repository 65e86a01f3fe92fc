//! Mutation-tracking executor.
//!
//! Every statement the application issues goes through `TrackedConn`. An
//! effective mutation (allow-listed leading keyword, at least one row
//! affected or created) raises a notification: immediately outside a
//! transaction, once at commit inside one, never on rollback.

use crate::db::pool::{DbPool, PooledConn};
use crate::errors::AppResult;
use crate::notify::Notifier;
use crate::notify::classify;
use rusqlite::{Connection, OptionalExtension, Params, Row};
use std::cell::RefCell;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecOutcome {
    pub changes: usize,
    pub last_insert_id: Option<i64>,
}

impl ExecOutcome {
    pub fn is_effective(&self) -> bool {
        self.changes > 0 || self.last_insert_id.is_some_and(|id| id > 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecResult {
    Single(ExecOutcome),
    Batch(Vec<ExecResult>),
}

impl ExecResult {
    pub fn is_effective(&self) -> bool {
        match self {
            ExecResult::Single(o) => o.is_effective(),
            ExecResult::Batch(items) => items.iter().any(ExecResult::is_effective),
        }
    }

    /// Flattened outcomes in execution order.
    pub fn outcomes(&self) -> Vec<ExecOutcome> {
        match self {
            ExecResult::Single(o) => vec![*o],
            ExecResult::Batch(items) => items.iter().flat_map(ExecResult::outcomes).collect(),
        }
    }
}

/// Transaction-local change state.
#[derive(Debug, Default)]
struct TxState {
    dirty: bool,
    reason: Option<String>,
}

pub struct TrackedDb {
    pool: Arc<DbPool>,
    notifier: Arc<dyn Notifier>,
}

impl TrackedDb {
    pub fn new(pool: Arc<DbPool>, notifier: Arc<dyn Notifier>) -> Self {
        Self { pool, notifier }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    /// Run `f` on a pooled connection off the async runtime. Effective
    /// mutations notify as each statement completes.
    pub async fn run<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&TrackedConn) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let notifier = Arc::clone(&self.notifier);
        self.pool
            .run(move |conn| f(&TrackedConn::new(conn, notifier)))
            .await
    }

    /// Run `f` inside `BEGIN IMMEDIATE`. `Ok` commits (one notification if
    /// anything effective happened), `Err` rolls back silently.
    pub async fn transaction<T, F>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&TrackedTx) -> AppResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let notifier = Arc::clone(&self.notifier);
        self.pool
            .run(move |conn| {
                let tx = TrackedConn::new(conn, notifier).begin()?;
                let out = f(&tx)?;
                tx.commit()?;
                Ok(out)
            })
            .await
    }
}

pub struct TrackedConn {
    conn: PooledConn,
    notifier: Arc<dyn Notifier>,
    tx: RefCell<Option<TxState>>,
}

impl TrackedConn {
    pub fn new(conn: PooledConn, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            conn,
            notifier,
            tx: RefCell::new(None),
        }
    }

    /// Underlying connection, for statements that must not be tracked
    /// (introspection, audit rows).
    pub fn raw(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn execute<P: Params>(&self, sql: &str, params: P) -> AppResult<ExecOutcome> {
        let changes = self.conn.prepare_cached(sql)?.execute(params)?;
        let outcome = self.outcome_for(sql, changes);
        self.record(sql, &ExecResult::Single(outcome));
        Ok(outcome)
    }

    /// Run one statement once per parameter set; reported as a batch.
    pub fn execute_many<P, I>(&self, sql: &str, rows: I) -> AppResult<ExecResult>
    where
        P: Params,
        I: IntoIterator<Item = P>,
    {
        let mut results = Vec::new();
        {
            let mut stmt = self.conn.prepare_cached(sql)?;
            for params in rows {
                let changes = stmt.execute(params)?;
                results.push(ExecResult::Single(self.outcome_for(sql, changes)));
            }
        }
        let result = ExecResult::Batch(results);
        self.record(sql, &result);
        Ok(result)
    }

    pub fn query_all<T, P, F>(&self, sql: &str, params: P, f: F) -> AppResult<Vec<T>>
    where
        P: Params,
        F: FnMut(&Row<'_>) -> rusqlite::Result<T>,
    {
        let rows = {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let rows = stmt
                .query_map(params, f)?
                .collect::<rusqlite::Result<Vec<T>>>()?;
            rows
        };
        self.record_query(sql);
        Ok(rows)
    }

    pub fn query_opt<T, P, F>(&self, sql: &str, params: P, f: F) -> AppResult<Option<T>>
    where
        P: Params,
        F: FnOnce(&Row<'_>) -> rusqlite::Result<T>,
    {
        let row = {
            let mut stmt = self.conn.prepare_cached(sql)?;
            let row = stmt.query_row(params, f).optional()?;
            row
        };
        self.record_query(sql);
        Ok(row)
    }

    pub fn begin(self) -> AppResult<TrackedTx> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        *self.tx.borrow_mut() = Some(TxState::default());
        Ok(TrackedTx {
            inner: Some(self),
        })
    }

    fn outcome_for(&self, sql: &str, changes: usize) -> ExecOutcome {
        // Schema statements leave the previous statement's count behind.
        let changes = if classify::reports_row_changes(sql) {
            changes
        } else {
            0
        };
        let inserts = matches!(
            classify::leading_keyword(sql).as_deref(),
            Some("INSERT") | Some("REPLACE")
        );
        ExecOutcome {
            changes,
            last_insert_id: (inserts && changes > 0).then(|| self.conn.last_insert_rowid()),
        }
    }

    // Statements like `INSERT ... RETURNING` arrive through the query path.
    fn record_query(&self, sql: &str) {
        if classify::is_mutation(sql) {
            let changes = self.conn.changes() as usize;
            let outcome = self.outcome_for(sql, changes);
            self.record(sql, &ExecResult::Single(outcome));
        }
    }

    fn record(&self, sql: &str, result: &ExecResult) {
        if !classify::is_mutation(sql) || !result.is_effective() {
            return;
        }
        let reason = classify::describe(sql);
        match self.tx.borrow_mut().as_mut() {
            Some(state) => {
                state.dirty = true;
                state.reason = Some(reason);
            }
            None => self.notifier.notify(&reason),
        }
    }
}

/// Open transaction on a dedicated connection.
///
/// Dropping it without `commit` rolls back.
pub struct TrackedTx {
    inner: Option<TrackedConn>,
}

impl std::ops::Deref for TrackedTx {
    type Target = TrackedConn;

    fn deref(&self) -> &TrackedConn {
        self.inner.as_ref().expect("transaction still open")
    }
}

impl TrackedTx {
    /// Commit and, if anything effective happened, raise exactly one
    /// notification. Returns the connection outside of a transaction.
    pub fn commit(mut self) -> AppResult<TrackedConn> {
        let conn = self.inner.take().expect("transaction still open");
        if let Err(e) = conn.conn.execute_batch("COMMIT") {
            // Leave the connection usable for the pool.
            let _ = conn.conn.execute_batch("ROLLBACK");
            conn.tx.borrow_mut().take();
            return Err(e.into());
        }
        let state = conn.tx.borrow_mut().take().unwrap_or_default();
        if state.dirty {
            let reason = state.reason.unwrap_or_else(|| "commit".to_string());
            conn.notifier.notify(&reason);
        }
        Ok(conn)
    }

    /// Roll back and discard any pending notification.
    pub fn rollback(mut self) -> AppResult<TrackedConn> {
        let conn = self.inner.take().expect("transaction still open");
        conn.tx.borrow_mut().take();
        conn.conn.execute_batch("ROLLBACK")?;
        Ok(conn)
    }
}

impl Drop for TrackedTx {
    fn drop(&mut self) {
        if let Some(conn) = self.inner.take() {
            conn.tx.borrow_mut().take();
            if let Err(e) = conn.conn.execute_batch("ROLLBACK") {
                warn!(error = %e, "rollback of abandoned transaction failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate::run_pending_migrations;
    use crate::errors::AppError;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorded(Mutex<Vec<String>>);

    impl Notifier for Recorded {
        fn notify(&self, reason: &str) {
            self.0.lock().unwrap().push(reason.to_string());
        }
    }

    impl Recorded {
        fn take(&self) -> Vec<String> {
            std::mem::take(&mut *self.0.lock().unwrap())
        }
    }

    async fn setup() -> (TempDir, TrackedDb, Arc<Recorded>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracked.sqlite");
        let pool = DbPool::open(path.to_str().unwrap(), 2).unwrap();
        pool.run(|conn| run_pending_migrations(&conn)).await.unwrap();
        let rec = Arc::new(Recorded::default());
        let db = TrackedDb::new(pool, rec.clone());
        (dir, db, rec)
    }

    fn count_customers(conn: &TrackedConn) -> AppResult<Option<i64>> {
        conn.query_opt("SELECT COUNT(*) FROM customers", [], |r| r.get(0))
    }

    const INSERT_CUSTOMER: &str =
        "INSERT INTO customers (name, created_at) VALUES (?1, '2025-01-01T00:00:00Z')";

    #[tokio::test]
    async fn effective_mutation_notifies_immediately() {
        let (_dir, db, rec) = setup().await;
        let out = db
            .run(|conn| conn.execute(INSERT_CUSTOMER, ["ACME"]))
            .await
            .unwrap();
        assert_eq!(out.changes, 1);
        assert!(out.last_insert_id.is_some());
        assert_eq!(rec.take(), vec!["insert customers".to_string()]);
    }

    #[tokio::test]
    async fn zero_row_update_and_reads_do_not_notify() {
        let (_dir, db, rec) = setup().await;
        let (out, n) = db
            .run(|conn| {
                let out = conn.execute("UPDATE customers SET name = 'x' WHERE id = ?1", [999])?;
                let n: Vec<i64> =
                    conn.query_all("SELECT COUNT(*) FROM customers", [], |r| r.get(0))?;
                Ok((out, n))
            })
            .await
            .unwrap();
        assert_eq!(out.changes, 0);
        assert_eq!(out.last_insert_id, None);
        assert_eq!(n, vec![0]);
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn schema_statement_after_write_is_not_effective() {
        let (_dir, db, rec) = setup().await;
        let out = db
            .run(|conn| {
                conn.execute(INSERT_CUSTOMER, ["A"])?;
                conn.execute("CREATE TABLE IF NOT EXISTS scratch (x INTEGER)", [])
            })
            .await
            .unwrap();
        assert_eq!(out.changes, 0);
        assert!(!out.is_effective());
        assert_eq!(rec.take(), vec!["insert customers".to_string()]);
    }

    #[tokio::test]
    async fn committed_transaction_notifies_once() {
        let (_dir, db, rec) = setup().await;
        let rec_inside = rec.clone();
        let in_tx = db
            .transaction(move |tx| {
                tx.execute(INSERT_CUSTOMER, ["A"])?;
                tx.execute(INSERT_CUSTOMER, ["B"])?;
                tx.execute("UPDATE customers SET phone = '1' WHERE name = 'A'", [])?;
                assert!(rec_inside.take().is_empty(), "notified before commit");
                Ok(tx.in_transaction())
            })
            .await
            .unwrap();
        assert!(in_tx);
        assert_eq!(rec.take(), vec!["update customers".to_string()]);
    }

    #[tokio::test]
    async fn explicit_rollback_never_notifies() {
        let (_dir, db, rec) = setup().await;
        let notifier: Arc<dyn Notifier> = rec.clone();
        let n = db
            .pool()
            .run(move |pooled| {
                let tx = TrackedConn::new(pooled, notifier).begin()?;
                tx.execute(INSERT_CUSTOMER, ["A"])?;
                let conn = tx.rollback()?;
                assert!(!conn.in_transaction());
                count_customers(&conn)
            })
            .await
            .unwrap();
        assert_eq!(n, Some(0));
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn failed_transaction_rolls_back() {
        let (_dir, db, rec) = setup().await;
        let res: AppResult<()> = db
            .transaction(|tx| {
                tx.execute(INSERT_CUSTOMER, ["A"])?;
                Err(AppError::validation("stop"))
            })
            .await;
        assert!(matches!(res, Err(AppError::Validation(_))));

        let n = db.run(count_customers).await.unwrap();
        assert_eq!(n, Some(0));
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn commit_without_effective_mutation_is_silent() {
        let (_dir, db, rec) = setup().await;
        db.transaction(|tx| tx.execute("DELETE FROM customers WHERE id = ?1", [1]))
            .await
            .unwrap();
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn batch_is_effective_if_any_member_is() {
        let (_dir, db, rec) = setup().await;
        db.run(|conn| conn.execute(INSERT_CUSTOMER, ["A"]))
            .await
            .unwrap();
        rec.take();

        let res = db
            .run(|conn| {
                conn.execute_many(
                    "UPDATE customers SET phone = '2' WHERE name = ?1",
                    [["missing"], ["A"]],
                )
            })
            .await
            .unwrap();
        assert!(res.is_effective());
        assert_eq!(res.outcomes().len(), 2);
        assert_eq!(rec.take().len(), 1);

        let none = db
            .run(|conn| {
                conn.execute_many(
                    "UPDATE customers SET phone = '3' WHERE name = ?1",
                    [["x"], ["y"]],
                )
            })
            .await
            .unwrap();
        assert!(!none.is_effective());
        assert!(rec.take().is_empty());
    }

    #[tokio::test]
    async fn insert_returning_through_query_path_notifies() {
        let (_dir, db, rec) = setup().await;
        let id: Option<i64> = db
            .run(|conn| {
                conn.query_opt(
                    "INSERT INTO customers (name, created_at) VALUES ('R', 'now') RETURNING id",
                    [],
                    |r| r.get(0),
                )
            })
            .await
            .unwrap();
        assert!(id.is_some());
        assert_eq!(rec.take(), vec!["insert customers".to_string()]);
    }

    #[test]
    fn nested_batches_are_checked_recursively() {
        let none = ExecResult::Batch(vec![
            ExecResult::Single(ExecOutcome::default()),
            ExecResult::Batch(vec![ExecResult::Single(ExecOutcome::default())]),
        ]);
        assert!(!none.is_effective());

        let deep = ExecResult::Batch(vec![
            ExecResult::Single(ExecOutcome::default()),
            ExecResult::Batch(vec![ExecResult::Single(ExecOutcome {
                changes: 0,
                last_insert_id: Some(7),
            })]),
        ]);
        assert!(deep.is_effective());
    }
}
