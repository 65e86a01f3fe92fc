pub mod log;
pub mod migrate;
pub mod pool;
pub mod queries;
pub mod schema;
pub mod stats;
pub mod tracked;

pub use pool::DbPool;
pub use tracked::{ExecOutcome, ExecResult, TrackedConn, TrackedDb, TrackedTx};
