use crate::config::Config;
use crate::db::DbPool;
use crate::db::migrate::run_pending_migrations;
use crate::errors::AppResult;
use crate::http::{AppState, build_router};
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// WebSocket close code sent to desktop clients on shutdown ("going away").
pub const SHUTDOWN_CLOSE_CODE: u16 = 1001;

pub fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };
}

pub async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
            }
            _ => {
                warn!("unix signal handlers unavailable, falling back to ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Serve until `signal` resolves, then drain in-flight requests for at most
/// the configured grace window.
pub async fn serve_with_shutdown<F>(listener: TcpListener, state: AppState, signal: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = build_router(state.clone());
    let grace = state.config.shutdown_grace();
    let triggered = Arc::new(Notify::new());

    let on_signal = {
        let state = state.clone();
        let triggered = Arc::clone(&triggered);
        async move {
            signal.await;
            info!("shutdown requested, draining connections");
            state.begin_shutdown();
            state.hub.close_all(SHUTDOWN_CLOSE_CODE, "server shutdown");
            triggered.notify_one();
        }
    };

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(on_signal)
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        res = &mut server => res?,
        _ = async {
            triggered.notified().await;
            tokio::time::sleep(grace).await;
        } => {
            warn!(grace_ms = grace.as_millis() as u64, "grace window elapsed, forcing shutdown");
        }
    }
    Ok(())
}

pub async fn handle(cfg: &Config, bind: Option<String>) -> AppResult<()> {
    let mut cfg = cfg.clone();
    if let Some(bind) = bind {
        cfg.bind = bind;
    }
    init_tracing(cfg.log_json);

    let pool = DbPool::open(&cfg.database, cfg.pool_size)?;
    if cfg.migrate_on_start {
        let applied = pool.run(|conn| run_pending_migrations(&conn)).await?;
        if !applied.is_empty() {
            info!(count = applied.len(), "schema migrated");
        }
    }

    let state = AppState::build(cfg, Arc::clone(&pool)).await?;
    let listener = TcpListener::bind(&state.config.bind).await?;
    info!(
        addr = %listener.local_addr()?,
        database = %state.config.database,
        auth = state.config.auth_enabled,
        "worktrack listening"
    );

    let result = serve_with_shutdown(listener, state, wait_for_shutdown_signal()).await;
    pool.close();
    info!("database pool closed");
    result
}
