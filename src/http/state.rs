use crate::auth::token::TokenSigner;
use crate::config::Config;
use crate::db::schema::{Capabilities, MissingTableWarner};
use crate::db::{DbPool, TrackedDb};
use crate::errors::AppResult;
use crate::notify::ChangeBus;
use crate::realtime::hub::RealtimeHub;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;
use tracing::info;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<TrackedDb>,
    pub bus: Arc<ChangeBus>,
    pub hub: Arc<RealtimeHub>,
    pub signer: Arc<TokenSigner>,
    pub caps: Capabilities,
    pub warner: Arc<MissingTableWarner>,
    pub started_at: Instant,
    pub shutting_down: Arc<AtomicBool>,
}

impl AppState {
    /// Wire bus, hub and tracked executor around an opened pool. Must run
    /// inside a tokio runtime (the bus spawns its debounce task).
    pub async fn build(config: Config, pool: Arc<DbPool>) -> AppResult<Self> {
        let caps = pool.run(|conn| Capabilities::detect(&conn)).await?;
        info!(
            lookups = caps.lookups,
            task_data = caps.task_data,
            "schema capabilities detected"
        );

        let bus = ChangeBus::spawn(config.debounce_window());
        let hub = Arc::new(RealtimeHub::default());
        bus.subscribe(hub.clone());

        let db = Arc::new(TrackedDb::new(pool, bus.clone()));
        let signer = Arc::new(TokenSigner::new(&config.token_secret, config.token_ttl_secs));

        Ok(Self {
            config: Arc::new(config),
            db,
            bus,
            hub,
            signer,
            caps,
            warner: Arc::new(MissingTableWarner::default()),
            started_at: Instant::now(),
            shutting_down: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn auth_enabled(&self) -> bool {
        self.config.auth_enabled
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }
}
