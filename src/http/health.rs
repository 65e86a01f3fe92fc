use crate::http::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

const READY_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn live(State(state): State<AppState>) -> Json<serde_json::Value> {
    let shutting_down = state.is_shutting_down();
    Json(json!({
        "status": if shutting_down { "shutting_down" } else { "ok" },
        "uptimeSecs": state.started_at.elapsed().as_secs(),
        "shuttingDown": shutting_down,
    }))
}

async fn database_ready(state: &AppState) -> bool {
    let check = state.db.run(|conn| {
        let one: i64 = conn.raw().query_row("SELECT 1", [], |r| r.get(0))?;
        Ok(one == 1)
    });
    match timeout(READY_TIMEOUT, check).await {
        Ok(Ok(ok)) => ok,
        Ok(Err(e)) => {
            warn!(error = %e, "readiness check failed");
            false
        }
        Err(_) => {
            warn!("readiness check timed out");
            false
        }
    }
}

pub async fn ready(State(state): State<AppState>) -> Response {
    let shutting_down = state.is_shutting_down();
    let db_ok = !shutting_down && database_ready(&state).await;
    let status = if db_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let counts = state.hub.counts();
    (
        status,
        Json(json!({
            "status": if db_ok { "ok" } else { "unavailable" },
            "uptimeSecs": state.started_at.elapsed().as_secs(),
            "shuttingDown": shutting_down,
            "database": if db_ok { "ok" } else { "error" },
            "realtimeConnections": counts.connections,
        })),
    )
        .into_response()
}
