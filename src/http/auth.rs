use crate::auth::AuthUser;
use crate::auth::password::{Verification, hash_password, verify_password};
use crate::db::log::ttlog_quiet;
use crate::db::queries::users;
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, required};
use crate::http::state::AppState;
use axum::Json;
use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub login: Option<String>,
    pub password: Option<String>,
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<LoginRequest>,
) -> AppResult<Json<Value>> {
    let login = required("login", body.login.as_deref())?;
    let password = body.password.unwrap_or_default();
    let rejected = || AppError::Unauthorized("invalid credentials".to_string());

    // Verification hashes on the blocking pool together with the lookup.
    let user = state
        .db
        .run(move |conn| {
            let (user, stored) = users::find_credentials(conn, &login)?.ok_or_else(rejected)?;
            if !user.active {
                return Err(rejected());
            }

            match verify_password(&password, &stored) {
                Verification::Invalid => return Err(rejected()),
                Verification::Valid => {}
                Verification::ValidLegacy => {
                    // Login succeeds even if the upgrade cannot be written.
                    if let Err(e) =
                        users::set_password_hash(conn, user.id, &hash_password(&password))
                    {
                        warn!(user = %user.login, error = %e, "legacy password upgrade failed");
                    } else {
                        info!(user = %user.login, "legacy password upgraded");
                    }
                }
            }
            ttlog_quiet(conn.raw(), "login", &user.login, "login ok");
            Ok(user)
        })
        .await?;

    let now = Utc::now().timestamp();
    let token = state.signer.issue(user.id, user.role, &user.login, now)?;

    Ok(Json(json!({
        "token": token,
        "expiresAt": now + state.signer.ttl_secs(),
        "user": user,
    })))
}

pub async fn me(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Value>> {
    if auth.anonymous {
        return Ok(Json(json!({
            "id": auth.user_id,
            "login": auth.login,
            "role": auth.role,
            "anonymous": true,
        })));
    }
    let id = auth.user_id;
    let user = state
        .db
        .run(move |conn| users::get(conn, id))
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    Ok(Json(json!(user)))
}
