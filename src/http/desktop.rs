//! Facade used by the desktop client. Every write is idempotent under the
//! client's key so the offline queue can be replayed.

use crate::auth::AuthUser;
use crate::core::activity::{ActivityResult, Outcome, RecordRef, SyncAction, SyncItem, Tracker, at_or_now};
use crate::db::queries::{tasks, time_tracking as tt};
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, ApiQuery};
use crate::http::state::AppState;
use crate::models::task::Task;
use crate::models::time_record::{RecordKind, RecordSource, TaskDatum, TimeRecord};
use crate::utils::time::now_str;
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

const MAX_SYNC_ACTIONS: usize = 1000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DesktopStatus {
    pub user_id: i64,
    pub shift: Option<TimeRecord>,
    pub activity: Option<TimeRecord>,
    pub server_time: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockInRequest {
    pub user_id: Option<i64>,
    pub at: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClockOutRequest {
    pub user_id: Option<i64>,
    pub at: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub task_data: Vec<TaskDatum>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    pub user_id: Option<i64>,
    pub task_id: i64,
    pub at: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishRequest {
    pub user_id: Option<i64>,
    pub id: Option<i64>,
    pub key: Option<String>,
    pub at: Option<String>,
    pub note: Option<String>,
    #[serde(default)]
    pub task_data: Vec<TaskDatum>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub user_id: Option<i64>,
    pub actions: Vec<SyncAction>,
}

#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub results: Vec<SyncItem>,
}

fn respond(res: ActivityResult) -> (StatusCode, Json<ActivityResult>) {
    let status = match res.outcome {
        Outcome::Created => StatusCode::CREATED,
        _ => StatusCode::OK,
    };
    (status, Json(res))
}

pub async fn status(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> AppResult<Json<DesktopStatus>> {
    let user_id = auth.acting_user(q.user_id)?;
    let (shift, activity) = state
        .db
        .run(move |conn| {
            Ok((
                tt::find_open(conn, user_id, RecordKind::Shift)?,
                tt::find_open(conn, user_id, RecordKind::Task)?,
            ))
        })
        .await?;
    Ok(Json(DesktopStatus {
        user_id,
        shift,
        activity,
        server_time: now_str(),
    }))
}

pub async fn tasks(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(q): ApiQuery<UserQuery>,
) -> AppResult<Json<Vec<Task>>> {
    let user_id = auth.acting_user(q.user_id)?;
    let rows = state
        .db
        .run(move |conn| tasks::list_open_for_user(conn, user_id))
        .await?;
    Ok(Json(rows))
}

pub async fn clock_in(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ClockInRequest>,
) -> AppResult<(StatusCode, Json<ActivityResult>)> {
    let user_id = auth.acting_user(body.user_id)?;
    let at = at_or_now(body.at.as_deref())?;
    let res = Tracker::new(&state.db, state.caps)
        .clock_in(user_id, at, body.key.as_deref(), RecordSource::Desktop)
        .await?;
    Ok(respond(res))
}

pub async fn clock_out(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ClockOutRequest>,
) -> AppResult<(StatusCode, Json<ActivityResult>)> {
    let user_id = auth.acting_user(body.user_id)?;
    let at = at_or_now(body.at.as_deref())?;
    if !state.caps.task_data && !body.task_data.is_empty() {
        state.warner.warn("task_data");
    }
    let res = Tracker::new(&state.db, state.caps)
        .clock_out(
            user_id,
            at,
            body.note.as_deref(),
            &body.task_data,
            body.key.as_deref(),
        )
        .await?;
    Ok(respond(res))
}

pub async fn start_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<StartRequest>,
) -> AppResult<(StatusCode, Json<ActivityResult>)> {
    let user_id = auth.acting_user(body.user_id)?;
    let at = at_or_now(body.at.as_deref())?;
    let res = Tracker::new(&state.db, state.caps)
        .start_activity(
            user_id,
            body.task_id,
            at,
            body.key.as_deref(),
            RecordSource::Desktop,
        )
        .await?;
    Ok(respond(res))
}

pub async fn finish_activity(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<FinishRequest>,
) -> AppResult<(StatusCode, Json<ActivityResult>)> {
    let user_id = auth.acting_user(body.user_id)?;
    let target = RecordRef::from_parts(body.id, body.key)?;
    let at = at_or_now(body.at.as_deref())?;
    if !state.caps.task_data && !body.task_data.is_empty() {
        state.warner.warn("task_data");
    }
    let res = Tracker::new(&state.db, state.caps)
        .finish_activity(user_id, &target, at, body.note.as_deref(), &body.task_data)
        .await?;
    Ok(respond(res))
}

pub async fn sync(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<SyncRequest>,
) -> AppResult<Json<SyncResponse>> {
    let user_id = auth.acting_user(body.user_id)?;
    if body.actions.len() > MAX_SYNC_ACTIONS {
        return Err(AppError::validation(format!(
            "at most {MAX_SYNC_ACTIONS} actions per sync"
        )));
    }
    let results = Tracker::new(&state.db, state.caps)
        .sync(user_id, &body.actions)
        .await;
    Ok(Json(SyncResponse { results }))
}
