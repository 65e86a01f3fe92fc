use crate::auth::AuthUser;
use crate::db::queries::task_data;
use crate::db::queries::time_tracking::{self as tt, RecordFilter};
use crate::errors::{AppError, AppResult};
use crate::http::extract::ApiQuery;
use crate::http::state::AppState;
use crate::models::time_record::{RecordKind, TaskDataRow, TimeRecord};
use crate::utils::time::{format_timestamp, parse_optional_timestamp};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

const DEFAULT_LIMIT: i64 = 500;
const MAX_LIMIT: i64 = 5000;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordQuery {
    pub user_id: Option<i64>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub kind: Option<RecordKind>,
    #[serde(default)]
    pub open: bool,
    pub limit: Option<i64>,
}

/// Workers see their own records only; staff and anonymous callers may
/// list everyone's.
fn visible_user(auth: &AuthUser, requested: Option<i64>) -> AppResult<Option<i64>> {
    if auth.anonymous || auth.role.is_staff() {
        Ok(requested)
    } else {
        auth.acting_user(requested).map(Some)
    }
}

fn can_see(auth: &AuthUser, rec: &TimeRecord) -> bool {
    auth.anonymous || auth.role.is_staff() || rec.user_id == auth.user_id
}

pub async fn list(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(q): ApiQuery<RecordQuery>,
) -> AppResult<Json<Vec<TimeRecord>>> {
    let from = parse_optional_timestamp(q.from.as_deref())?;
    let to = parse_optional_timestamp(q.to.as_deref())?;
    if let (Some(f), Some(t)) = (from, to)
        && t < f
    {
        return Err(AppError::validation("'to' is before 'from'"));
    }

    let filter = RecordFilter {
        user_id: visible_user(&auth, q.user_id)?,
        kind: q.kind,
        from: from.map(|f| format_timestamp(&f)),
        to: to.map(|t| format_timestamp(&t)),
        open_only: q.open,
        limit: Some(q.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)),
    };
    let rows = state.db.run(move |conn| tt::list(conn, &filter)).await?;
    Ok(Json(rows))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<TimeRecord>> {
    let rec = state
        .db
        .run(move |conn| tt::get(conn, id))
        .await?
        .filter(|r| can_see(&auth, r))
        .ok_or_else(|| AppError::not_found("time record", id))?;
    Ok(Json(rec))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_staff()?;
    if !state.db.run(move |conn| tt::delete(conn, id)).await? {
        return Err(AppError::not_found("time record", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn task_data(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<TaskDataRow>>> {
    let with_data = state.caps.task_data;
    let (rec, rows) = state
        .db
        .run(move |conn| {
            let rec = tt::get(conn, id)?;
            let rows = match &rec {
                Some(_) if with_data => task_data::list_for_record(conn, id)?,
                _ => Vec::new(),
            };
            Ok((rec, rows))
        })
        .await?;
    rec.filter(|r| can_see(&auth, r))
        .ok_or_else(|| AppError::not_found("time record", id))?;

    if !with_data {
        state.warner.warn("task_data");
    }
    Ok(Json(rows))
}
