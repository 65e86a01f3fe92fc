use crate::auth::AuthUser;
use crate::db::TrackedConn;
use crate::db::queries::{items, projects, tasks};
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, ApiQuery};
use crate::http::state::AppState;
use crate::models::item::{Item, NewItem};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use tracing::info;

const MAX_BULK: usize = 500;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemQuery {
    pub project_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct BulkRequest {
    pub items: Vec<NewItem>,
}

fn check_item(conn: &TrackedConn, item: &NewItem) -> AppResult<()> {
    if item.name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if !item.quantity.is_finite() || item.quantity < 0.0 {
        return Err(AppError::validation("quantity must be a non-negative number"));
    }
    if projects::get(conn, item.project_id)?.is_none() {
        return Err(AppError::validation(format!(
            "project {} does not exist",
            item.project_id
        )));
    }
    if let Some(task_id) = item.task_id {
        match tasks::get(conn, task_id)? {
            Some(t) if t.project_id == item.project_id => {}
            Some(_) => {
                return Err(AppError::validation(format!(
                    "task {task_id} belongs to another project"
                )));
            }
            None => return Err(AppError::validation(format!("task {task_id} does not exist"))),
        }
    }
    Ok(())
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(q): ApiQuery<ItemQuery>,
) -> AppResult<Json<Vec<Item>>> {
    let project = q.project_id;
    Ok(Json(state.db.run(move |conn| items::list(conn, project)).await?))
}

pub async fn create(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(body): ApiJson<NewItem>,
) -> AppResult<(StatusCode, Json<Item>)> {
    let item = state
        .db
        .run(move |conn| {
            check_item(conn, &body)?;
            let id = items::insert(conn, &body)?;
            items::get(conn, id)?.ok_or_else(|| AppError::not_found("item", id))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// All items or none: any invalid entry rolls the whole batch back.
pub async fn bulk(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiJson(body): ApiJson<BulkRequest>,
) -> AppResult<(StatusCode, Json<Vec<Item>>)> {
    if body.items.is_empty() {
        return Err(AppError::validation("items must not be empty"));
    }
    if body.items.len() > MAX_BULK {
        return Err(AppError::validation(format!(
            "at most {MAX_BULK} items per request"
        )));
    }

    let created = state
        .db
        .transaction(move |tx| {
            for (i, item) in body.items.iter().enumerate() {
                check_item(tx, item).map_err(|e| match e {
                    AppError::Validation(m) => AppError::Validation(format!("items[{i}]: {m}")),
                    other => other,
                })?;
            }
            let ids = items::insert_many(tx, &body.items)?;

            let mut created = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(item) = items::get(tx, id)? {
                    created.push(item);
                }
            }
            Ok(created)
        })
        .await?;
    info!(count = created.len(), "bulk items created");
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_staff()?;
    if !state.db.run(move |conn| items::delete(conn, id)).await? {
        return Err(AppError::not_found("item", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
