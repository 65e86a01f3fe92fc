use crate::auth::AuthUser;
use crate::db::TrackedConn;
use crate::db::queries::{customers, projects, tasks, users};
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, ApiQuery, required};
use crate::http::state::AppState;
use crate::models::project::{Project, ProjectInput, ProjectStatus};
use crate::models::task::{Task, TaskInput, TaskStatus};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectQuery {
    pub customer_id: Option<i64>,
}

fn ensure_customer(conn: &TrackedConn, id: i64) -> AppResult<()> {
    match customers::get(conn, id)? {
        Some(_) => Ok(()),
        None => Err(AppError::validation(format!("customer {id} does not exist"))),
    }
}

fn ensure_assignee(conn: &TrackedConn, id: Option<i64>) -> AppResult<()> {
    match id {
        Some(uid) if !users::exists(conn, uid)? => {
            Err(AppError::validation(format!("user {uid} does not exist")))
        }
        _ => Ok(()),
    }
}

fn load_project(conn: &TrackedConn, id: i64) -> AppResult<Project> {
    projects::get(conn, id)?.ok_or_else(|| AppError::not_found("project", id))
}

fn load_task(conn: &TrackedConn, id: i64) -> AppResult<Task> {
    tasks::get(conn, id)?.ok_or_else(|| AppError::not_found("task", id))
}

// ---------------------------
// projects
// ---------------------------

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(q): ApiQuery<ProjectQuery>,
) -> AppResult<Json<Vec<Project>>> {
    let customer = q.customer_id;
    Ok(Json(state.db.run(move |conn| projects::list(conn, customer)).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Project>> {
    Ok(Json(state.db.run(move |conn| load_project(conn, id)).await?))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<ProjectInput>,
) -> AppResult<(StatusCode, Json<Project>)> {
    auth.require_staff()?;
    let customer_id = body
        .customer_id
        .ok_or_else(|| AppError::validation("customerId is required"))?;
    let code = required("code", body.code.as_deref())?;
    let name = required("name", body.name.as_deref())?;

    let project = state
        .db
        .run(move |conn| {
            ensure_customer(conn, customer_id)?;
            let id = projects::insert(
                conn,
                customer_id,
                &code,
                &name,
                body.status.unwrap_or(ProjectStatus::Planned),
                body.description.as_deref().unwrap_or(""),
            )?;
            load_project(conn, id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<ProjectInput>,
) -> AppResult<Json<Project>> {
    auth.require_staff()?;
    let code = body.code.as_deref().map(|c| required("code", Some(c))).transpose()?;
    let name = body.name.as_deref().map(|n| required("name", Some(n))).transpose()?;

    let p = state
        .db
        .run(move |conn| {
            let mut p = load_project(conn, id)?;
            if let Some(cid) = body.customer_id {
                ensure_customer(conn, cid)?;
                p.customer_id = cid;
            }
            if let Some(code) = code {
                p.code = code;
            }
            if let Some(name) = name {
                p.name = name;
            }
            if let Some(status) = body.status {
                p.status = status;
            }
            if let Some(desc) = body.description {
                p.description = desc;
            }
            projects::update(conn, &p)?;
            Ok(p)
        })
        .await?;
    Ok(Json(p))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_staff()?;
    if !state.db.run(move |conn| projects::delete(conn, id)).await? {
        return Err(AppError::not_found("project", id));
    }
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------
// tasks
// ---------------------------

pub async fn list_tasks(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(project_id): Path<i64>,
) -> AppResult<Json<Vec<Task>>> {
    let rows = state
        .db
        .run(move |conn| {
            load_project(conn, project_id)?;
            tasks::list_by_project(conn, project_id)
        })
        .await?;
    Ok(Json(rows))
}

pub async fn create_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(project_id): Path<i64>,
    ApiJson(body): ApiJson<TaskInput>,
) -> AppResult<(StatusCode, Json<Task>)> {
    auth.require_staff()?;
    let title = required("title", body.title.as_deref())?;

    let task = state
        .db
        .run(move |conn| {
            load_project(conn, project_id)?;
            ensure_assignee(conn, body.assignee_id)?;
            let id = tasks::insert(
                conn,
                project_id,
                &title,
                body.category.as_deref().unwrap_or(""),
                body.status.unwrap_or(TaskStatus::Open),
                body.assignee_id,
                body.external_key.as_deref().filter(|k| !k.trim().is_empty()),
            )?;
            load_task(conn, id)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn get_task(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Task>> {
    Ok(Json(state.db.run(move |conn| load_task(conn, id)).await?))
}

pub async fn update_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<TaskInput>,
) -> AppResult<Json<Task>> {
    let t = state
        .db
        .run(move |conn| {
            let mut t = load_task(conn, id)?;

            // Assignees may move their own task along; everything else is staff only.
            let status_only = body.title.is_none()
                && body.category.is_none()
                && body.assignee_id.is_none()
                && body.external_key.is_none();
            if !(status_only && t.assignee_id == Some(auth.user_id)) {
                auth.require_staff()?;
            }

            if let Some(title) = body.title.as_deref() {
                t.title = required("title", Some(title))?;
            }
            if let Some(category) = body.category {
                t.category = category;
            }
            if let Some(status) = body.status {
                t.status = status;
            }
            if body.assignee_id.is_some() {
                ensure_assignee(conn, body.assignee_id)?;
                t.assignee_id = body.assignee_id;
            }
            if let Some(key) = body.external_key {
                t.external_key = Some(key).filter(|k| !k.trim().is_empty());
            }
            tasks::update(conn, &t)?;
            Ok(t)
        })
        .await?;
    Ok(Json(t))
}

pub async fn delete_task(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_staff()?;
    if !state.db.run(move |conn| tasks::delete(conn, id)).await? {
        return Err(AppError::not_found("task", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
