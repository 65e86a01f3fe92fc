use crate::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::db::queries::users;
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, required};
use crate::http::state::AppState;
use crate::models::user::{NewUser, User, UserPatch};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

const MIN_PASSWORD_LEN: usize = 4;

fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub async fn list(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<Vec<User>>> {
    auth.require_staff()?;
    Ok(Json(state.db.run(users::list).await?))
}

pub async fn get(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<User>> {
    if id != auth.user_id {
        auth.require_staff()?;
    }
    let user = state
        .db
        .run(move |conn| users::get(conn, id))
        .await?
        .ok_or_else(|| AppError::not_found("user", id))?;
    Ok(Json(user))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    auth.require_admin()?;
    let login = required("login", Some(&body.login))?;
    let name = required("name", Some(&body.name))?;
    check_password(&body.password)?;

    let role = body.role;
    let hash = hash_password(&body.password);
    let user = state
        .db
        .run(move |conn| {
            let id = users::insert(conn, &login, &name, &hash, role)?;
            users::get(conn, id)?.ok_or_else(|| AppError::not_found("user", id))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(patch): ApiJson<UserPatch>,
) -> AppResult<Json<User>> {
    auth.require_admin()?;
    if let Some(password) = patch.password.as_deref() {
        check_password(password)?;
    }
    // Hash before the write lock is taken.
    let new_hash = patch.password.as_deref().map(hash_password);
    let is_self = !auth.anonymous && id == auth.user_id;

    let user = state
        .db
        .transaction(move |tx| {
            let current = users::get(tx, id)?.ok_or_else(|| AppError::not_found("user", id))?;

            let name = match patch.name.as_deref() {
                Some(n) => required("name", Some(n))?,
                None => current.name,
            };
            let role = patch.role.unwrap_or(current.role);
            let active = patch.active.unwrap_or(current.active);
            if is_self && (!active || role != current.role) {
                return Err(AppError::Conflict(
                    "cannot deactivate or demote yourself".to_string(),
                ));
            }

            users::update(tx, id, &name, role, active)?;
            if let Some(hash) = new_hash.as_deref() {
                users::set_password_hash(tx, id, hash)?;
            }
            users::get(tx, id)?.ok_or_else(|| AppError::not_found("user", id))
        })
        .await?;
    Ok(Json(user))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_admin()?;
    if !auth.anonymous && id == auth.user_id {
        return Err(AppError::Conflict("cannot delete yourself".to_string()));
    }
    if !state.db.run(move |conn| users::delete(conn, id)).await? {
        return Err(AppError::not_found("user", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
