use crate::auth::AuthUser;
use crate::db::queries::customers;
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, required};
use crate::http::state::AppState;
use crate::models::customer::{Customer, CustomerInput};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
) -> AppResult<Json<Vec<Customer>>> {
    Ok(Json(state.db.run(customers::list).await?))
}

pub async fn get(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<Customer>> {
    let c = state
        .db
        .run(move |conn| customers::get(conn, id))
        .await?
        .ok_or_else(|| AppError::not_found("customer", id))?;
    Ok(Json(c))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<CustomerInput>,
) -> AppResult<(StatusCode, Json<Customer>)> {
    auth.require_staff()?;
    let name = required("name", body.name.as_deref())?;

    let c = state
        .db
        .run(move |conn| {
            let id = customers::insert(
                conn,
                &name,
                body.contact.as_deref().unwrap_or(""),
                body.email.as_deref().unwrap_or(""),
                body.phone.as_deref().unwrap_or(""),
            )?;
            customers::get(conn, id)?.ok_or_else(|| AppError::not_found("customer", id))
        })
        .await?;
    Ok((StatusCode::CREATED, Json(c)))
}

pub async fn update(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ApiJson(body): ApiJson<CustomerInput>,
) -> AppResult<Json<Customer>> {
    auth.require_staff()?;
    let name = body.name.as_deref().map(|n| required("name", Some(n))).transpose()?;

    let c = state
        .db
        .run(move |conn| {
            let mut c =
                customers::get(conn, id)?.ok_or_else(|| AppError::not_found("customer", id))?;
            if let Some(name) = name {
                c.name = name;
            }
            if let Some(v) = body.contact {
                c.contact = v;
            }
            if let Some(v) = body.email {
                c.email = v;
            }
            if let Some(v) = body.phone {
                c.phone = v;
            }
            customers::update(conn, &c)?;
            Ok(c)
        })
        .await?;
    Ok(Json(c))
}

pub async fn delete(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    auth.require_staff()?;
    if !state.db.run(move |conn| customers::delete(conn, id)).await? {
        return Err(AppError::not_found("customer", id));
    }
    Ok(StatusCode::NO_CONTENT)
}
