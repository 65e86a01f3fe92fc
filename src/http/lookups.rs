use crate::auth::AuthUser;
use crate::db::queries::lookups;
use crate::errors::{AppError, AppResult};
use crate::http::extract::{ApiJson, ApiQuery, required};
use crate::http::state::AppState;
use crate::models::lookup::{Lookup, NewLookup};
use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct LookupQuery {
    pub category: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    _auth: AuthUser,
    ApiQuery(q): ApiQuery<LookupQuery>,
) -> AppResult<Json<Vec<Lookup>>> {
    if !state.caps.lookups {
        state.warner.warn("lookups");
        return Ok(Json(Vec::new()));
    }
    let rows = state
        .db
        .run(move |conn| lookups::list(conn, q.category.as_deref()))
        .await?;
    Ok(Json(rows))
}

pub async fn create(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiJson(body): ApiJson<NewLookup>,
) -> AppResult<(StatusCode, Json<Lookup>)> {
    auth.require_staff()?;
    if !state.caps.lookups {
        state.warner.warn("lookups");
        return Err(AppError::NotFound("lookups are not available".to_string()));
    }
    let category = required("category", Some(&body.category))?;
    let code = required("code", Some(&body.code))?;
    let label = required("label", Some(&body.label))?;
    let input = NewLookup {
        category,
        code,
        label,
        sort_order: body.sort_order,
    };

    let (id, input) = state
        .db
        .run(move |conn| Ok((lookups::insert(conn, &input)?, input)))
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(Lookup {
            id,
            category: input.category,
            code: input.code,
            label: input.label,
            sort_order: input.sort_order,
        }),
    ))
}
