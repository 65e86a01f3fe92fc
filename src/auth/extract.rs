use crate::auth::token::Claims;
use crate::errors::{AppError, AppResult};
use crate::http::state::AppState;
use crate::models::role::Role;
use axum::extract::{FromRequestParts, Query};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use serde::Deserialize;

/// Caller identity for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub role: Role,
    pub login: String,
    /// Auth mode is off; the caller acts as an unnamed admin.
    pub anonymous: bool,
}

impl AuthUser {
    pub fn anonymous() -> Self {
        Self {
            user_id: 0,
            role: Role::Admin,
            login: "anonymous".to_string(),
            anonymous: true,
        }
    }

    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            role: claims.role,
            login: claims.login,
            anonymous: false,
        }
    }

    /// Admin or manager.
    pub fn require_staff(&self) -> AppResult<()> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(AppError::Forbidden("insufficient role".to_string()))
        }
    }

    pub fn require_admin(&self) -> AppResult<()> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(AppError::Forbidden("admin role required".to_string()))
        }
    }

    /// Resolve whose time records a request acts on.
    ///
    /// Anonymous callers must name the user. Authenticated workers may only
    /// act on themselves; staff may act on anyone.
    pub fn acting_user(&self, requested: Option<i64>) -> AppResult<i64> {
        if self.anonymous {
            return requested.ok_or_else(|| AppError::validation("userId is required"));
        }
        match requested {
            None => Ok(self.user_id),
            Some(id) if id == self.user_id || self.role.is_staff() => Ok(id),
            Some(_) => Err(AppError::Forbidden(
                "cannot act on another user's records".to_string(),
            )),
        }
    }
}

#[derive(Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Credential from `Authorization: Bearer <t>`, else from `?token=<t>`.
pub fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION)
        && let Ok(value) = value.to_str()
        && let Some(token) = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
    {
        let token = token.trim();
        if !token.is_empty() {
            return Some(token.to_string());
        }
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
        .filter(|t| !t.is_empty())
}

/// Authenticate a request's parts against the state's auth mode.
pub fn authenticate(parts: &Parts, state: &AppState) -> AppResult<AuthUser> {
    if !state.auth_enabled() {
        return Ok(AuthUser::anonymous());
    }
    let token = bearer_token(parts)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    let claims = state
        .signer
        .verify(&token, chrono::Utc::now().timestamp())?;
    Ok(AuthUser::from_claims(claims))
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        authenticate(parts, state)
    }
}
