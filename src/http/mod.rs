//! HTTP surface: REST API, desktop facade, health and the realtime upgrade.

pub mod auth;
pub mod customers;
pub mod desktop;
pub mod extract;
pub mod health;
pub mod items;
pub mod lookups;
pub mod projects;
pub mod state;
pub mod time_tracking;
pub mod users;

use crate::errors::AppError;
use crate::realtime::session::desktop_ws;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
pub use state::AppState;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

async fn fallback() -> AppError {
    AppError::NotFound("route not found".to_string())
}

pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/users", get(users::list).post(users::create))
        .route(
            "/users/{id}",
            get(users::get).put(users::update).delete(users::delete),
        )
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/{id}",
            get(customers::get)
                .put(customers::update)
                .delete(customers::delete),
        )
        .route("/projects", get(projects::list).post(projects::create))
        .route(
            "/projects/{id}",
            get(projects::get)
                .put(projects::update)
                .delete(projects::delete),
        )
        .route(
            "/projects/{id}/tasks",
            get(projects::list_tasks).post(projects::create_task),
        )
        .route(
            "/tasks/{id}",
            get(projects::get_task)
                .put(projects::update_task)
                .delete(projects::delete_task),
        )
        .route("/items", get(items::list).post(items::create))
        .route("/items/bulk", post(items::bulk))
        .route("/items/{id}", axum::routing::delete(items::delete))
        .route("/lookups", get(lookups::list).post(lookups::create))
        .route("/time-tracking", get(time_tracking::list))
        .route(
            "/time-tracking/{id}",
            get(time_tracking::get).delete(time_tracking::delete),
        )
        .route("/time-tracking/{id}/task-data", get(time_tracking::task_data))
        .route("/desktop/status", get(desktop::status))
        .route("/desktop/tasks", get(desktop::tasks))
        .route("/desktop/clock-in", post(desktop::clock_in))
        .route("/desktop/clock-out", post(desktop::clock_out))
        .route("/desktop/activities/start", post(desktop::start_activity))
        .route("/desktop/activities/finish", post(desktop::finish_activity))
        .route("/desktop/sync", post(desktop::sync));

    Router::new()
        .route("/health/live", get(health::live))
        .route("/health/ready", get(health::ready))
        .route("/ws/desktop", get(desktop_ws))
        .nest("/api", api)
        .fallback(fallback)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}
