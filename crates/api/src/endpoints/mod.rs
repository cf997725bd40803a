//! API endpoints.

mod departments;
mod groups;
mod reports;
mod trackers;
mod users;

use axum::Router;

use crate::middleware::AppState;

/// Create the API router.
///
/// Rate limiting and upload limits are attached per route, so the router
/// needs the state those layers read.
pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .nest("/users", users::router(state))
        .nest("/departments", departments::router())
        .nest("/groups", groups::router())
        .nest("/trackers", trackers::router(state))
        .nest("/reports", reports::router())
}
