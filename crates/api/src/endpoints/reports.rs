//! Report endpoints.

use axum::{Router, extract::State, routing::get};
use doctrack_common::AppResult;
use doctrack_core::{DepartmentSummary, Operation, authorize};

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Per-department recipient summary.
async fn summary(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<DepartmentSummary>>> {
    authorize(&user, Operation::ViewReports)?;
    Ok(ApiResponse::ok(state.report_service.summary().await?))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/summary", get(summary))
}
