//! Group endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use doctrack_common::AppResult;
use doctrack_core::{GroupInput, GroupView, Operation, authorize};

use crate::{
    extractors::{AuthUser, JsonBody},
    middleware::AppState,
    response::{self, ApiResponse},
};

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<GroupView>>> {
    authorize(&user, Operation::ViewGroups)?;
    Ok(ApiResponse::ok(state.group_service.list().await?))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<GroupInput>,
) -> AppResult<ApiResponse<GroupView>> {
    authorize(&user, Operation::ManageGroups)?;
    Ok(ApiResponse::created(state.group_service.create(input).await?))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<GroupView>> {
    authorize(&user, Operation::ViewGroups)?;
    Ok(ApiResponse::ok(state.group_service.get(&id).await?))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<GroupInput>,
) -> AppResult<ApiResponse<GroupView>> {
    authorize(&user, Operation::ManageGroups)?;
    Ok(ApiResponse::ok(state.group_service.update(&id, input).await?))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authorize(&user, Operation::ManageGroups)?;
    state.group_service.delete(&id).await?;
    Ok(response::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}
