//! Department endpoints.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{get, post},
};
use doctrack_common::AppResult;
use doctrack_core::{CreateDepartmentInput, Operation, UpdateDepartmentInput, authorize};
use doctrack_db::entities::department;
use serde::Serialize;

use crate::{
    extractors::{AuthUser, JsonBody},
    middleware::AppState,
    response::{self, ApiResponse},
};

/// Department response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentResponse {
    pub id: String,
    pub code: i32,
    pub name: String,
    pub created_at: String,
    pub updated_at: Option<String>,
}

impl From<department::Model> for DepartmentResponse {
    fn from(d: department::Model) -> Self {
        Self {
            id: d.id,
            code: d.code,
            name: d.name,
            created_at: d.created_at.to_rfc3339(),
            updated_at: d.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<Vec<DepartmentResponse>>> {
    authorize(&user, Operation::ViewDepartments)?;

    let departments = state.department_service.list().await?;
    Ok(ApiResponse::ok(
        departments.into_iter().map(Into::into).collect(),
    ))
}

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<CreateDepartmentInput>,
) -> AppResult<ApiResponse<DepartmentResponse>> {
    authorize(&user, Operation::ManageDepartments)?;

    let department = state.department_service.create(input).await?;
    Ok(ApiResponse::created(department.into()))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<DepartmentResponse>> {
    authorize(&user, Operation::ViewDepartments)?;
    Ok(ApiResponse::ok(state.department_service.get(&id).await?.into()))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateDepartmentInput>,
) -> AppResult<ApiResponse<DepartmentResponse>> {
    authorize(&user, Operation::ManageDepartments)?;

    let department = state.department_service.update(&id, input).await?;
    Ok(ApiResponse::ok(department.into()))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authorize(&user, Operation::ManageDepartments)?;
    state.department_service.delete(&id).await?;
    Ok(response::ok())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/new", post(create))
        .route("/{id}", get(show).put(update).delete(delete))
}
