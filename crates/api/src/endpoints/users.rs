//! User and session endpoints.

use axum::{
    Router,
    extract::{Path, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use doctrack_common::{AppError, AppResult};
use doctrack_core::{
    AuthPayload, LoginInput, Operation, Page, PageRequest, RegisterInput, UpdateUserInput,
    UserView, authorize,
};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, JsonBody, MaybeAuthUser, QueryParams},
    middleware::AppState,
    rate_limit::rate_limit_middleware,
    response::{self, ApiResponse},
};

/// User list query.
#[derive(Debug, Deserialize)]
pub struct ListUsersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

/// Create an account and return a token for it.
async fn register(
    MaybeAuthUser(caller): MaybeAuthUser,
    State(state): State<AppState>,
    JsonBody(input): JsonBody<RegisterInput>,
) -> AppResult<ApiResponse<AuthPayload>> {
    match &caller {
        Some(caller) => authorize(caller, Operation::RegisterUser)?,
        None if state.open_registration => {
            tracing::warn!("Unauthenticated registration accepted (open registration)");
        }
        None => {
            return Err(AppError::Unauthorized(
                "Authentication required".to_string(),
            ));
        }
    }

    let user = state.user_service.register(caller.as_ref(), input).await?;
    let payload = state.auth_service.payload_for(user).await?;
    Ok(ApiResponse::created(payload))
}

/// Exchange credentials for a token.
async fn login(
    State(state): State<AppState>,
    JsonBody(input): JsonBody<LoginInput>,
) -> AppResult<ApiResponse<AuthPayload>> {
    let payload = state.auth_service.login(input).await?;
    Ok(ApiResponse::ok(payload))
}

/// Profile of the caller.
async fn me(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<UserView>> {
    Ok(ApiResponse::ok(state.user_service.me(&user).await?))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListUsersQuery>,
) -> AppResult<ApiResponse<Page<UserView>>> {
    authorize(&user, Operation::ListUsers)?;

    let page = state
        .user_service
        .list(
            PageRequest::new(query.page, query.limit),
            query.search.as_deref(),
        )
        .await?;
    Ok(ApiResponse::ok(page))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<UserView>> {
    authorize(&user, Operation::ViewUser)?;
    Ok(ApiResponse::ok(state.user_service.get(&id).await?))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(input): JsonBody<UpdateUserInput>,
) -> AppResult<ApiResponse<UserView>> {
    authorize(&user, Operation::UpdateUser)?;
    Ok(ApiResponse::ok(
        state.user_service.update(&user, &id, input).await?,
    ))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authorize(&user, Operation::DeleteUser)?;
    state.user_service.delete(&user, &id).await?;
    Ok(response::ok())
}

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route(
            "/login",
            post(login).layer(middleware::from_fn_with_state(
                state.rate_limiter.clone(),
                rate_limit_middleware,
            )),
        )
        .route("/me", get(me))
        .route("/", get(list))
        .route("/{id}", get(show).put(update).delete(delete))
}
