//! API middleware.

#![allow(missing_docs)]

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Request, header},
    middleware::Next,
    response::Response,
};
use doctrack_common::{AppError, Config};
use doctrack_core::{
    AuthService, DepartmentService, GroupService, ReportService, TokenIssuer, TrackerService,
    UserService,
};
use doctrack_db::repositories::{
    DepartmentRepository, GroupRepository, TrackerRepository, UserRepository,
};
use sea_orm::DatabaseConnection;

use crate::rate_limit::RateLimiter;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    pub auth_service: AuthService,
    pub user_service: UserService,
    pub department_service: DepartmentService,
    pub group_service: GroupService,
    pub tracker_service: TrackerService,
    pub report_service: ReportService,
    pub rate_limiter: RateLimiter,
    /// Accept registrations without a token.
    pub open_registration: bool,
}

impl AppState {
    /// Wire repositories and services over one connection pool.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>, config: &Config) -> Self {
        let user_repo = UserRepository::new(Arc::clone(&db));
        let department_repo = DepartmentRepository::new(Arc::clone(&db));
        let group_repo = GroupRepository::new(Arc::clone(&db));
        let tracker_repo = TrackerRepository::new(db);

        let group_service = GroupService::new(group_repo, department_repo.clone());

        Self {
            auth_service: AuthService::new(
                user_repo.clone(),
                department_repo.clone(),
                TokenIssuer::new(&config.auth),
            ),
            user_service: UserService::new(user_repo, department_repo.clone()),
            department_service: DepartmentService::new(department_repo.clone()),
            tracker_service: TrackerService::new(
                tracker_repo.clone(),
                department_repo,
                group_service.clone(),
                config,
            ),
            group_service,
            report_service: ReportService::new(tracker_repo),
            rate_limiter: RateLimiter::new(&config.rate_limit),
            open_registration: config.auth.open_registration,
        }
    }
}

/// Why a presented token was not accepted. Surfaced by [`crate::extractors::AuthUser`]
/// so public routes are unaffected by a stale header.
#[derive(Debug, Clone)]
pub struct AuthRejection(pub AppError);

/// Authentication middleware.
///
/// Resolves a `Bearer` token to the caller and stores it in the request
/// extensions. Requests without a token pass through untouched.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(header::AUTHORIZATION)
        .map(|value| value.to_str().map(str::to_owned));

    match header {
        None => {}
        Some(Ok(value)) => match value.strip_prefix("Bearer ") {
            Some(token) => match state.auth_service.authenticate(token.trim()).await {
                Ok(user) => {
                    req.extensions_mut().insert(user);
                }
                Err(err) => {
                    tracing::debug!(error = %err, "Bearer token rejected");
                    req.extensions_mut().insert(AuthRejection(err));
                }
            },
            None => {
                req.extensions_mut().insert(AuthRejection(AppError::Unauthorized(
                    "Authorization header must use the Bearer scheme".to_string(),
                )));
            }
        },
        Some(Err(_)) => {
            req.extensions_mut().insert(AuthRejection(AppError::Unauthorized(
                "Malformed authorization header".to_string(),
            )));
        }
    }

    next.run(req).await
}
