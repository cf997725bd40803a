//! First-run setup.

use chrono::Utc;
use doctrack_common::{AppError, AppResult, IdGenerator, config::BootstrapConfig};
use doctrack_db::{
    entities::{department, user, user::UserRole},
    repositories::{DepartmentRepository, UserRepository},
};
use sea_orm::Set;

use super::auth::hash_password;
use super::validation::{password_strength, username_charset};

/// Create the configured superadmin if no user exists yet.
///
/// Returns the created account, or `None` when the user table was not empty.
pub async fn ensure_superadmin(
    config: &BootstrapConfig,
    user_repo: &UserRepository,
    department_repo: &DepartmentRepository,
) -> AppResult<Option<user::Model>> {
    if user_repo.count(None).await? > 0 {
        tracing::debug!("Users present, skipping bootstrap");
        return Ok(None);
    }

    let username = config.username.trim().to_lowercase();
    username_charset(&username)
        .map_err(|_| AppError::Config(format!("Invalid bootstrap username: {username}")))?;
    password_strength(&config.password)
        .map_err(|_| AppError::Config("Bootstrap password is too weak".to_string()))?;

    let id_gen = IdGenerator::new();
    let now = Utc::now();

    let department = match department_repo.find_by_code(config.department_code).await? {
        Some(existing) => existing,
        None => {
            let created = department_repo
                .create(department::ActiveModel {
                    id: Set(id_gen.generate()),
                    code: Set(config.department_code),
                    name: Set(config.department_name.clone()),
                    created_at: Set(now.into()),
                    updated_at: Set(None),
                })
                .await?;
            tracing::info!(department_id = %created.id, code = created.code, "Bootstrap department created");
            created
        }
    };

    let admin = user_repo
        .create(user::ActiveModel {
            id: Set(id_gen.generate()),
            username: Set(username),
            password_hash: Set(hash_password(&config.password)?),
            role: Set(UserRole::SuperAdmin),
            department_id: Set(department.id),
            created_at: Set(now.into()),
            updated_at: Set(None),
        })
        .await?;

    tracing::info!(user_id = %admin.id, username = %admin.username, "Bootstrap superadmin created");
    Ok(Some(admin))
}
