//! User service.

use chrono::Utc;
use doctrack_common::{AppError, AppResult, IdGenerator};
use doctrack_db::{
    entities::{department, user, user::UserRole},
    repositories::{DepartmentRepository, UserRepository},
};
use sea_orm::{Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::auth::{CurrentUser, hash_password};
use super::department::DepartmentRef;
use super::pagination::{Page, PageRequest};
use super::policy::authorize_role;
use super::validation::{password_strength, username_charset};

/// Public view of a user. Never carries the password hash.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub department_id: String,
    pub department: Option<DepartmentRef>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

impl UserView {
    #[must_use]
    pub fn new(user: user::Model, department: Option<&department::Model>) -> Self {
        Self {
            id: user.id,
            username: user.username,
            role: user.role,
            department_id: user.department_id,
            department: department.map(DepartmentRef::from),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

fn known_role(role: &str) -> Result<(), ValidationError> {
    role.parse::<UserRole>().map(|_| ()).map_err(|_| {
        let mut err = ValidationError::new("role");
        err.message = Some("Role is not recognised".into());
        err
    })
}

/// Input for registering a user.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInput {
    #[validate(
        length(min = 3, max = 64, message = "Username must be 3 to 64 characters"),
        custom(function = "username_charset")
    )]
    pub username: String,

    #[validate(length(max = 128), custom(function = "password_strength"))]
    pub password: String,

    #[validate(custom(function = "known_role"))]
    pub role: String,

    #[validate(length(min = 1, message = "Department is required"))]
    pub department_id: String,
}

/// Input for updating a user. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserInput {
    #[validate(
        length(min = 3, max = 64, message = "Username must be 3 to 64 characters"),
        custom(function = "username_charset")
    )]
    pub username: Option<String>,

    #[validate(length(max = 128), custom(function = "password_strength"))]
    pub password: Option<String>,

    #[validate(custom(function = "known_role"))]
    pub role: Option<String>,

    #[validate(length(min = 1, message = "Department is required"))]
    pub department_id: Option<String>,
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    department_repo: DepartmentRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, department_repo: DepartmentRepository) -> Self {
        Self {
            user_repo,
            department_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user. `caller` is `None` under open registration.
    pub async fn register(
        &self,
        caller: Option<&CurrentUser>,
        input: RegisterInput,
    ) -> AppResult<user::Model> {
        input.validate()?;
        let role = parse_role(&input.role)?;
        authorize_role(caller, role)?;
        let username = input.username.trim().to_lowercase();

        self.ensure_department(&input.department_id).await?;
        self.ensure_username_free(&username, None).await?;

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(username),
            password_hash: Set(hash_password(&input.password)?),
            role: Set(role),
            department_id: Set(input.department_id),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let user = self.user_repo.create(model).await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User registered");
        Ok(user)
    }

    /// Get a user with its department.
    pub async fn get(&self, id: &str) -> AppResult<UserView> {
        let user = self.user_repo.get_by_id(id).await?;
        self.view(user).await
    }

    /// Profile of the authenticated caller.
    pub async fn me(&self, caller: &CurrentUser) -> AppResult<UserView> {
        self.get(&caller.id).await
    }

    /// Page through users, optionally filtered by username.
    pub async fn list(
        &self,
        request: PageRequest,
        search: Option<&str>,
    ) -> AppResult<Page<UserView>> {
        let total = self.user_repo.count(search).await?;
        let users = self
            .user_repo
            .find_page(search, request.limit, request.offset())
            .await?;

        let department_ids: Vec<String> = users.iter().map(|u| u.department_id.clone()).collect();
        let departments = self.department_repo.find_by_ids(&department_ids).await?;

        let items = users
            .into_iter()
            .map(|u| {
                let department = departments.iter().find(|d| d.id == u.department_id);
                UserView::new(u, department)
            })
            .collect();

        Ok(Page::new(items, total, request))
    }

    /// Update a user.
    pub async fn update(
        &self,
        caller: &CurrentUser,
        id: &str,
        input: UpdateUserInput,
    ) -> AppResult<UserView> {
        input.validate()?;
        let role = input.role.as_deref().map(parse_role).transpose()?;
        if let Some(role) = role {
            authorize_role(Some(caller), role)?;
        }

        let existing = self.user_repo.get_by_id(id).await?;
        authorize_role(Some(caller), existing.role)?;
        let username = input.username.map(|u| u.trim().to_lowercase());

        if let Some(username) = &username {
            if *username != existing.username {
                self.ensure_username_free(username, Some(id)).await?;
            }
        }
        if let Some(department_id) = &input.department_id {
            if *department_id != existing.department_id {
                self.ensure_department(department_id).await?;
            }
        }

        let mut active: user::ActiveModel = existing.into();
        if let Some(username) = username {
            active.username = Set(username);
        }
        if let Some(password) = input.password {
            active.password_hash = Set(hash_password(&password)?);
        }
        if let Some(role) = role {
            active.role = Set(role);
        }
        if let Some(department_id) = input.department_id {
            active.department_id = Set(department_id);
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.user_repo.update(active).await?;
        tracing::info!(user_id = %id, "User updated");
        self.view(updated).await
    }

    /// Delete a user. Accounts cannot delete themselves.
    pub async fn delete(&self, caller: &CurrentUser, id: &str) -> AppResult<()> {
        if caller.id == id {
            return Err(AppError::Forbidden(
                "You cannot delete your own account".to_string(),
            ));
        }

        self.user_repo.delete(id).await?;
        tracing::info!(user_id = %id, deleted_by = %caller.id, "User deleted");
        Ok(())
    }

    async fn view(&self, user: user::Model) -> AppResult<UserView> {
        let department = self.department_repo.find_by_id(&user.department_id).await?;
        Ok(UserView::new(user, department.as_ref()))
    }

    async fn ensure_department(&self, department_id: &str) -> AppResult<()> {
        if self.department_repo.find_by_id(department_id).await?.is_none() {
            return Err(AppError::field("departmentId", "Department not found"));
        }
        Ok(())
    }

    async fn ensure_username_free(&self, username: &str, except_id: Option<&str>) -> AppResult<()> {
        match self.user_repo.find_by_username(username).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(AppError::Conflict(
                "Username is already taken".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

fn parse_role(role: &str) -> AppResult<UserRole> {
    role.parse()
        .map_err(|_| AppError::field("role", "Role is not recognised"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            password_hash: "$argon2id$v=19$m=19456,t=2,p=1$c2FsdA$aGFzaA".to_string(),
            role: UserRole::Recipient,
            department_id: "d1".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn create_test_department(id: &str) -> department::Model {
        department::Model {
            id: id.to_string(),
            code: 7,
            name: "Legal".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn caller(id: &str) -> CurrentUser {
        CurrentUser {
            id: id.to_string(),
            username: "admin".to_string(),
            role: UserRole::Admin,
            department_id: "d1".to_string(),
        }
    }

    fn register_input(username: &str, password: &str, role: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            password: password.to_string(),
            role: role.to_string(),
            department_id: "d1".to_string(),
        }
    }

    fn service(db: MockDatabase) -> UserService {
        let db = Arc::new(db.into_connection());
        UserService::new(UserRepository::new(db.clone()), DepartmentRepository::new(db))
    }

    #[tokio::test]
    async fn test_register_lowercases_username() {
        let created = create_test_user("u1", "records.clerk");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_department("d1")]])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created]]),
        );

        let user = service
            .register(
                Some(&caller("admin1")),
                register_input("Records.Clerk", "Secret1!", "recipient"),
            )
            .await
            .unwrap();

        assert_eq!(user.username, "records.clerk");
    }

    #[tokio::test]
    async fn test_register_reports_every_invalid_field() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .register(
                Some(&caller("admin1")),
                register_input("ab", "password", "management"),
            )
            .await;

        match result {
            Err(AppError::InvalidFields(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert_eq!(names, vec!["password", "role", "username"]);
            }
            other => panic!("expected InvalidFields, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_unknown_department() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<department::Model>::new()]),
        );

        let result = service
            .register(
                Some(&caller("admin1")),
                register_input("clerk", "Secret1!", "viewer"),
            )
            .await;

        match result {
            Err(AppError::InvalidFields(fields)) => assert_eq!(fields[0].field, "departmentId"),
            other => panic!("expected InvalidFields, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_duplicate_username_conflicts() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_department("d1")]])
                .append_query_results([[create_test_user("u1", "clerk")]]),
        );

        let result = service
            .register(
                Some(&caller("admin1")),
                register_input("CLERK", "Secret1!", "viewer"),
            )
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_list_users_paginates() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => Into::<Value>::into(11i64)
                }]])
                .append_query_results([[create_test_user("u1", "alice")]])
                .append_query_results([[create_test_department("d1")]]),
        );

        let page = service
            .list(PageRequest::new(Some(2), Some(10)), None)
            .await
            .unwrap();

        assert_eq!(page.pagination.total, 11);
        assert_eq!(page.pagination.total_pages, 2);
        assert_eq!(page.items[0].department.as_ref().unwrap().name, "Legal");
    }

    #[tokio::test]
    async fn test_cannot_delete_self() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service.delete(&caller("u1"), "u1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_delete_other_user() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres).append_exec_results([
            MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            },
        ]));

        assert!(service.delete(&caller("admin1"), "u2").await.is_ok());
    }

    #[tokio::test]
    async fn test_update_role() {
        let existing = create_test_user("u1", "clerk");
        let mut promoted = existing.clone();
        promoted.role = UserRole::TrackerMonitor;
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[promoted]])
                .append_query_results([[create_test_department("d1")]]),
        );

        let view = service
            .update(
                &caller("admin1"),
                "u1",
                UpdateUserInput {
                    role: Some("trackermonitor".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(view.role, UserRole::TrackerMonitor);
    }

    #[tokio::test]
    async fn test_admin_cannot_register_superadmin() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .register(
                Some(&caller("admin1")),
                register_input("root2", "Secret1!", "superadmin"),
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_open_registration_cannot_create_superadmin() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .register(None, register_input("root2", "Secret1!", "superadmin"))
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_superadmin_can_register_superadmin() {
        let mut created = create_test_user("u9", "root2");
        created.role = UserRole::SuperAdmin;
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[create_test_department("d1")]])
                .append_query_results([Vec::<user::Model>::new()])
                .append_query_results([[created]]),
        );
        let mut root = caller("root1");
        root.role = UserRole::SuperAdmin;

        let user = service
            .register(
                Some(&root),
                register_input("root2", "Secret1!", "superadmin"),
            )
            .await
            .unwrap();

        assert_eq!(user.role, UserRole::SuperAdmin);
    }

    #[tokio::test]
    async fn test_admin_cannot_promote_to_superadmin() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .update(
                &caller("admin1"),
                "u1",
                UpdateUserInput {
                    role: Some("superadmin".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_cannot_edit_superadmin_account() {
        let mut root = create_test_user("root1", "root");
        root.role = UserRole::SuperAdmin;
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[root]]));

        let result = service
            .update(
                &caller("admin1"),
                "root1",
                UpdateUserInput {
                    password: Some("N3w!Secret".to_string()),
                    ..Default::default()
                },
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }
}
