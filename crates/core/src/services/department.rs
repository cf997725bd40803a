//! Department service.

use chrono::Utc;
use doctrack_common::{AppError, AppResult, IdGenerator};
use doctrack_db::{entities::department, repositories::DepartmentRepository};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::validation::not_blank;

/// Compact department reference embedded in other views and in tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepartmentRef {
    pub id: String,
    pub code: i32,
    pub name: String,
}

impl From<&department::Model> for DepartmentRef {
    fn from(model: &department::Model) -> Self {
        Self {
            id: model.id.clone(),
            code: model.code,
            name: model.name.clone(),
        }
    }
}

/// Input for creating a department.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateDepartmentInput {
    #[validate(required(message = "Department code is required"))]
    pub code: Option<i32>,

    #[validate(
        required(message = "Department name is required"),
        length(max = 256),
        custom(function = "not_blank")
    )]
    pub name: Option<String>,
}

/// Input for updating a department. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateDepartmentInput {
    pub code: Option<i32>,

    #[validate(length(max = 256), custom(function = "not_blank"))]
    pub name: Option<String>,
}

/// Department service for business logic.
#[derive(Clone)]
pub struct DepartmentService {
    department_repo: DepartmentRepository,
    id_gen: IdGenerator,
}

impl DepartmentService {
    /// Create a new department service.
    #[must_use]
    pub const fn new(department_repo: DepartmentRepository) -> Self {
        Self {
            department_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a department. Codes are unique.
    pub async fn create(&self, input: CreateDepartmentInput) -> AppResult<department::Model> {
        input.validate()?;
        let (Some(code), Some(name)) = (input.code, input.name) else {
            return Err(AppError::Validation("Code and name are required".to_string()));
        };

        self.ensure_code_free(code, None).await?;

        let model = department::ActiveModel {
            id: Set(self.id_gen.generate()),
            code: Set(code),
            name: Set(name.trim().to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let created = self.department_repo.create(model).await?;
        tracing::info!(department_id = %created.id, code = created.code, "Department created");
        Ok(created)
    }

    /// List all departments.
    pub async fn list(&self) -> AppResult<Vec<department::Model>> {
        self.department_repo.find_all().await
    }

    /// Get a department by ID.
    pub async fn get(&self, id: &str) -> AppResult<department::Model> {
        self.department_repo.get_by_id(id).await
    }

    /// Update code and/or name.
    pub async fn update(
        &self,
        id: &str,
        input: UpdateDepartmentInput,
    ) -> AppResult<department::Model> {
        input.validate()?;
        let existing = self.department_repo.get_by_id(id).await?;

        if let Some(code) = input.code {
            if code != existing.code {
                self.ensure_code_free(code, Some(id)).await?;
            }
        }

        let mut active: department::ActiveModel = existing.into();
        if let Some(code) = input.code {
            active.code = Set(code);
        }
        if let Some(name) = input.name {
            active.name = Set(name.trim().to_string());
        }
        active.updated_at = Set(Some(Utc::now().into()));

        let updated = self.department_repo.update(active).await?;
        tracing::info!(department_id = %id, "Department updated");
        Ok(updated)
    }

    /// Delete a department that nothing references any more.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.department_repo.get_by_id(id).await?;

        if self.department_repo.is_referenced(id).await? {
            return Err(AppError::Conflict(
                "Department is still assigned to users or trackers".to_string(),
            ));
        }

        self.department_repo.delete(id).await?;
        tracing::info!(department_id = %id, "Department deleted");
        Ok(())
    }

    async fn ensure_code_free(&self, code: i32, except_id: Option<&str>) -> AppResult<()> {
        match self.department_repo.find_by_code(code).await? {
            Some(other) if Some(other.id.as_str()) != except_id => Err(AppError::Conflict(
                format!("Department code {code} already exists"),
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult, Value};
    use std::sync::Arc;

    fn create_test_department(id: &str, code: i32, name: &str) -> department::Model {
        department::Model {
            id: id.to_string(),
            code,
            name: name.to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn service(db: MockDatabase) -> DepartmentService {
        DepartmentService::new(DepartmentRepository::new(Arc::new(db.into_connection())))
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, Value> {
        maplit::btreemap! { "num_items" => Into::<Value>::into(n) }
    }

    #[tokio::test]
    async fn test_create_department() {
        let created = create_test_department("d1", 101, "Finance");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<department::Model>::new()])
                .append_query_results([[created]]),
        );

        let result = service
            .create(CreateDepartmentInput {
                code: Some(101),
                name: Some("  Finance ".to_string()),
            })
            .await
            .unwrap();

        assert_eq!(result.code, 101);
        assert_eq!(result.name, "Finance");
    }

    #[tokio::test]
    async fn test_create_duplicate_code_conflicts() {
        let existing = create_test_department("d1", 101, "Finance");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[existing]]),
        );

        let result = service
            .create(CreateDepartmentInput {
                code: Some(101),
                name: Some("Accounting".to_string()),
            })
            .await;

        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_requires_fields() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create(CreateDepartmentInput {
                code: None,
                name: Some("   ".to_string()),
            })
            .await;

        match result {
            Err(AppError::InvalidFields(fields)) => {
                let names: Vec<_> = fields.iter().map(|f| f.field.as_str()).collect();
                assert!(names.contains(&"code"));
                assert!(names.contains(&"name"));
            }
            other => panic!("expected InvalidFields, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_update_to_own_code_is_allowed() {
        let existing = create_test_department("d1", 101, "Finance");
        let mut renamed = existing.clone();
        renamed.name = "Treasury".to_string();
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[renamed]]),
        );

        let result = service
            .update(
                "d1",
                UpdateDepartmentInput {
                    code: Some(101),
                    name: Some("Treasury".to_string()),
                },
            )
            .await
            .unwrap();

        assert_eq!(result.name, "Treasury");
    }

    #[tokio::test]
    async fn test_delete_referenced_department_conflicts() {
        let existing = create_test_department("d1", 101, "Finance");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[count_row(1)]]),
        );

        assert!(matches!(
            service.delete("d1").await,
            Err(AppError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_unreferenced_department() {
        let existing = create_test_department("d1", 101, "Finance");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[existing]])
                .append_query_results([[count_row(0)], [count_row(0)]])
                .append_exec_results([MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                }]),
        );

        assert!(service.delete("d1").await.is_ok());
    }

    #[tokio::test]
    async fn test_get_missing_department() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<department::Model>::new()]),
        );

        assert!(matches!(
            service.get("missing").await,
            Err(AppError::NotFound(_))
        ));
    }
}
