//! Department repository.

use std::sync::Arc;

use doctrack_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder,
};

use super::write_error;
use crate::entities::{Department, TrackerRecipient, User, department, tracker_recipient, user};

/// Repository for department operations.
#[derive(Clone)]
pub struct DepartmentRepository {
    db: Arc<DatabaseConnection>,
}

impl DepartmentRepository {
    /// Create a new department repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find department by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<department::Model>> {
        Department::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get department by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<department::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Department not found: {id}")))
    }

    /// Find department by its numeric code.
    pub async fn find_by_code(&self, code: i32) -> AppResult<Option<department::Model>> {
        Department::find()
            .filter(department::Column::Code.eq(code))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Resolve a set of IDs. Unknown IDs are simply absent from the result.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<department::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Department::find()
            .filter(department::Column::Id.is_in(ids.iter().cloned()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List every department ordered by code.
    pub async fn find_all(&self) -> AppResult<Vec<department::Model>> {
        Department::find()
            .order_by(department::Column::Code, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a department.
    pub async fn create(&self, model: department::ActiveModel) -> AppResult<department::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| write_error(&e, "Department code already exists"))
    }

    /// Update a department.
    pub async fn update(&self, model: department::ActiveModel) -> AppResult<department::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| write_error(&e, "Department code already exists"))
    }

    /// Whether any user or tracker recipient still points at the department.
    pub async fn is_referenced(&self, id: &str) -> AppResult<bool> {
        let users = User::find()
            .filter(user::Column::DepartmentId.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if users > 0 {
            return Ok(true);
        }

        let recipients = TrackerRecipient::find()
            .filter(tracker_recipient::Column::DepartmentId.eq(id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(recipients > 0)
    }

    /// Delete a department permanently.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Department::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Department not found: {id}")));
        }
        Ok(())
    }
}
