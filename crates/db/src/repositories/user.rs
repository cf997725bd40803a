//! User repository.

use std::sync::Arc;

use doctrack_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select,
};

use super::{search_condition, write_error};
use crate::entities::{User, user};

/// Repository for user operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a user by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<user::Model>> {
        User::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get a user by ID, returning `NotFound` if absent.
    pub async fn get_by_id(&self, id: &str) -> AppResult<user::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User not found: {id}")))
    }

    /// Find a user by username. Callers pass the lowercased form.
    pub async fn find_by_username(&self, username: &str) -> AppResult<Option<user::Model>> {
        User::find()
            .filter(user::Column::Username.eq(username))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Page through users ordered by username, optionally filtered by a
    /// username substring.
    pub async fn find_page(
        &self,
        search: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<user::Model>> {
        Self::filtered(search)
            .order_by(user::Column::Username, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users matching the same filter as [`Self::find_page`].
    pub async fn count(&self, search: Option<&str>) -> AppResult<u64> {
        Self::filtered(search)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count users affiliated with a department.
    pub async fn count_by_department(&self, department_id: &str) -> AppResult<u64> {
        User::find()
            .filter(user::Column::DepartmentId.eq(department_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a new user.
    pub async fn create(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| write_error(&e, "Username is already taken"))
    }

    /// Update an existing user.
    pub async fn update(&self, model: user::ActiveModel) -> AppResult<user::Model> {
        model
            .update(self.db.as_ref())
            .await
            .map_err(|e| write_error(&e, "Username is already taken"))
    }

    /// Delete a user. Returns `NotFound` if nothing was removed.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = User::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("User not found: {id}")));
        }
        Ok(())
    }

    fn filtered(search: Option<&str>) -> Select<User> {
        let query = User::find();
        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => query.filter(search_condition(&[user::Column::Username], term)),
            None => query,
        }
    }
}
