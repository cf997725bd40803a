//! Group repository.

use std::sync::Arc;

use doctrack_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Order, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use crate::entities::{Group, GroupDepartment, group, group_department};

/// Repository for group operations.
#[derive(Clone)]
pub struct GroupRepository {
    db: Arc<DatabaseConnection>,
}

impl GroupRepository {
    /// Create a new group repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find group by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<group::Model>> {
        Group::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get group by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<group::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Group not found: {id}")))
    }

    /// List all groups ordered by name.
    pub async fn find_all(&self) -> AppResult<Vec<group::Model>> {
        Group::find()
            .order_by(group::Column::Name, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Membership rows for the given groups, in saved order.
    pub async fn find_members(
        &self,
        group_ids: &[String],
    ) -> AppResult<Vec<group_department::Model>> {
        if group_ids.is_empty() {
            return Ok(vec![]);
        }

        GroupDepartment::find()
            .filter(group_department::Column::GroupId.is_in(group_ids.iter().cloned()))
            .order_by(group_department::Column::GroupId, Order::Asc)
            .order_by(group_department::Column::Position, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a group together with its memberships.
    pub async fn create(&self, model: group::Model, department_ids: &[String]) -> AppResult<()> {
        let txn = self.begin().await?;

        Group::insert(group::ActiveModel::from(model.clone()))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        insert_members(&txn, &model.id, department_ids).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Rename a group and replace its membership set in one transaction.
    pub async fn replace(&self, model: group::Model, department_ids: &[String]) -> AppResult<()> {
        let txn = self.begin().await?;

        let result = Group::update_many()
            .set(group::ActiveModel {
                name: Set(model.name.clone()),
                updated_at: Set(model.updated_at),
                ..Default::default()
            })
            .filter(group::Column::Id.eq(model.id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Group not found: {}", model.id)));
        }

        GroupDepartment::delete_many()
            .filter(group_department::Column::GroupId.eq(model.id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        insert_members(&txn, &model.id, department_ids).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a group permanently. Memberships go with it.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Group::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Group not found: {id}")));
        }
        Ok(())
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn insert_members(
    txn: &DatabaseTransaction,
    group_id: &str,
    department_ids: &[String],
) -> AppResult<()> {
    if department_ids.is_empty() {
        return Ok(());
    }

    let rows = department_ids
        .iter()
        .zip(0..)
        .map(|(department_id, position)| group_department::ActiveModel {
            group_id: Set(group_id.to_string()),
            department_id: Set(department_id.clone()),
            position: Set(position),
        });

    GroupDepartment::insert_many(rows)
        .exec_without_returning(txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn create_test_group(id: &str, name: &str) -> group::Model {
        group::Model {
            id: id.to_string(),
            name: name.to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[tokio::test]
    async fn test_find_by_id() {
        let group = create_test_group("grp1", "Executive");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[group.clone()]])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.find_by_id("grp1").await.unwrap();

        assert_eq!(result.unwrap().name, "Executive");
    }

    #[tokio::test]
    async fn test_find_members_in_position_order() {
        let members = vec![
            group_department::Model {
                group_id: "grp1".to_string(),
                department_id: "d2".to_string(),
                position: 0,
            },
            group_department::Model {
                group_id: "grp1".to_string(),
                department_id: "d1".to_string(),
                position: 1,
            },
        ];

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([members])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo.find_members(&["grp1".to_string()]).await.unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result[0].department_id, "d2");
    }

    #[tokio::test]
    async fn test_create_writes_group_and_members_in_one_transaction() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(2)])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo
            .create(
                create_test_group("grp1", "Executive"),
                &["d1".to_string(), "d2".to_string()],
            )
            .await;

        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_replace_unknown_group() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(0)])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        let result = repo
            .replace(create_test_group("missing", "Nobody"), &[])
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_delete() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1)])
                .into_connection(),
        );

        let repo = GroupRepository::new(db);
        assert!(repo.delete("grp1").await.is_ok());
    }
}
