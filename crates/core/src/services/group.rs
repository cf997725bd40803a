//! Group service: named routing lists of departments.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use doctrack_common::{AppError, AppResult, IdGenerator};
use doctrack_db::{
    entities::{department, group},
    repositories::{DepartmentRepository, GroupRepository},
};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::department::DepartmentRef;
use super::validation::not_blank;

/// Input for creating or updating a group.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GroupInput {
    #[validate(length(min = 1, max = 256), custom(function = "not_blank"))]
    pub name: String,

    #[serde(default, alias = "departments")]
    pub department_ids: Vec<String>,
}

/// A group with its departments resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupView {
    pub id: String,
    pub name: String,
    pub departments: Vec<DepartmentRef>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

/// Keep the first occurrence of every ID, preserving order.
pub fn dedup_ids<I, S>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    ids.into_iter()
        .map(|id| id.as_ref().trim().to_string())
        .filter(|id| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

/// Group service for business logic.
#[derive(Clone)]
pub struct GroupService {
    group_repo: GroupRepository,
    department_repo: DepartmentRepository,
    id_gen: IdGenerator,
}

impl GroupService {
    /// Create a new group service.
    #[must_use]
    pub const fn new(group_repo: GroupRepository, department_repo: DepartmentRepository) -> Self {
        Self {
            group_repo,
            department_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Create a group. Every department must exist; duplicates collapse.
    pub async fn create(&self, input: GroupInput) -> AppResult<GroupView> {
        input.validate()?;
        let department_ids = dedup_ids(&input.department_ids);
        let departments = self.resolve_departments(&department_ids).await?;

        let model = group::Model {
            id: self.id_gen.generate(),
            name: input.name.trim().to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        };
        self.group_repo.create(model.clone(), &department_ids).await?;

        tracing::info!(
            group_id = %model.id,
            departments = department_ids.len(),
            "Group created"
        );
        Ok(Self::view(model, &department_ids, &departments))
    }

    /// Rename a group and replace its department set.
    pub async fn update(&self, id: &str, input: GroupInput) -> AppResult<GroupView> {
        input.validate()?;
        let mut model = self.group_repo.get_by_id(id).await?;

        let department_ids = dedup_ids(&input.department_ids);
        let departments = self.resolve_departments(&department_ids).await?;

        model.name = input.name.trim().to_string();
        model.updated_at = Some(Utc::now().into());
        self.group_repo.replace(model.clone(), &department_ids).await?;

        tracing::info!(group_id = %id, departments = department_ids.len(), "Group updated");
        Ok(Self::view(model, &department_ids, &departments))
    }

    /// Get a group by ID.
    pub async fn get(&self, id: &str) -> AppResult<GroupView> {
        let model = self.group_repo.get_by_id(id).await?;
        let mut views = self.hydrate(vec![model]).await?;
        views
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Group not found: {id}")))
    }

    /// List all groups.
    pub async fn list(&self) -> AppResult<Vec<GroupView>> {
        let groups = self.group_repo.find_all().await?;
        self.hydrate(groups).await
    }

    /// Delete a group.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        self.group_repo.delete(id).await?;
        tracing::info!(group_id = %id, "Group deleted");
        Ok(())
    }

    /// Department IDs of the given groups, in group order then saved order.
    /// Unknown group IDs are a validation failure.
    pub async fn department_ids_of(&self, group_ids: &[String]) -> AppResult<Vec<String>> {
        let group_ids = dedup_ids(group_ids);
        if group_ids.is_empty() {
            return Ok(vec![]);
        }

        let members = self.group_repo.find_members(&group_ids).await?;
        let mut by_group: HashMap<&str, Vec<String>> = HashMap::new();
        for member in &members {
            by_group
                .entry(member.group_id.as_str())
                .or_default()
                .push(member.department_id.clone());
        }

        // A group with no members has no rows, so existence is checked separately.
        let mut ids = Vec::new();
        for group_id in &group_ids {
            match by_group.get(group_id.as_str()) {
                Some(department_ids) => ids.extend(department_ids.iter().cloned()),
                None => {
                    self.group_repo
                        .find_by_id(group_id)
                        .await?
                        .ok_or_else(|| {
                            AppError::Validation("One or more groups not found".to_string())
                        })?;
                }
            }
        }
        Ok(ids)
    }

    async fn resolve_departments(&self, ids: &[String]) -> AppResult<Vec<department::Model>> {
        let departments = self.department_repo.find_by_ids(ids).await?;
        if departments.len() != ids.len() {
            return Err(AppError::Validation(
                "One or more departments not found".to_string(),
            ));
        }
        Ok(departments)
    }

    async fn hydrate(&self, groups: Vec<group::Model>) -> AppResult<Vec<GroupView>> {
        let group_ids: Vec<String> = groups.iter().map(|g| g.id.clone()).collect();
        let members = self.group_repo.find_members(&group_ids).await?;

        let department_ids = dedup_ids(members.iter().map(|m| m.department_id.as_str()));
        let departments = self.department_repo.find_by_ids(&department_ids).await?;

        let mut by_group: HashMap<&str, Vec<String>> = HashMap::new();
        for member in &members {
            by_group
                .entry(member.group_id.as_str())
                .or_default()
                .push(member.department_id.clone());
        }

        Ok(groups
            .into_iter()
            .map(|g| {
                let ids = by_group.get(g.id.as_str()).cloned().unwrap_or_default();
                Self::view(g, &ids, &departments)
            })
            .collect())
    }

    fn view(model: group::Model, ids: &[String], departments: &[department::Model]) -> GroupView {
        let lookup: HashMap<&str, &department::Model> =
            departments.iter().map(|d| (d.id.as_str(), d)).collect();

        GroupView {
            id: model.id,
            name: model.name,
            departments: ids
                .iter()
                .filter_map(|id| lookup.get(id.as_str()).map(|d| DepartmentRef::from(*d)))
                .collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use doctrack_db::entities::group_department;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
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

    fn member(group_id: &str, department_id: &str, position: i32) -> group_department::Model {
        group_department::Model {
            group_id: group_id.to_string(),
            department_id: department_id.to_string(),
            position,
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    fn service(db: MockDatabase) -> GroupService {
        let db = Arc::new(db.into_connection());
        GroupService::new(GroupRepository::new(db.clone()), DepartmentRepository::new(db))
    }

    #[test]
    fn test_dedup_keeps_first_occurrence() {
        assert_eq!(
            dedup_ids(["d2", "d1", "d2", " ", "d3", "d1"]),
            vec!["d2", "d1", "d3"]
        );
    }

    #[tokio::test]
    async fn test_create_group_with_duplicate_ids() {
        let d1 = create_test_department("d1", 1, "Finance");
        let d2 = create_test_department("d2", 2, "Legal");
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[d1, d2]])
                .append_exec_results([exec(1), exec(2)]),
        );

        let view = service
            .create(GroupInput {
                name: "Executive".to_string(),
                department_ids: vec!["d2".to_string(), "d1".to_string(), "d2".to_string()],
            })
            .await
            .unwrap();

        let codes: Vec<i32> = view.departments.iter().map(|d| d.code).collect();
        assert_eq!(codes, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_create_group_unknown_department_persists_nothing() {
        let d1 = create_test_department("d1", 1, "Finance");
        // No exec results queued: any write would fail the test with a different error.
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([[d1]]));

        let result = service
            .create(GroupInput {
                name: "Executive".to_string(),
                department_ids: vec!["d1".to_string(), "ghost".to_string()],
            })
            .await;

        match result {
            Err(AppError::Validation(msg)) => assert_eq!(msg, "One or more departments not found"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_group_blank_name() {
        let service = service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .create(GroupInput {
                name: "  ".to_string(),
                department_ids: vec![],
            })
            .await;

        assert!(matches!(result, Err(AppError::InvalidFields(_))));
    }

    #[tokio::test]
    async fn test_department_ids_of_groups_in_order() {
        let members = vec![
            member("g1", "d3", 0),
            member("g1", "d1", 1),
            member("g2", "d1", 0),
            member("g2", "d2", 1),
        ];
        let service =
            service(MockDatabase::new(DatabaseBackend::Postgres).append_query_results([members]));

        let ids = service
            .department_ids_of(&["g2".to_string(), "g1".to_string()])
            .await
            .unwrap();

        assert_eq!(ids, vec!["d1", "d2", "d3", "d1"]);
    }

    #[tokio::test]
    async fn test_department_ids_of_unknown_group() {
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<group_department::Model>::new()])
                .append_query_results([Vec::<group::Model>::new()]),
        );

        let result = service.department_ids_of(&["ghost".to_string()]).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_list_groups_resolves_departments() {
        let g1 = group::Model {
            id: "g1".to_string(),
            name: "Executive".to_string(),
            created_at: Utc::now().into(),
            updated_at: None,
        };
        let service = service(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[g1]])
                .append_query_results([[member("g1", "d1", 0)]])
                .append_query_results([[create_test_department("d1", 1, "Finance")]]),
        );

        let groups = service.list().await.unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].departments[0].name, "Finance");
    }
}
