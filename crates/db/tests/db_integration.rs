//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `doctrack_test`)
//!   `TEST_DB_PASSWORD` (default: `doctrack_test`)
//!   `TEST_DB_NAME` (default: `doctrack_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::Utc;
use doctrack_common::{AppError, IdGenerator};
use doctrack_db::entities::{
    department,
    tracker,
    tracker_audit::{self, AuditAction},
    tracker_recipient::{self, RecipientStatus},
};
use doctrack_db::repositories::{DepartmentRepository, NewTracker, TrackerRepository};
use doctrack_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

async fn seed_department(repo: &DepartmentRepository, code: i32, name: &str) -> department::Model {
    repo.create(department::ActiveModel {
        id: Set(IdGenerator::new().generate()),
        code: Set(code),
        name: Set(name.to_string()),
        created_at: Set(Utc::now().into()),
        updated_at: Set(None),
    })
    .await
    .unwrap()
}

fn new_tracker(department_ids: &[&str]) -> NewTracker {
    let ids = IdGenerator::new();
    let now = Utc::now();
    let tracker_id = ids.generate();

    let recipients = department_ids
        .iter()
        .zip(0..)
        .map(|(department_id, position)| tracker_recipient::Model {
            id: ids.generate(),
            tracker_id: tracker_id.clone(),
            department_id: (*department_id).to_string(),
            position,
            receive_date: now.into(),
            is_seen: false,
            date_seen: None,
            remarks: None,
            status: RecipientStatus::Pending,
        })
        .collect();

    NewTracker {
        tracker: tracker::Model {
            id: tracker_id.clone(),
            from_name: "Provincial Office".to_string(),
            document_title: "Budget memo".to_string(),
            date_received: now.into(),
            created_by: ids.generate(),
            attachment_name: Some("memo.pdf".to_string()),
            attachment_mime: Some("application/pdf".to_string()),
            attachment_size: Some(4),
            created_at: now.into(),
            updated_at: None,
        },
        recipients,
        attachment: Some(b"%PDF".to_vec()),
        audit: audit_entry(&tracker_id, AuditAction::Create),
    }
}

fn audit_entry(tracker_id: &str, action: AuditAction) -> tracker_audit::Model {
    let ids = IdGenerator::new();
    tracker_audit::Model {
        id: ids.generate(),
        tracker_id: tracker_id.to_string(),
        action,
        actor_id: ids.generate(),
        actor_username: "clerk".to_string(),
        changes: serde_json::json!({}),
        created_at: Utc::now().into(),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_tracker_round_trip_and_cascade() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    let conn = Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap());
    let departments = DepartmentRepository::new(Arc::clone(&conn));
    let trackers = TrackerRepository::new(Arc::clone(&conn));

    let records = seed_department(&departments, 10, "Records").await;
    let new = new_tracker(&[&records.id]);
    let tracker_id = new.tracker.id.clone();
    trackers.create(new).await.unwrap();

    let stored = trackers.get_by_id(&tracker_id).await.unwrap();
    assert_eq!(stored.document_title, "Budget memo");
    assert_eq!(trackers.find_recipients(&tracker_id).await.unwrap().len(), 1);
    assert_eq!(trackers.find_audit(&tracker_id).await.unwrap().len(), 1);
    assert_eq!(
        trackers.find_attachment(&tracker_id).await.unwrap(),
        Some(b"%PDF".to_vec())
    );

    // Referenced departments cannot be removed
    assert!(departments.is_referenced(&records.id).await.unwrap());

    trackers.delete(&tracker_id).await.unwrap();
    assert!(trackers.find_by_id(&tracker_id).await.unwrap().is_none());
    assert!(trackers.find_recipients(&tracker_id).await.unwrap().is_empty());
    assert!(trackers.find_attachment(&tracker_id).await.unwrap().is_none());

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_department_code_is_rejected() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    let departments = DepartmentRepository::new(Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap()));

    seed_department(&departments, 20, "Legal").await;
    let result = departments
        .create(department::ActiveModel {
            id: Set(IdGenerator::new().generate()),
            code: Set(20),
            name: Set("Legal Annex".to_string()),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        })
        .await;

    assert!(matches!(result, Err(AppError::Conflict(_))));

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_recipient_update_leaves_siblings_untouched() {
    let db = TestDatabase::create_unique().await.expect("Failed to connect");
    let conn = Arc::new(sea_orm::Database::connect(db.config.database_url()).await.unwrap());
    let departments = DepartmentRepository::new(Arc::clone(&conn));
    let trackers = TrackerRepository::new(Arc::clone(&conn));

    let records = seed_department(&departments, 30, "Records").await;
    let treasury = seed_department(&departments, 31, "Treasury").await;
    let new = new_tracker(&[&records.id, &treasury.id]);
    let tracker_id = new.tracker.id.clone();
    trackers.create(new).await.unwrap();

    let tracker_before = trackers.get_by_id(&tracker_id).await.unwrap();
    let before = trackers.find_recipients(&tracker_id).await.unwrap();
    assert_eq!(before.len(), 2);
    assert!(before.iter().all(|r| r.status == RecipientStatus::Pending));
    assert_eq!(before[0].department_id, records.id);
    assert_eq!(before[1].department_id, treasury.id);

    trackers
        .update_recipient(
            &tracker_id,
            &before[0].id,
            tracker_recipient::ActiveModel {
                status: Set(RecipientStatus::Approved),
                remarks: Set(Some("Signed".to_string())),
                ..Default::default()
            },
            audit_entry(&tracker_id, AuditAction::Update),
        )
        .await
        .unwrap();

    let after = trackers.find_recipients(&tracker_id).await.unwrap();
    assert_eq!(after.len(), 2);
    assert_eq!(after[0].status, RecipientStatus::Approved);
    assert_eq!(after[0].remarks.as_deref(), Some("Signed"));
    assert_eq!(after[1], before[1]);
    assert_eq!(trackers.get_by_id(&tracker_id).await.unwrap(), tracker_before);
    assert_eq!(trackers.find_audit(&tracker_id).await.unwrap().len(), 2);

    db.drop_database().await.unwrap();
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
