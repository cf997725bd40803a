//! Tracker repository.
//!
//! A tracker is written as an aggregate: the root row plus its recipients,
//! audit entries and attachment payload. Every multi-row write runs inside a
//! single transaction.

use std::str::FromStr;
use std::sync::Arc;

use doctrack_common::{AppError, AppResult};
use sea_orm::sea_query::Query;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, Order, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Select, Set, TransactionTrait,
};

use super::search_condition;
use crate::entities::{
    Department, Tracker, TrackerAttachment, TrackerAudit, TrackerRecipient, department, tracker,
    tracker_attachment, tracker_audit, tracker_recipient,
};

/// Columns a tracker listing may be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackerSortField {
    #[default]
    DateReceived,
    CreatedAt,
    DocumentTitle,
    FromName,
}

impl TrackerSortField {
    const fn column(self) -> tracker::Column {
        match self {
            Self::DateReceived => tracker::Column::DateReceived,
            Self::CreatedAt => tracker::Column::CreatedAt,
            Self::DocumentTitle => tracker::Column::DocumentTitle,
            Self::FromName => tracker::Column::FromName,
        }
    }
}

impl FromStr for TrackerSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dateReceived" => Ok(Self::DateReceived),
            "createdAt" => Ok(Self::CreatedAt),
            "documentTitle" => Ok(Self::DocumentTitle),
            "fromName" => Ok(Self::FromName),
            other => Err(format!("unsupported sort field: {other}")),
        }
    }
}

/// One page of the tracker listing.
#[derive(Debug, Clone)]
pub struct TrackerPageQuery<'a> {
    pub search: Option<&'a str>,
    pub sort: TrackerSortField,
    pub order: Order,
    pub limit: u64,
    pub offset: u64,
}

/// Everything written when a tracker is created.
#[derive(Debug, Clone)]
pub struct NewTracker {
    pub tracker: tracker::Model,
    pub recipients: Vec<tracker_recipient::Model>,
    pub attachment: Option<Vec<u8>>,
    pub audit: tracker_audit::Model,
}

/// Repository for the tracker aggregate.
#[derive(Clone)]
pub struct TrackerRepository {
    db: Arc<DatabaseConnection>,
}

impl TrackerRepository {
    /// Create a new tracker repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    // ==================== Reads ====================

    /// Find tracker by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<tracker::Model>> {
        Tracker::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get tracker by ID, returning error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<tracker::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tracker not found: {id}")))
    }

    /// Recipients of one tracker in insertion order.
    pub async fn find_recipients(
        &self,
        tracker_id: &str,
    ) -> AppResult<Vec<tracker_recipient::Model>> {
        TrackerRecipient::find()
            .filter(tracker_recipient::Column::TrackerId.eq(tracker_id))
            .order_by(tracker_recipient::Column::Position, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Recipients of several trackers, grouped by tracker then position.
    pub async fn find_recipients_for(
        &self,
        tracker_ids: &[String],
    ) -> AppResult<Vec<tracker_recipient::Model>> {
        if tracker_ids.is_empty() {
            return Ok(vec![]);
        }

        TrackerRecipient::find()
            .filter(tracker_recipient::Column::TrackerId.is_in(tracker_ids.iter().cloned()))
            .order_by(tracker_recipient::Column::TrackerId, Order::Asc)
            .order_by(tracker_recipient::Column::Position, Order::Asc)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// A single recipient, only if it belongs to the given tracker.
    pub async fn find_recipient(
        &self,
        tracker_id: &str,
        recipient_id: &str,
    ) -> AppResult<Option<tracker_recipient::Model>> {
        TrackerRecipient::find_by_id(recipient_id)
            .filter(tracker_recipient::Column::TrackerId.eq(tracker_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Recipients of one tracker joined to their departments, in insertion order.
    pub async fn find_recipients_with_departments(
        &self,
        tracker_id: &str,
    ) -> AppResult<Vec<(tracker_recipient::Model, Option<department::Model>)>> {
        TrackerRecipient::find()
            .filter(tracker_recipient::Column::TrackerId.eq(tracker_id))
            .order_by(tracker_recipient::Column::Position, Order::Asc)
            .find_also_related(Department)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Every recipient row joined to its department. Feeds the summary report.
    pub async fn all_recipients_with_departments(
        &self,
    ) -> AppResult<Vec<(tracker_recipient::Model, Option<department::Model>)>> {
        TrackerRecipient::find()
            .find_also_related(Department)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    fn audit_query(tracker_id: &str) -> Select<TrackerAudit> {
        // ULIDs break ties between entries written in the same instant
        TrackerAudit::find()
            .filter(tracker_audit::Column::TrackerId.eq(tracker_id))
            .order_by(tracker_audit::Column::CreatedAt, Order::Asc)
            .order_by(tracker_audit::Column::Id, Order::Asc)
    }

    /// Audit trail of a tracker, oldest first.
    pub async fn find_audit(&self, tracker_id: &str) -> AppResult<Vec<tracker_audit::Model>> {
        Self::audit_query(tracker_id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Attachment bytes of a tracker, if any were uploaded.
    pub async fn find_attachment(&self, tracker_id: &str) -> AppResult<Option<Vec<u8>>> {
        TrackerAttachment::find_by_id(tracker_id)
            .one(self.db.as_ref())
            .await
            .map(|row| row.map(|a| a.data))
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// One page of trackers, optionally filtered by a title/sender substring.
    pub async fn find_page(&self, query: TrackerPageQuery<'_>) -> AppResult<Vec<tracker::Model>> {
        Self::searched(query.search)
            .order_by(query.sort.column(), query.order)
            .order_by(tracker::Column::Id, Order::Asc)
            .offset(query.offset)
            .limit(query.limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count trackers matching the same search as [`Self::find_page`].
    pub async fn count(&self, search: Option<&str>) -> AppResult<u64> {
        Self::searched(search)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Trackers with at least one recipient in the department, newest first.
    pub async fn find_page_by_department(
        &self,
        department_id: &str,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<tracker::Model>> {
        Self::routed_to(department_id)
            .order_by(tracker::Column::DateReceived, Order::Desc)
            .order_by(tracker::Column::Id, Order::Asc)
            .offset(offset)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count trackers routed to the department.
    pub async fn count_by_department(&self, department_id: &str) -> AppResult<u64> {
        Self::routed_to(department_id)
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ==================== Writes ====================

    /// Insert a tracker with its recipients, attachment and creation audit entry.
    pub async fn create(&self, new: NewTracker) -> AppResult<()> {
        let txn = self.begin().await?;
        let tracker_id = new.tracker.id.clone();

        Tracker::insert(tracker::ActiveModel::from(new.tracker))
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if !new.recipients.is_empty() {
            TrackerRecipient::insert_many(
                new.recipients
                    .into_iter()
                    .map(tracker_recipient::ActiveModel::from),
            )
            .exec_without_returning(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        }

        if let Some(data) = new.attachment {
            insert_attachment(&txn, &tracker_id, data).await?;
        }
        insert_audit(&txn, new.audit).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite the tracker's own fields, optionally replacing the attachment
    /// and appending an audit entry.
    pub async fn update(
        &self,
        model: tracker::Model,
        attachment: Option<Vec<u8>>,
        audit: Option<tracker_audit::Model>,
    ) -> AppResult<()> {
        let txn = self.begin().await?;

        let result = Tracker::update_many()
            .set(tracker::ActiveModel {
                from_name: Set(model.from_name),
                document_title: Set(model.document_title),
                date_received: Set(model.date_received),
                attachment_name: Set(model.attachment_name),
                attachment_mime: Set(model.attachment_mime),
                attachment_size: Set(model.attachment_size),
                updated_at: Set(model.updated_at),
                ..Default::default()
            })
            .filter(tracker::Column::Id.eq(model.id.as_str()))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Tracker not found: {}", model.id)));
        }

        if let Some(data) = attachment {
            TrackerAttachment::delete_many()
                .filter(tracker_attachment::Column::TrackerId.eq(model.id.as_str()))
                .exec(&txn)
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            insert_attachment(&txn, &model.id, data).await?;
        }
        if let Some(audit) = audit {
            insert_audit(&txn, audit).await?;
        }

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Apply `changes` to exactly one recipient of one tracker and append the
    /// audit entry. Fails with `NotFound` if the pair does not match a row.
    pub async fn update_recipient(
        &self,
        tracker_id: &str,
        recipient_id: &str,
        changes: tracker_recipient::ActiveModel,
        audit: tracker_audit::Model,
    ) -> AppResult<()> {
        let txn = self.begin().await?;

        let result = TrackerRecipient::update_many()
            .set(changes)
            .filter(tracker_recipient::Column::Id.eq(recipient_id))
            .filter(tracker_recipient::Column::TrackerId.eq(tracker_id))
            .exec(&txn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!(
                "Recipient not found: {recipient_id}"
            )));
        }

        insert_audit(&txn, audit).await?;

        txn.commit()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Delete a tracker. Recipients, audit entries and attachment cascade.
    pub async fn delete(&self, id: &str) -> AppResult<()> {
        let result = Tracker::delete_by_id(id)
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound(format!("Tracker not found: {id}")));
        }
        Ok(())
    }

    fn searched(search: Option<&str>) -> Select<Tracker> {
        let query = Tracker::find();
        match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => query.filter(search_condition(
                &[tracker::Column::DocumentTitle, tracker::Column::FromName],
                term,
            )),
            None => query,
        }
    }

    fn routed_to(department_id: &str) -> Select<Tracker> {
        Tracker::find().filter(
            tracker::Column::Id.in_subquery(
                Query::select()
                    .column(tracker_recipient::Column::TrackerId)
                    .from(TrackerRecipient)
                    .and_where(tracker_recipient::Column::DepartmentId.eq(department_id))
                    .to_owned(),
            ),
        )
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db
            .begin()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

async fn insert_attachment(
    txn: &DatabaseTransaction,
    tracker_id: &str,
    data: Vec<u8>,
) -> AppResult<()> {
    TrackerAttachment::insert(tracker_attachment::ActiveModel {
        tracker_id: Set(tracker_id.to_string()),
        data: Set(data),
    })
    .exec_without_returning(txn)
    .await
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

async fn insert_audit(txn: &DatabaseTransaction, audit: tracker_audit::Model) -> AppResult<()> {
    TrackerAudit::insert(tracker_audit::ActiveModel::from(audit))
        .exec_without_returning(txn)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}
