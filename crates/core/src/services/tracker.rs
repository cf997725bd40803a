//! Tracker service: the document aggregate and its recipient lifecycle.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use doctrack_common::{AppError, AppResult, Config, FieldIssue, IdGenerator};
use doctrack_db::{
    entities::{
        department, tracker,
        tracker_audit::{self, AuditAction},
        tracker_recipient::{self, RecipientStatus},
    },
    repositories::{
        DepartmentRepository, NewTracker, TrackerPageQuery, TrackerRepository, TrackerSortField,
    },
};
use sea_orm::{Order, Set, prelude::DateTimeWithTimeZone};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use super::auth::CurrentUser;
use super::department::DepartmentRef;
use super::group::GroupService;
use super::pagination::{Page, PageRequest};
use super::policy::{self, Operation};
use super::validation::parse_date;

/// MIME types accepted for tracker attachments.
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
];

/// Returned by the public status lookup for malformed and unknown IDs alike.
pub const STATUS_NOT_FOUND: &str = "Tracking number is invalid or archived";

/// An uploaded file.
#[derive(Debug, Clone)]
pub struct AttachmentUpload {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A requested recipient department.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientInput {
    #[serde(alias = "departmentId")]
    pub receiving_department: String,
    #[serde(default)]
    pub receive_date: Option<String>,
}

impl RecipientInput {
    /// A recipient with no explicit receive date.
    pub fn department(id: impl Into<String>) -> Self {
        Self {
            receiving_department: id.into(),
            receive_date: None,
        }
    }
}

/// Input for creating a tracker.
#[derive(Debug, Clone, Default)]
pub struct CreateTrackerInput {
    pub from_name: Option<String>,
    pub document_title: Option<String>,
    pub date_received: Option<String>,
    pub recipients: Vec<RecipientInput>,
    pub group_ids: Vec<String>,
    pub attachment: Option<AttachmentUpload>,
}

/// Input for updating a tracker. Absent fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct UpdateTrackerInput {
    pub from_name: Option<String>,
    pub document_title: Option<String>,
    pub date_received: Option<String>,
    pub attachment: Option<AttachmentUpload>,
}

/// Input for updating one recipient entry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRecipientInput {
    pub status: Option<String>,
    pub remarks: Option<String>,
    pub is_seen: Option<bool>,
    pub date_seen: Option<String>,
}

/// Listing parameters as received from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTrackersQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
}

/// Attachment metadata shown with a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub file_name: String,
    pub mime_type: String,
    pub size: i64,
}

/// A recipient entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientView {
    pub id: String,
    pub receiving_department: String,
    pub department: Option<DepartmentRef>,
    pub receive_date: DateTimeWithTimeZone,
    pub is_seen: bool,
    pub date_seen: Option<DateTimeWithTimeZone>,
    pub remarks: Option<String>,
    pub status: RecipientStatus,
}

/// A tracker with its recipients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerView {
    pub id: String,
    pub from_name: String,
    pub document_title: String,
    pub date_received: DateTimeWithTimeZone,
    pub created_by: String,
    pub attachment: Option<AttachmentMeta>,
    pub recipients: Vec<RecipientView>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: Option<DateTimeWithTimeZone>,
}

/// One audit trail entry.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditView {
    pub id: String,
    pub action: AuditAction,
    pub actor_id: String,
    pub actor_username: String,
    pub changes: Value,
    pub created_at: DateTimeWithTimeZone,
}

impl From<tracker_audit::Model> for AuditView {
    fn from(model: tracker_audit::Model) -> Self {
        Self {
            id: model.id,
            action: model.action,
            actor_id: model.actor_id,
            actor_username: model.actor_username,
            changes: model.changes,
            created_at: model.created_at,
        }
    }
}

/// A tracker with its audit trail.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerDetail {
    #[serde(flatten)]
    pub tracker: TrackerView,
    pub audit_trail: Vec<AuditView>,
}

/// Public view of one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusEntry {
    pub department_name: String,
    pub status: RecipientStatus,
    pub remarks: Option<String>,
}

/// Public status of a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerStatus {
    pub tracking_number: String,
    pub document_title: String,
    pub date_received: DateTimeWithTimeZone,
    pub recipients: Vec<StatusEntry>,
}

/// A downloadable attachment.
#[derive(Debug, Clone)]
pub struct AttachmentFile {
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// A recipient department with its optional explicit receive date.
type PlannedRecipient = (String, Option<DateTimeWithTimeZone>);

/// Explicit recipients first, then group departments, keeping the first
/// occurrence of each department.
pub fn merge_recipients(
    explicit: Vec<PlannedRecipient>,
    from_groups: Vec<String>,
) -> Vec<PlannedRecipient> {
    let mut seen = HashSet::new();
    explicit
        .into_iter()
        .chain(from_groups.into_iter().map(|id| (id, None)))
        .map(|(id, date)| (id.trim().to_string(), date))
        .filter(|(id, _)| !id.is_empty() && seen.insert(id.clone()))
        .collect()
}

fn required_text(value: Option<String>, field: &str, issues: &mut Vec<FieldIssue>) -> String {
    match value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        Some(v) => v,
        None => {
            issues.push(FieldIssue::new(field, "Must not be empty"));
            String::new()
        }
    }
}

fn optional_text(
    value: Option<String>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<String> {
    let value = value?.trim().to_string();
    if value.is_empty() {
        issues.push(FieldIssue::new(field, "Must not be empty"));
        return None;
    }
    Some(value)
}

fn date_field(
    value: Option<&str>,
    field: &str,
    issues: &mut Vec<FieldIssue>,
) -> Option<DateTimeWithTimeZone> {
    let value = value?;
    let parsed = parse_date(value);
    if parsed.is_none() {
        issues.push(FieldIssue::new(
            field,
            "Invalid date, expected YYYY-MM-DD or RFC 3339",
        ));
    }
    parsed
}

fn normalize_mime(mime: &str) -> String {
    mime.split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Tracker service for business logic.
#[derive(Clone)]
pub struct TrackerService {
    tracker_repo: TrackerRepository,
    department_repo: DepartmentRepository,
    groups: GroupService,
    id_gen: IdGenerator,
    max_attachment_bytes: usize,
    lock_final_status: bool,
}

impl TrackerService {
    /// Create a new tracker service.
    #[must_use]
    pub const fn new(
        tracker_repo: TrackerRepository,
        department_repo: DepartmentRepository,
        groups: GroupService,
        config: &Config,
    ) -> Self {
        Self {
            tracker_repo,
            department_repo,
            groups,
            id_gen: IdGenerator::new(),
            max_attachment_bytes: config.uploads.max_attachment_bytes,
            lock_final_status: config.trackers.lock_final_status,
        }
    }

    /// Largest accepted attachment in bytes.
    #[must_use]
    pub const fn max_attachment_bytes(&self) -> usize {
        self.max_attachment_bytes
    }

    /// Check an upload against the size ceiling and the accepted types.
    pub fn check_attachment(&self, upload: &AttachmentUpload) -> AppResult<()> {
        if upload.data.len() > self.max_attachment_bytes {
            return Err(AppError::PayloadTooLarge(format!(
                "Attachment exceeds the limit of {} bytes",
                self.max_attachment_bytes
            )));
        }
        let mime = normalize_mime(&upload.mime_type);
        if !ALLOWED_MIME_TYPES.contains(&mime.as_str()) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Attachments of type '{mime}' are not accepted"
            )));
        }
        if upload.data.is_empty() {
            return Err(AppError::field("attachment", "Attachment is empty"));
        }
        Ok(())
    }

    /// Register a document and route it to its recipient departments.
    pub async fn create(
        &self,
        actor: &CurrentUser,
        input: CreateTrackerInput,
    ) -> AppResult<TrackerView> {
        let mut issues = Vec::new();
        let from_name = required_text(input.from_name, "fromName", &mut issues);
        let document_title = required_text(input.document_title, "documentTitle", &mut issues);
        let date_received = match input.date_received.as_deref().map(str::trim) {
            None | Some("") => {
                issues.push(FieldIssue::new("dateReceived", "Date received is required"));
                None
            }
            Some(raw) => date_field(Some(raw), "dateReceived", &mut issues),
        };

        let mut explicit = Vec::with_capacity(input.recipients.len());
        for recipient in input.recipients {
            let receive_date = date_field(
                recipient
                    .receive_date
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty()),
                "recipients",
                &mut issues,
            );
            explicit.push((recipient.receiving_department, receive_date));
        }

        let Some(date_received) = date_received else {
            return Err(AppError::InvalidFields(issues));
        };
        if !issues.is_empty() {
            return Err(AppError::InvalidFields(issues));
        }

        if let Some(upload) = &input.attachment {
            self.check_attachment(upload)?;
        }

        let from_groups = self.groups.department_ids_of(&input.group_ids).await?;
        let planned = merge_recipients(explicit, from_groups);
        if planned.is_empty() {
            return Err(AppError::field(
                "recipients",
                "At least one recipient department is required",
            ));
        }

        let department_ids: Vec<String> = planned.iter().map(|(id, _)| id.clone()).collect();
        let departments = self.department_repo.find_by_ids(&department_ids).await?;
        if departments.len() != department_ids.len() {
            return Err(AppError::Validation(
                "One or more departments not found".to_string(),
            ));
        }

        let now: DateTimeWithTimeZone = Utc::now().into();
        let tracker_id = self.id_gen.generate();
        let (attachment_name, attachment_mime, attachment_size, attachment_data) =
            match input.attachment {
                Some(upload) => (
                    Some(upload.file_name),
                    Some(normalize_mime(&upload.mime_type)),
                    i64::try_from(upload.data.len()).ok(),
                    Some(upload.data),
                ),
                None => (None, None, None, None),
            };

        let model = tracker::Model {
            id: tracker_id.clone(),
            from_name,
            document_title,
            date_received,
            created_by: actor.id.clone(),
            attachment_name,
            attachment_mime,
            attachment_size,
            created_at: now,
            updated_at: None,
        };

        let recipients: Vec<tracker_recipient::Model> = planned
            .into_iter()
            .zip(0..)
            .map(|((department_id, receive_date), position)| tracker_recipient::Model {
                id: self.id_gen.generate(),
                tracker_id: tracker_id.clone(),
                department_id,
                position,
                receive_date: receive_date.unwrap_or(now),
                is_seen: false,
                date_seen: None,
                remarks: None,
                status: RecipientStatus::Pending,
            })
            .collect();

        let audit = self.audit_entry(&tracker_id, AuditAction::Create, actor, json!({}));

        self.tracker_repo
            .create(NewTracker {
                tracker: model.clone(),
                recipients: recipients.clone(),
                attachment: attachment_data,
                audit,
            })
            .await?;

        tracing::info!(
            tracker_id = %tracker_id,
            actor_id = %actor.id,
            recipients = recipients.len(),
            "Tracker created"
        );
        Ok(Self::view(model, recipients, &departments))
    }

    /// Update a tracker's own fields and optionally replace its attachment.
    pub async fn update(
        &self,
        actor: &CurrentUser,
        id: &str,
        input: UpdateTrackerInput,
    ) -> AppResult<TrackerView> {
        let current = self.tracker_repo.get_by_id(id).await?;

        let mut issues = Vec::new();
        let from_name = optional_text(input.from_name, "fromName", &mut issues);
        let document_title = optional_text(input.document_title, "documentTitle", &mut issues);
        let date_received = date_field(
            input.date_received.as_deref().filter(|s| !s.trim().is_empty()),
            "dateReceived",
            &mut issues,
        );
        if !issues.is_empty() {
            return Err(AppError::InvalidFields(issues));
        }
        if let Some(upload) = &input.attachment {
            self.check_attachment(upload)?;
        }

        let mut updated = current.clone();
        let mut changes = Map::new();

        if let Some(from_name) = from_name {
            if from_name != updated.from_name {
                changes.insert("fromName".to_string(), json!(from_name));
                updated.from_name = from_name;
            }
        }
        if let Some(document_title) = document_title {
            if document_title != updated.document_title {
                changes.insert("documentTitle".to_string(), json!(document_title));
                updated.document_title = document_title;
            }
        }
        if let Some(date_received) = date_received {
            if date_received != updated.date_received {
                changes.insert("dateReceived".to_string(), json!(date_received.to_rfc3339()));
                updated.date_received = date_received;
            }
        }

        let attachment_data = match input.attachment {
            Some(upload) => {
                changes.insert("attachment".to_string(), json!(upload.file_name));
                updated.attachment_mime = Some(normalize_mime(&upload.mime_type));
                updated.attachment_size = i64::try_from(upload.data.len()).ok();
                updated.attachment_name = Some(upload.file_name);
                Some(upload.data)
            }
            None => None,
        };

        if changes.is_empty() {
            tracing::debug!(tracker_id = %id, "Tracker update changed nothing");
            return self.view_of(current).await;
        }

        updated.updated_at = Some(Utc::now().into());
        let changed: Vec<String> = changes.keys().cloned().collect();
        let audit = self.audit_entry(id, AuditAction::Update, actor, Value::Object(changes));
        self.tracker_repo
            .update(updated.clone(), attachment_data, Some(audit))
            .await?;

        tracing::info!(tracker_id = %id, actor_id = %actor.id, ?changed, "Tracker updated");
        self.view_of(updated).await
    }

    /// Update one recipient entry. Only a member of the recipient's department
    /// may do so.
    pub async fn update_recipient(
        &self,
        actor: &CurrentUser,
        tracker_id: &str,
        recipient_id: &str,
        input: UpdateRecipientInput,
    ) -> AppResult<RecipientView> {
        self.tracker_repo.get_by_id(tracker_id).await?;
        let recipient = self
            .tracker_repo
            .find_recipient(tracker_id, recipient_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Recipient not found: {recipient_id}")))?;

        policy::authorize_for_department(
            actor,
            Operation::UpdateRecipient,
            &recipient.department_id,
        )?;

        let mut issues = Vec::new();
        let status = match input.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => match raw.parse::<RecipientStatus>() {
                Ok(status) => Some(status),
                Err(_) => {
                    issues.push(FieldIssue::new("status", format!("Unknown status: {raw}")));
                    None
                }
            },
        };
        let date_seen = date_field(
            input.date_seen.as_deref().filter(|s| !s.trim().is_empty()),
            "dateSeen",
            &mut issues,
        );
        if !issues.is_empty() {
            return Err(AppError::InvalidFields(issues));
        }

        if let Some(status) = status {
            if self.lock_final_status && recipient.status.is_final() && status != recipient.status
            {
                return Err(AppError::Conflict(format!(
                    "Recipient status '{}' is final",
                    recipient.status
                )));
            }
        }

        let mut active = tracker_recipient::ActiveModel::default();
        let mut changes = Map::new();
        let mut updated = recipient.clone();

        if let Some(status) = status {
            active.status = Set(status);
            changes.insert("status".to_string(), json!(status));
            updated.status = status;
        }
        if let Some(remarks) = input.remarks {
            let remarks = Some(remarks.trim().to_string()).filter(|r| !r.is_empty());
            changes.insert("remarks".to_string(), json!(remarks));
            active.remarks = Set(remarks.clone());
            updated.remarks = remarks;
        }
        if let Some(is_seen) = input.is_seen {
            active.is_seen = Set(is_seen);
            changes.insert("isSeen".to_string(), json!(is_seen));
            updated.is_seen = is_seen;
        }

        let flipped_to_seen = input.is_seen == Some(true) && !recipient.is_seen;
        let date_seen = date_seen.or_else(|| flipped_to_seen.then(|| Utc::now().into()));
        if let Some(date_seen) = date_seen {
            active.date_seen = Set(Some(date_seen));
            changes.insert("dateSeen".to_string(), json!(date_seen.to_rfc3339()));
            updated.date_seen = Some(date_seen);
        }

        let department = self
            .department_repo
            .find_by_id(&recipient.department_id)
            .await?;

        if changes.is_empty() {
            return Ok(Self::recipient_view(recipient, department.as_ref()));
        }

        changes.insert("recipientId".to_string(), json!(recipient_id));
        changes.insert(
            "receivingDepartment".to_string(),
            json!(recipient.department_id),
        );
        let audit = self.audit_entry(tracker_id, AuditAction::Update, actor, Value::Object(changes));

        self.tracker_repo
            .update_recipient(tracker_id, recipient_id, active, audit)
            .await?;

        tracing::info!(
            tracker_id = %tracker_id,
            recipient_id = %recipient_id,
            actor_id = %actor.id,
            status = %updated.status,
            "Recipient updated"
        );
        Ok(Self::recipient_view(updated, department.as_ref()))
    }

    /// Delete a tracker and everything it owns.
    pub async fn delete(&self, actor: &CurrentUser, id: &str) -> AppResult<()> {
        self.tracker_repo.delete(id).await?;
        tracing::info!(tracker_id = %id, actor_id = %actor.id, "Tracker deleted");
        Ok(())
    }

    /// Full record including the audit trail.
    pub async fn get(&self, id: &str) -> AppResult<TrackerDetail> {
        let model = self.tracker_repo.get_by_id(id).await?;
        let tracker = self.view_of(model).await?;
        let audit_trail = self
            .tracker_repo
            .find_audit(id)
            .await?
            .into_iter()
            .map(AuditView::from)
            .collect();

        Ok(TrackerDetail {
            tracker,
            audit_trail,
        })
    }

    /// Paginated, searchable, sortable listing.
    pub async fn list(&self, query: ListTrackersQuery) -> AppResult<Page<TrackerView>> {
        let request = PageRequest::new(query.page, query.limit);

        let sort = match query.sort_by.as_deref().map(str::trim) {
            None | Some("") => TrackerSortField::default(),
            Some(raw) => raw.parse().map_err(|_| {
                AppError::field(
                    "sortBy",
                    "Must be one of dateReceived, createdAt, documentTitle, fromName",
                )
            })?,
        };
        let order = match query.order.as_deref().map(str::trim) {
            None | Some("") => Order::Desc,
            Some(o) if o.eq_ignore_ascii_case("desc") => Order::Desc,
            Some(o) if o.eq_ignore_ascii_case("asc") => Order::Asc,
            Some(_) => return Err(AppError::field("order", "Must be asc or desc")),
        };
        let search = query.search.as_deref();

        let total = self.tracker_repo.count(search).await?;
        let trackers = self
            .tracker_repo
            .find_page(TrackerPageQuery {
                search,
                sort,
                order,
                limit: request.limit,
                offset: request.offset(),
            })
            .await?;

        let items = self.views_of(trackers).await?;
        Ok(Page::new(items, total, request))
    }

    /// Trackers routed to one department. Every recipient of a matching
    /// tracker is still returned.
    pub async fn filter_by_department(
        &self,
        department_id: &str,
        request: PageRequest,
    ) -> AppResult<Page<TrackerView>> {
        let department_id = department_id.trim();
        if department_id.is_empty() {
            return Err(AppError::field(
                "receivingDepartment",
                "Department is required",
            ));
        }

        let total = self.tracker_repo.count_by_department(department_id).await?;
        let trackers = self
            .tracker_repo
            .find_page_by_department(department_id, request.limit, request.offset())
            .await?;

        let items = self.views_of(trackers).await?;
        Ok(Page::new(items, total, request))
    }

    /// The stored attachment of a tracker.
    pub async fn attachment(&self, id: &str) -> AppResult<AttachmentFile> {
        let model = self.tracker_repo.get_by_id(id).await?;
        let (Some(file_name), Some(mime_type)) = (model.attachment_name, model.attachment_mime)
        else {
            return Err(AppError::NotFound(format!("Tracker has no attachment: {id}")));
        };

        let data = self
            .tracker_repo
            .find_attachment(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Tracker has no attachment: {id}")))?;

        Ok(AttachmentFile {
            file_name,
            mime_type,
            data,
        })
    }

    /// Public status lookup by tracking number.
    pub async fn status(&self, id: &str) -> AppResult<TrackerStatus> {
        if !IdGenerator::is_valid(id) {
            return Err(AppError::NotFound(STATUS_NOT_FOUND.to_string()));
        }

        let Some(model) = self.tracker_repo.find_by_id(id).await? else {
            return Err(AppError::NotFound(STATUS_NOT_FOUND.to_string()));
        };

        let recipients = self
            .tracker_repo
            .find_recipients_with_departments(id)
            .await?
            .into_iter()
            .map(|(recipient, department)| StatusEntry {
                department_name: department.map(|d| d.name).unwrap_or_default(),
                status: recipient.status,
                remarks: recipient.remarks,
            })
            .collect();

        Ok(TrackerStatus {
            tracking_number: model.id,
            document_title: model.document_title,
            date_received: model.date_received,
            recipients,
        })
    }

    fn audit_entry(
        &self,
        tracker_id: &str,
        action: AuditAction,
        actor: &CurrentUser,
        changes: Value,
    ) -> tracker_audit::Model {
        tracker_audit::Model {
            id: self.id_gen.generate(),
            tracker_id: tracker_id.to_string(),
            action,
            actor_id: actor.id.clone(),
            actor_username: actor.username.clone(),
            changes,
            created_at: Utc::now().into(),
        }
    }

    async fn view_of(&self, model: tracker::Model) -> AppResult<TrackerView> {
        let recipients = self.tracker_repo.find_recipients(&model.id).await?;
        let departments = self.departments_of(&recipients).await?;
        Ok(Self::view(model, recipients, &departments))
    }

    async fn departments_of(
        &self,
        recipients: &[tracker_recipient::Model],
    ) -> AppResult<Vec<department::Model>> {
        let department_ids: Vec<String> = recipients
            .iter()
            .map(|r| r.department_id.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        if department_ids.is_empty() {
            return Ok(vec![]);
        }
        self.department_repo.find_by_ids(&department_ids).await
    }

    async fn views_of(&self, trackers: Vec<tracker::Model>) -> AppResult<Vec<TrackerView>> {
        let ids: Vec<String> = trackers.iter().map(|t| t.id.clone()).collect();
        let recipients = self.tracker_repo.find_recipients_for(&ids).await?;
        let departments = self.departments_of(&recipients).await?;

        let mut by_tracker: HashMap<String, Vec<tracker_recipient::Model>> = HashMap::new();
        for recipient in recipients {
            by_tracker
                .entry(recipient.tracker_id.clone())
                .or_default()
                .push(recipient);
        }

        Ok(trackers
            .into_iter()
            .map(|t| {
                let mut recipients = by_tracker.remove(&t.id).unwrap_or_default();
                recipients.sort_by_key(|r| r.position);
                Self::view(t, recipients, &departments)
            })
            .collect())
    }

    fn view(
        model: tracker::Model,
        recipients: Vec<tracker_recipient::Model>,
        departments: &[department::Model],
    ) -> TrackerView {
        let lookup: HashMap<&str, &department::Model> =
            departments.iter().map(|d| (d.id.as_str(), d)).collect();

        let attachment = match (&model.attachment_name, &model.attachment_mime) {
            (Some(name), Some(mime)) => Some(AttachmentMeta {
                file_name: name.clone(),
                mime_type: mime.clone(),
                size: model.attachment_size.unwrap_or_default(),
            }),
            _ => None,
        };

        TrackerView {
            id: model.id,
            from_name: model.from_name,
            document_title: model.document_title,
            date_received: model.date_received,
            created_by: model.created_by,
            attachment,
            recipients: recipients
                .into_iter()
                .map(|r| {
                    let department = lookup.get(r.department_id.as_str()).copied();
                    Self::recipient_view(r, department)
                })
                .collect(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    fn recipient_view(
        model: tracker_recipient::Model,
        department: Option<&department::Model>,
    ) -> RecipientView {
        RecipientView {
            id: model.id,
            receiving_department: model.department_id,
            department: department.map(DepartmentRef::from),
            receive_date: model.receive_date,
            is_seen: model.is_seen,
            date_seen: model.date_seen,
            remarks: model.remarks,
            status: model.status,
        }
    }
}
