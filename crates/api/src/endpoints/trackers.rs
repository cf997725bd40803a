//! Tracker endpoints.
//!
//! Create and update take `multipart/form-data` so an attachment can travel
//! with the document fields. Everything else is JSON.

use axum::{
    Router,
    extract::{
        DefaultBodyLimit, Multipart, Path, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{get, post, put},
};
use doctrack_common::{AppError, AppResult};
use doctrack_core::{
    AttachmentUpload, CreateTrackerInput, ListTrackersQuery, Operation, Page, PageRequest,
    RecipientInput, RecipientView, TrackerDetail, TrackerStatus, TrackerView,
    UpdateRecipientInput, UpdateTrackerInput, authorize, authorize_for_department,
};
use serde::Deserialize;

use crate::{
    extractors::{AuthUser, JsonBody, QueryParams},
    middleware::AppState,
    rate_limit::rate_limit_middleware,
    response::{self, ApiResponse},
};

/// Headroom for form fields and multipart framing on top of the file itself.
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

// ==================== Form parsing ====================

/// Fields collected from a tracker form.
#[derive(Debug, Default)]
struct TrackerForm {
    from_name: Option<String>,
    document_title: Option<String>,
    date_received: Option<String>,
    recipients: Vec<RecipientInput>,
    group_ids: Vec<String>,
    attachment: Option<AttachmentUpload>,
}

/// A `recipients` entry: a bare department ID or a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum RecipientField {
    Id(String),
    Entry(RecipientInput),
}

impl From<RecipientField> for RecipientInput {
    fn from(field: RecipientField) -> Self {
        match field {
            RecipientField::Id(id) => Self::department(id),
            RecipientField::Entry(entry) => entry,
        }
    }
}

fn parse_recipients(raw: &str) -> AppResult<Vec<RecipientInput>> {
    let raw = raw.trim();
    let invalid = || {
        AppError::field(
            "recipients",
            "Must be a department ID or a JSON array of IDs or recipient objects",
        )
    };

    if raw.is_empty() {
        Ok(vec![])
    } else if raw.starts_with('[') {
        let items: Vec<RecipientField> = serde_json::from_str(raw).map_err(|_| invalid())?;
        Ok(items.into_iter().map(Into::into).collect())
    } else if raw.starts_with('{') {
        let item: RecipientInput = serde_json::from_str(raw).map_err(|_| invalid())?;
        Ok(vec![item])
    } else {
        Ok(vec![RecipientInput::department(raw)])
    }
}

fn parse_ids(raw: &str, field: &str) -> AppResult<Vec<String>> {
    let raw = raw.trim();
    if raw.is_empty() {
        Ok(vec![])
    } else if raw.starts_with('[') {
        serde_json::from_str(raw)
            .map_err(|_| AppError::field(field, "Must be an ID or a JSON array of IDs"))
    } else {
        Ok(vec![raw.to_string()])
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Request body exceeds the upload limit".to_string())
    } else {
        AppError::BadRequest(err.body_text())
    }
}

async fn text(field: Field<'_>) -> AppResult<String> {
    field.text().await.map_err(multipart_error)
}

async fn read_form(multipart: Result<Multipart, MultipartRejection>) -> AppResult<TrackerForm> {
    let mut multipart = multipart.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let mut form = TrackerForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "attachment" => {
                let file_name = field
                    .file_name()
                    .map(ToString::to_string)
                    .unwrap_or_default();
                let mime_type = field
                    .content_type()
                    .map_or_else(|| "application/octet-stream".to_string(), ToString::to_string);
                let data = field.bytes().await.map_err(multipart_error)?.to_vec();

                // An untouched file input still sends an empty part.
                if file_name.is_empty() && data.is_empty() {
                    continue;
                }
                form.attachment = Some(AttachmentUpload {
                    file_name: if file_name.is_empty() {
                        "attachment".to_string()
                    } else {
                        file_name
                    },
                    mime_type,
                    data,
                });
            }
            "fromName" => form.from_name = Some(text(field).await?),
            "documentTitle" => form.document_title = Some(text(field).await?),
            "dateReceived" => form.date_received = Some(text(field).await?),
            "recipients" | "recipients[]" => {
                let raw = text(field).await?;
                form.recipients.extend(parse_recipients(&raw)?);
            }
            "groupIds" | "groupIds[]" => {
                let raw = text(field).await?;
                form.group_ids.extend(parse_ids(&raw, "groupIds")?);
            }
            _ => {
                tracing::debug!(field = %name, "Ignoring unknown form field");
            }
        }
    }

    Ok(form)
}

/// Keep a file name safe for a quoted `Content-Disposition` parameter.
fn disposition_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

// ==================== Handlers ====================

async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ApiResponse<TrackerView>> {
    authorize(&user, Operation::CreateTracker)?;

    let form = read_form(multipart).await?;
    let tracker = state
        .tracker_service
        .create(
            &user,
            CreateTrackerInput {
                from_name: form.from_name,
                document_title: form.document_title,
                date_received: form.date_received,
                recipients: form.recipients,
                group_ids: form.group_ids,
                attachment: form.attachment,
            },
        )
        .await?;

    Ok(ApiResponse::created(tracker))
}

async fn list(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListTrackersQuery>,
) -> AppResult<ApiResponse<Page<TrackerView>>> {
    authorize(&user, Operation::ListTrackers)?;
    Ok(ApiResponse::ok(state.tracker_service.list(query).await?))
}

/// Department filter query.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentFilterQuery {
    #[serde(alias = "departmentId")]
    pub receiving_department: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

async fn filter_by_department(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    QueryParams(query): QueryParams<DepartmentFilterQuery>,
) -> AppResult<ApiResponse<Page<TrackerView>>> {
    let department_id = query
        .receiving_department
        .as_deref()
        .map(str::trim)
        .unwrap_or_default();

    match department_id {
        "" => authorize(&user, Operation::FilterTrackersByDepartment)?,
        id => authorize_for_department(&user, Operation::FilterTrackersByDepartment, id)?,
    }

    let page = state
        .tracker_service
        .filter_by_department(department_id, PageRequest::new(query.page, query.limit))
        .await?;
    Ok(ApiResponse::ok(page))
}

async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TrackerDetail>> {
    authorize(&user, Operation::ViewTracker)?;
    Ok(ApiResponse::ok(state.tracker_service.get(&id).await?))
}

async fn update(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<ApiResponse<TrackerView>> {
    authorize(&user, Operation::UpdateTracker)?;

    let form = read_form(multipart).await?;
    let tracker = state
        .tracker_service
        .update(
            &user,
            &id,
            UpdateTrackerInput {
                from_name: form.from_name,
                document_title: form.document_title,
                date_received: form.date_received,
                attachment: form.attachment,
            },
        )
        .await?;

    Ok(ApiResponse::ok(tracker))
}

async fn update_recipient(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path((id, recipient_id)): Path<(String, String)>,
    JsonBody(input): JsonBody<UpdateRecipientInput>,
) -> AppResult<ApiResponse<RecipientView>> {
    authorize(&user, Operation::UpdateRecipient)?;

    // Department ownership is checked against the stored recipient.
    let recipient = state
        .tracker_service
        .update_recipient(&user, &id, &recipient_id, input)
        .await?;
    Ok(ApiResponse::ok(recipient))
}

async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authorize(&user, Operation::DeleteTracker)?;
    state.tracker_service.delete(&user, &id).await?;
    Ok(response::ok())
}

async fn attachment(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<impl IntoResponse> {
    authorize(&user, Operation::DownloadAttachment)?;

    let file = state.tracker_service.attachment(&id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, file.mime_type),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    disposition_name(&file.file_name)
                ),
            ),
        ],
        file.data,
    ))
}

/// Public status lookup by tracking number.
async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<ApiResponse<TrackerStatus>> {
    Ok(ApiResponse::ok(state.tracker_service.status(&id).await?))
}

fn upload_limit(state: &AppState) -> DefaultBodyLimit {
    DefaultBodyLimit::max(
        state
            .tracker_service
            .max_attachment_bytes()
            .saturating_add(FORM_OVERHEAD_BYTES),
    )
}

pub fn router(state: &AppState) -> Router<AppState> {
    let limited = || {
        middleware::from_fn_with_state(state.rate_limiter.clone(), rate_limit_middleware)
    };

    Router::new()
        .route("/", get(list).layer(limited()))
        .route("/new", post(create).layer(upload_limit(state)))
        .route("/filter/department", get(filter_by_department))
        .route("/status/{id}", get(status).layer(limited()))
        .route(
            "/{id}",
            get(show)
                .put(update)
                .delete(delete)
                .layer(upload_limit(state)),
        )
        .route("/{id}/attachment", get(attachment))
        .route("/{id}/recipient/{recipient_id}", put(update_recipient))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recipients_forms() {
        assert_eq!(
            parse_recipients("d1").unwrap(),
            vec![RecipientInput::department("d1")]
        );
        assert_eq!(
            parse_recipients(r#"["d1", "d2"]"#).unwrap(),
            vec![
                RecipientInput::department("d1"),
                RecipientInput::department("d2")
            ]
        );

        let mixed = parse_recipients(
            r#"["d1", {"receivingDepartment": "d2", "receiveDate": "2024-03-01"}]"#,
        )
        .unwrap();
        assert_eq!(mixed[1].receiving_department, "d2");
        assert_eq!(mixed[1].receive_date.as_deref(), Some("2024-03-01"));

        let single = parse_recipients(r#"{"receivingDepartment": "d3"}"#).unwrap();
        assert_eq!(single, vec![RecipientInput::department("d3")]);

        assert!(parse_recipients("").unwrap().is_empty());
        assert!(matches!(
            parse_recipients("[1, 2"),
            Err(AppError::InvalidFields(_))
        ));
    }

    #[test]
    fn test_parse_ids() {
        assert_eq!(parse_ids(r#"["g1","g2"]"#, "groupIds").unwrap(), vec!["g1", "g2"]);
        assert_eq!(parse_ids(" g1 ", "groupIds").unwrap(), vec!["g1"]);
        assert!(parse_ids("[g1", "groupIds").is_err());
    }

    #[test]
    fn test_disposition_name() {
        assert_eq!(disposition_name("my \"report\".pdf"), "my _report_.pdf");
        assert_eq!(disposition_name("résumé.pdf"), "r_sum_.pdf");
    }
}
