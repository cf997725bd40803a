//! Department summary report.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Utc};
use doctrack_common::AppResult;
use doctrack_db::{
    entities::{department, tracker_recipient, tracker_recipient::RecipientStatus},
    repositories::TrackerRepository,
};
use serde::Serialize;

/// Recipient entries left unseen for longer than this are reported as overdue.
pub const UNSEEN_THRESHOLD_HOURS: i64 = 24;

/// Aggregated recipient figures for one department.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentSummary {
    pub department: String,
    pub total: u64,
    pub unseen: u64,
    pub unseen_over_24h: u64,
    /// Count per status; every status is present.
    pub statuses: BTreeMap<String, u64>,
}

impl DepartmentSummary {
    fn empty(department: String) -> Self {
        Self {
            department,
            total: 0,
            unseen: 0,
            unseen_over_24h: 0,
            statuses: RecipientStatus::ALL
                .iter()
                .map(|s| (s.as_str().to_string(), 0))
                .collect(),
        }
    }
}

/// Aggregate recipient rows per department name, sorted by name.
#[must_use]
pub fn summarize(
    rows: &[(tracker_recipient::Model, Option<department::Model>)],
    now: DateTime<Utc>,
) -> Vec<DepartmentSummary> {
    let threshold = Duration::hours(UNSEEN_THRESHOLD_HOURS);
    let mut by_name: HashMap<String, DepartmentSummary> = HashMap::new();

    for (recipient, department) in rows {
        let name = department
            .as_ref()
            .map_or_else(|| recipient.department_id.clone(), |d| d.name.clone());
        let summary = by_name
            .entry(name.clone())
            .or_insert_with(|| DepartmentSummary::empty(name));

        summary.total += 1;
        if !recipient.is_seen {
            summary.unseen += 1;
            if now.signed_duration_since(recipient.receive_date) > threshold {
                summary.unseen_over_24h += 1;
            }
        }
        *summary
            .statuses
            .entry(recipient.status.as_str().to_string())
            .or_default() += 1;
    }

    let mut summaries: Vec<DepartmentSummary> = by_name.into_values().collect();
    summaries.sort_by(|a, b| a.department.cmp(&b.department));
    summaries
}

/// Report service.
#[derive(Clone)]
pub struct ReportService {
    tracker_repo: TrackerRepository,
}

impl ReportService {
    /// Create a new report service.
    #[must_use]
    pub const fn new(tracker_repo: TrackerRepository) -> Self {
        Self { tracker_repo }
    }

    /// Per-department summary over every recipient entry.
    pub async fn summary(&self) -> AppResult<Vec<DepartmentSummary>> {
        let rows = self.tracker_repo.all_recipients_with_departments().await?;
        let summaries = summarize(&rows, Utc::now());
        tracing::debug!(
            recipients = rows.len(),
            departments = summaries.len(),
            "Summary report computed"
        );
        Ok(summaries)
    }
}
