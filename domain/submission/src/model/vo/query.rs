use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::entity::submission::SubmissionKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascend,
    Descend,
}

/// Listing parameters for the submission table.
#[derive(Debug, Clone)]
pub struct SubmissionQuery {
    pub page: u64,
    pub per_page: u64,
    /// Restrict to submissions of this user id.
    pub just_mine: Option<i32>,
    /// Case-insensitive substring over filename, description, yara hits and
    /// submitter identity.
    pub search: Option<String>,
    pub sort_field: String,
    pub sort_order: SortOrder,
    pub excluded_submitters: Vec<String>,
}

/// One listing row. The raw response is deliberately absent; it is only
/// loaded for single-submission retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionHead {
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    pub kind: SubmissionKind,
    pub mime_types: Vec<String>,
    pub yara_hits: Vec<String>,
    pub scanners_run: Vec<String>,
    pub files_seen: i32,
    pub insights: Vec<String>,
    pub iocs: Vec<String>,
    pub highest_positives: i64,
    pub submitted_by: String,
    pub submitted_description: String,
    pub submitted_at: DateTime<Utc>,
    pub object_key: Option<String>,
    pub object_expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionPage {
    pub page: u64,
    pub pages: u64,
    pub total: u64,
    pub per_page: u64,
    pub has_next: bool,
    pub has_prev: bool,
    pub items: Vec<SubmissionHead>,
}

/// Dashboard counters over trailing windows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScanStats {
    pub all_time: u64,
    pub thirty_days: u64,
    pub seven_days: u64,
    pub twentyfour_hours: u64,
}

/// `month ("%Y-%m") -> mime type -> submission count`.
pub type MimeMonthlyStats = BTreeMap<String, BTreeMap<String, u64>>;
