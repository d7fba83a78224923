use std::collections::BTreeSet;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::vo::scan_record::EnrichedScanRecord;
use crate::model::vo::request::StoredObject;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    /// Interactive or API file upload.
    Upload,
    /// Hash-sourced submission resolved through the Reputation Service.
    ReputationLookup,
    /// Replay of a previously stored original file.
    Resubmission,
}

impl SubmissionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionKind::Upload => "upload",
            SubmissionKind::ReputationLookup => "reputation_lookup",
            SubmissionKind::Resubmission => "resubmission",
        }
    }
}

impl std::str::FromStr for SubmissionKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "upload" => SubmissionKind::Upload,
            "reputation_lookup" => SubmissionKind::ReputationLookup,
            "resubmission" => SubmissionKind::Resubmission,
            other => anyhow::bail!("unknown submission kind: {other}"),
        })
    }
}

/// The durable record of one user-initiated submission.
///
/// Aggregate fields are computed exactly once by [`Submission::assemble`]
/// and never recomputed from the raw response afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: Uuid,
    /// Scanner correlation id of the first record; unique per submission.
    pub file_id: String,
    pub file_name: String,
    pub file_size: i64,
    /// Full ordered enriched response, stored verbatim.
    pub raw_response: Vec<EnrichedScanRecord>,
    pub mime_types: Vec<String>,
    pub yara_hits: Vec<String>,
    pub scanners_run: Vec<String>,
    /// Digest name/value pairs of the first record, `elapsed` dropped.
    pub hashes: Vec<(String, String)>,
    pub files_seen: i32,
    pub insights: Vec<String>,
    pub iocs: Vec<String>,
    /// Highest reputation detection count across records; -1 if none
    /// positive.
    pub highest_positives: i64,
    pub highest_positives_sha256: Option<String>,
    pub kind: SubmissionKind,
    pub submitted_from_ip: String,
    pub submitted_from_client: String,
    pub submitted_by_user_id: i32,
    pub submitted_description: String,
    pub submitted_at: DateTime<Utc>,
    /// Derived from the first record's request time.
    pub processed_at: Option<DateTime<Utc>>,
    pub object_key: Option<String>,
    pub object_expires_at: Option<DateTime<Utc>>,
}

pub struct SubmissionDraft {
    pub file_name: String,
    pub file_size: i64,
    pub records: Vec<EnrichedScanRecord>,
    pub kind: SubmissionKind,
    pub submitted_from_ip: String,
    pub submitted_from_client: String,
    pub submitted_by_user_id: i32,
    pub submitted_description: String,
    pub submitted_at: DateTime<Utc>,
    pub stored_object: Option<StoredObject>,
}

impl Submission {
    /// Builds the persisted row from the enriched response, computing every
    /// derived aggregate.
    pub fn assemble(draft: SubmissionDraft) -> Self {
        let records = &draft.records;
        let first = records.first();

        let file_id = first
            .and_then(|r| r.record.correlation_id())
            .unwrap_or_default()
            .to_owned();
        let processed_at = first
            .and_then(|r| r.record.request_time())
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        let hashes = first.map(|r| r.record.hash_pairs()).unwrap_or_default();

        let mut mime_types = BTreeSet::new();
        let mut yara_hits = BTreeSet::new();
        let mut scanners_run = BTreeSet::new();
        let mut insights = BTreeSet::new();
        let mut iocs = BTreeSet::new();
        let mut highest_positives = -1i64;
        let mut highest_positives_sha256 = None;

        for enriched in records {
            let record = &enriched.record;
            mime_types.extend(record.mime_flavors().iter().cloned());
            yara_hits.extend(record.yara_matches().iter().cloned());
            scanners_run.extend(record.file.scanners.iter().cloned());
            insights.extend(enriched.insights.iter().cloned());
            if let Some(record_iocs) = &record.iocs {
                iocs.extend(record_iocs.iter().map(|i| i.ioc.clone()));
            }
            if let Some(positives) = enriched.positives() {
                if positives > 0 && positives > highest_positives {
                    highest_positives = positives;
                    highest_positives_sha256 = record.sha256();
                }
            }
        }

        Submission {
            id: Uuid::new_v4(),
            file_id,
            file_name: draft.file_name,
            file_size: draft.file_size,
            mime_types: mime_types.into_iter().collect(),
            yara_hits: yara_hits.into_iter().collect(),
            scanners_run: scanners_run.into_iter().collect(),
            hashes,
            files_seen: records.len() as i32,
            insights: insights.into_iter().collect(),
            iocs: iocs.into_iter().collect(),
            highest_positives,
            highest_positives_sha256,
            raw_response: draft.records,
            kind: draft.kind,
            submitted_from_ip: draft.submitted_from_ip,
            submitted_from_client: draft.submitted_from_client,
            submitted_by_user_id: draft.submitted_by_user_id,
            submitted_description: draft.submitted_description,
            submitted_at: draft.submitted_at,
            processed_at,
            object_key: draft.stored_object.as_ref().map(|o| o.key.clone()),
            object_expires_at: draft.stored_object.map(|o| o.expires_at),
        }
    }
}
