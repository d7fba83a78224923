use serde::{Deserialize, Serialize};

use crate::model::vo::scan_record::EnrichedScanRecord;

/// How the bytes of a submission were obtained.
#[derive(Debug, Clone)]
pub enum SubmissionSource {
    /// An interactive or API upload carrying the bytes themselves.
    File { name: String, bytes: Vec<u8> },
    /// A content hash to be resolved through the Reputation Service.
    ReputationHash(String),
}

/// Ephemeral input to the submission pipeline. Exactly one source is set by
/// construction.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub source: SubmissionSource,
    pub description: String,
    pub password: Option<String>,
    pub submitted_from_ip: String,
    pub submitted_from_client: String,
    /// Ask the Scanner to skip its internal response caching.
    pub bypass_cache: bool,
}

/// A named byte stream, e.g. one member extracted from an archive.
#[derive(Debug, Clone)]
pub struct NamedBytes {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Location of an original-bytes copy kept for later resubmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredObject {
    pub key: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositiveLookup {
    pub sha256: String,
    pub positives: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiptMeta {
    pub file_size: i64,
    pub iocs: Vec<String>,
    pub vt_positives: Vec<PositiveLookup>,
}

/// Success payload handed back to the HTTP layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub file_id: String,
    pub response: Vec<EnrichedScanRecord>,
    pub meta: ReceiptMeta,
}
