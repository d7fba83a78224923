use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One Scanner-produced analysis result for one inspected sub-file.
///
/// The Scanner emits these as JSON events over the streaming RPC. Every
/// nested field is modeled as present-or-absent so a malformed or partial
/// event is an ordinary branch, never a panic. Fields the Scanner emits
/// that we do not interpret are preserved verbatim in the flattened maps so
/// the raw response survives a round trip through the database.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(default)]
    pub file: FileInfo,
    #[serde(default)]
    pub scan: ScanResults,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iocs: Option<Vec<Ioc>>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    #[serde(default)]
    pub flavors: Flavors,
    #[serde(default)]
    pub scanners: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<TreeInfo>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Flavors {
    #[serde(default)]
    pub mime: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Extraction-tree links assigned by the Scanner.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TreeInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Per-scanner results. Only the scanners the pipeline interprets are
/// typed; everything else passes through `other`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanResults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<BTreeMap<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<EntropyScan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub yara: Option<YaraScan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pe: Option<PeScan>,
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntropyScan {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct YaraScan {
    #[serde(default)]
    pub matches: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeScan {
    /// Absent when the scanner did not evaluate signing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<Vec<String>>,
    #[serde(default)]
    pub sections: Vec<PeSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compile_time: Option<String>,
    #[serde(default)]
    pub imported: Vec<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entropy: Option<f64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Correlation data assigned by the Scanner per submission.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unix timestamp of the submission as seen by the Scanner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<i64>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ioc {
    #[serde(default)]
    pub ioc: String,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ScanRecord {
    pub fn mime_flavors(&self) -> &[String] {
        &self.file.flavors.mime
    }

    pub fn yara_matches(&self) -> &[String] {
        self.scan.yara.as_ref().map(|y| y.matches.as_slice()).unwrap_or(&[])
    }

    pub fn sha256(&self) -> Option<String> {
        self.scan
            .hash
            .as_ref()
            .and_then(|h| h.get("sha256"))
            .and_then(|v| v.as_str())
            .map(str::to_owned)
    }

    /// Hash digests with the `elapsed` timing key dropped, stringified for
    /// the persisted hash list.
    pub fn hash_pairs(&self) -> Vec<(String, String)> {
        let Some(hash) = &self.scan.hash else {
            return vec![];
        };
        hash.iter()
            .filter(|(k, _)| k.as_str() != "elapsed")
            .map(|(k, v)| {
                let v = match v {
                    Value::String(s) => s.to_owned(),
                    other => other.to_string(),
                };
                (k.to_owned(), v)
            })
            .collect()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.request.as_ref().and_then(|r| r.id.as_deref())
    }

    pub fn request_time(&self) -> Option<i64> {
        self.request.as_ref().and_then(|r| r.time)
    }
}

/// Reputation sentinels carried in the `virustotal` enrichment value.
pub mod sentinel {
    /// The lookup ran and failed (transport error or non-success status).
    pub const LOOKUP_ERROR: i64 = -1;
    /// The record was in budget but no lookup could be made (no sha256).
    pub const NOT_ATTEMPTED: i64 = -2;
    /// The per-submission lookup budget was already spent.
    pub const BUDGET_EXCEEDED: i64 = -3;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    pub virustotal: i64,
}

/// A [`ScanRecord`] plus everything the pipeline derives for it. Built once
/// per record; the underlying record is never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedScanRecord {
    #[serde(flatten)]
    pub record: ScanRecord,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment: Option<Enrichment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub insights: Vec<String>,
}

impl EnrichedScanRecord {
    pub fn positives(&self) -> Option<i64> {
        self.enrichment.map(|e| e.virustotal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_hashes() -> ScanRecord {
        serde_json::from_value(serde_json::json!({
            "file": { "name": "a.exe", "flavors": { "mime": ["application/x-dosexec"] } },
            "scan": {
                "hash": {
                    "md5": "d41d8cd98f00b204e9800998ecf8427e",
                    "sha256": "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
                    "elapsed": 0.0025
                }
            },
            "request": { "id": "abc-123", "time": 1700000000 }
        }))
        .unwrap()
    }

    #[test]
    fn hash_pairs_drop_elapsed() {
        let pairs = record_with_hashes().hash_pairs();
        assert_eq!(pairs.len(), 2);
        assert!(pairs.iter().all(|(k, _)| k != "elapsed"));
    }

    #[test]
    fn unknown_scanner_output_survives_round_trip() {
        let raw = serde_json::json!({
            "file": { "name": "x" },
            "scan": { "exiftool": { "make": "unknown" } }
        });
        let record: ScanRecord = serde_json::from_value(raw).unwrap();
        assert!(record.scan.other.contains_key("exiftool"));
        let back = serde_json::to_value(&record).unwrap();
        assert_eq!(back["scan"]["exiftool"]["make"], "unknown");
    }

    #[test]
    fn enriched_record_keeps_record_fields_flat() {
        let enriched = EnrichedScanRecord {
            record: record_with_hashes(),
            enrichment: Some(Enrichment { virustotal: 12 }),
            insights: vec!["something".into()],
        };
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["file"]["name"], "a.exe");
        assert_eq!(value["enrichment"]["virustotal"], 12);
        let back: EnrichedScanRecord = serde_json::from_value(value).unwrap();
        assert_eq!(back.positives(), Some(12));
        assert_eq!(back.record.correlation_id(), Some("abc-123"));
    }
}
