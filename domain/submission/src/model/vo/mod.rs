pub mod query;
pub mod request;
pub mod retry;
pub mod scan_record;

#[rustfmt::skip]
pub use {
    query::{MimeMonthlyStats, ScanStats, SortOrder, SubmissionHead, SubmissionPage, SubmissionQuery},
    request::{NamedBytes, PositiveLookup, ReceiptMeta, StoredObject, SubmissionReceipt, SubmissionRequest, SubmissionSource},
    retry::{RetryPolicy, Sleeper},
    scan_record::{sentinel, EnrichedScanRecord, Enrichment, ScanRecord},
};
