use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::exception::SubmissionResult;
use crate::model::vo::ScanRecord;

/// Client for the external file-analysis Scanner.
#[async_trait]
pub trait ScannerService: Send + Sync {
    /// Stream `bytes` to the Scanner and collect one decoded record per
    /// analyzed sub-file, preserving response order. Any transport or
    /// decode failure aborts the whole call; partial results are never
    /// returned.
    async fn scan(
        &self,
        file_name: &str,
        bytes: &[u8],
        bypass_cache: bool,
        cancel: CancellationToken,
    ) -> SubmissionResult<Vec<ScanRecord>>;

    /// TCP reachability probe of the Scanner endpoint.
    async fn status(&self) -> bool;
}
