use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::exception::SubmissionResult;

/// Client for the external threat-intelligence API.
#[async_trait]
pub trait ReputationService: Send + Sync {
    /// Whether an API key is configured. Enrichment is skipped entirely
    /// when this is false.
    fn enabled(&self) -> bool;

    /// Malicious-detection count for a content hash. Unknown is a data
    /// value: any non-success status or transport failure yields
    /// [`sentinel::LOOKUP_ERROR`](crate::model::vo::sentinel::LOOKUP_ERROR),
    /// never an error.
    async fn lookup_positives(&self, hash: &str) -> i64;

    /// Fetch a password-protected archive bundling the given hashes:
    /// request creation, poll until finished under the configured retry
    /// policy, then download through a one-time URL.
    async fn fetch_bundle(
        &self,
        hashes: &[String],
        password: &str,
        cancel: CancellationToken,
    ) -> SubmissionResult<Vec<u8>>;
}
