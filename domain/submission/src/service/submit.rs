use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::exception::SubmissionResult;
use crate::model::entity::User;
use crate::model::vo::{SubmissionReceipt, SubmissionRequest};

/// The submission pipeline: validate, optionally unpack, scan, enrich
/// best-effort, optionally store the original bytes, and persist one
/// consistent record. Failures before persistence leave no trace.
#[async_trait]
pub trait SubmitService: Send + Sync {
    async fn submit(
        &self,
        request: SubmissionRequest,
        user: &User,
        cancel: CancellationToken,
    ) -> SubmissionResult<SubmissionReceipt>;

    /// Replay a stored original file through the pipeline with the
    /// Scanner's cache bypassed.
    async fn resubmit(
        &self,
        file_id: &str,
        user: &User,
        submitted_from_ip: &str,
        submitted_from_client: &str,
        cancel: CancellationToken,
    ) -> SubmissionResult<SubmissionReceipt>;
}
