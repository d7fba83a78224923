use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::exception::SubmissionResult;
use crate::model::entity::Submission;
use crate::model::vo::{MimeMonthlyStats, SubmissionPage, SubmissionQuery};

#[async_trait]
pub trait SubmissionRepo: Send + Sync {
    /// Insert the record and increment the owning user's submission counter
    /// in one transaction. A colliding `file_id` is reported as
    /// `DuplicateFileId`, never silently ignored.
    async fn create(&self, submission: &Submission) -> SubmissionResult<()>;

    async fn get_by_file_id(&self, file_id: &str) -> anyhow::Result<Option<Submission>>;

    async fn list(&self, query: &SubmissionQuery) -> anyhow::Result<SubmissionPage>;

    async fn count_since(&self, instant: Option<DateTime<Utc>>) -> anyhow::Result<u64>;

    /// Month-bucketed MIME-type histogram over a trailing window.
    async fn mime_type_counts_since(&self, months_back: u32) -> anyhow::Result<MimeMonthlyStats>;
}
