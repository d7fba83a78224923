use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::mock;
use tokio_util::sync::CancellationToken;

use crate::exception::SubmissionResult;
use crate::model::entity::{Submission, User};
use crate::model::vo::{
    MimeMonthlyStats, NamedBytes, ScanRecord, Sleeper, StoredObject, SubmissionPage,
    SubmissionQuery,
};
use crate::repository::{SubmissionRepo, UserRepo};
use crate::service::{
    ArchiveUnpackService, ObjectStoreService, ReputationService, ScannerService,
};

mock! {
    pub SubmissionRepo {}
    #[async_trait]
    impl SubmissionRepo for SubmissionRepo {
        async fn create(&self, submission: &Submission) -> SubmissionResult<()>;
        async fn get_by_file_id(&self, file_id: &str) -> anyhow::Result<Option<Submission>>;
        async fn list(&self, query: &SubmissionQuery) -> anyhow::Result<SubmissionPage>;
        async fn count_since(&self, instant: Option<DateTime<Utc>>) -> anyhow::Result<u64>;
        async fn mime_type_counts_since(&self, months_back: u32) -> anyhow::Result<MimeMonthlyStats>;
    }
}

mock! {
    pub UserRepo {}
    #[async_trait]
    impl UserRepo for UserRepo {
        async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<User>>;
        async fn get_by_api_key(&self, key: &str) -> anyhow::Result<Option<User>>;
        async fn upsert_login(&self, user_cn: &str) -> anyhow::Result<User>;
    }
}

mock! {
    pub ScannerService {}
    #[async_trait]
    impl ScannerService for ScannerService {
        async fn scan(
            &self,
            file_name: &str,
            bytes: &[u8],
            bypass_cache: bool,
            cancel: CancellationToken,
        ) -> SubmissionResult<Vec<ScanRecord>>;
        async fn status(&self) -> bool;
    }
}

mock! {
    pub ReputationService {}
    #[async_trait]
    impl ReputationService for ReputationService {
        fn enabled(&self) -> bool;
        async fn lookup_positives(&self, hash: &str) -> i64;
        async fn fetch_bundle(
            &self,
            hashes: &[String],
            password: &str,
            cancel: CancellationToken,
        ) -> SubmissionResult<Vec<u8>>;
    }
}

mock! {
    pub ObjectStoreService {}
    #[async_trait]
    impl ObjectStoreService for ObjectStoreService {
        fn enabled(&self) -> bool;
        async fn upload(
            &self,
            file_id: &str,
            file_name: &str,
            bytes: &[u8],
        ) -> anyhow::Result<StoredObject>;
        async fn download(&self, key: &str) -> anyhow::Result<NamedBytes>;
        async fn delete(&self, key: &str) -> anyhow::Result<()>;
    }
}

mock! {
    pub ArchiveUnpackService {}
    impl ArchiveUnpackService for ArchiveUnpackService {
        fn unpack(&self, bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>>;
    }
}

mock! {
    pub Sleeper {}
    #[async_trait]
    impl Sleeper for Sleeper {
        async fn sleep(&self, duration: Duration);
    }
}
