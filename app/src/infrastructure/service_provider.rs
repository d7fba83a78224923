use std::sync::Arc;

use domain_submission::repository::{SubmissionRepo, UserRepo};
use domain_submission::service::{
    ObjectStoreService, ReputationService, ScannerService, SubmitService,
};
use service_submission::SubmitServiceImpl;
use typed_builder::TypedBuilder;

use crate::infrastructure::config::AppConfig;
use crate::infrastructure::database::Database;
use crate::infrastructure::repository::OrmRepo;
use crate::infrastructure::service::{
    ArchiveUnpackServiceImpl, ObjectStoreServiceImpl, ReputationServiceImpl, ScannerServiceImpl,
    TokioSleeper,
};

/// The wired service graph handed to every request handler.
#[derive(TypedBuilder)]
pub struct ServiceProvider {
    pub config: AppConfig,
    pub database: Arc<Database>,
    pub submission_repo: Arc<dyn SubmissionRepo>,
    pub user_repo: Arc<dyn UserRepo>,
    pub scanner: Arc<dyn ScannerService>,
    pub reputation: Arc<dyn ReputationService>,
    pub object_store: Arc<dyn ObjectStoreService>,
    pub submit: Arc<dyn SubmitService>,
}

impl ServiceProvider {
    pub async fn build(config: AppConfig) -> anyhow::Result<Self> {
        let database = Arc::new(Database::connect(&config.database.url).await?);
        let repo = Arc::new(OrmRepo::builder().db(database.clone()).build());
        let submission_repo: Arc<dyn SubmissionRepo> = repo.clone();
        let user_repo: Arc<dyn UserRepo> = repo;

        let scanner: Arc<dyn ScannerService> =
            Arc::new(ScannerServiceImpl::builder().config(config.scanner.clone()).build());
        let reputation: Arc<dyn ReputationService> = Arc::new(
            ReputationServiceImpl::builder()
                .api_key(config.reputation.api_key.clone())
                .base_url(config.reputation.base_url.clone())
                .policy(config.reputation.retry)
                .sleeper(Arc::new(TokioSleeper))
                .build(),
        );
        let object_store: Arc<dyn ObjectStoreService> =
            Arc::new(ObjectStoreServiceImpl::from_config(&config.object_store)?);

        let submit: Arc<dyn SubmitService> = Arc::new(
            SubmitServiceImpl::builder()
                .scanner(scanner.clone())
                .reputation(reputation.clone())
                .object_store(object_store.clone())
                .unpacker(Arc::new(ArchiveUnpackServiceImpl))
                .submission_repo(submission_repo.clone())
                .max_lookups(config.reputation.max_lookups)
                .build(),
        );

        Ok(Self::builder()
            .config(config)
            .database(database)
            .submission_repo(submission_repo)
            .user_repo(user_repo)
            .scanner(scanner)
            .reputation(reputation)
            .object_store(object_store)
            .submit(submit)
            .build())
    }
}
