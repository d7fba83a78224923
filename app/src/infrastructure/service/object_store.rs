use async_trait::async_trait;
use chrono::{Duration, Utc};
use domain_submission::model::vo::{NamedBytes, StoredObject};
use domain_submission::service::ObjectStoreService;
use opendal::services::S3;
use opendal::Operator;
use typed_builder::TypedBuilder;

use crate::infrastructure::config::ObjectStoreConfig;

/// S3-backed store for original submission payloads.
#[derive(TypedBuilder)]
pub struct ObjectStoreServiceImpl {
    operator: Option<Operator>,
    retention_days: i64,
}

impl ObjectStoreServiceImpl {
    pub fn from_config(config: &ObjectStoreConfig) -> anyhow::Result<Self> {
        let operator = if config.enabled {
            let mut builder = S3::default();
            builder
                .endpoint(&config.endpoint)
                .bucket(&config.bucket)
                .region(&config.region)
                .access_key_id(&config.access_key_id)
                .secret_access_key(&config.secret_access_key);
            Some(Operator::new(builder)?.finish())
        } else {
            None
        };
        Ok(Self {
            operator,
            retention_days: config.retention_days,
        })
    }

    fn operator(&self) -> anyhow::Result<&Operator> {
        self.operator.as_ref().ok_or_else(|| anyhow::anyhow!("object storage is not enabled"))
    }
}

#[async_trait]
impl ObjectStoreService for ObjectStoreServiceImpl {
    fn enabled(&self) -> bool {
        self.operator.is_some()
    }

    async fn upload(
        &self,
        file_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredObject> {
        let key = format!("submissions/{file_id}/{file_name}");
        self.operator()?
            .write_with(&key, bytes.to_vec())
            .content_disposition(&content_disposition(file_name))
            .await?;
        Ok(StoredObject {
            key,
            expires_at: Utc::now() + Duration::days(self.retention_days),
        })
    }

    async fn download(&self, key: &str) -> anyhow::Result<NamedBytes> {
        let bytes = self.operator()?.read(key).await?;
        let name = key.rsplit('/').next().unwrap_or(key).to_owned();
        Ok(NamedBytes { name, bytes })
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.operator()?.delete(key).await?;
        Ok(())
    }
}

/// The stored copy downloads under its original name.
fn content_disposition(file_name: &str) -> String {
    format!("attachment; filename=\"{}\"", file_name.replace('"', ""))
}
