use async_trait::async_trait;

use crate::model::vo::{NamedBytes, StoredObject};

/// Keeps the original submitted bytes for later resubmission.
#[async_trait]
pub trait ObjectStoreService: Send + Sync {
    fn enabled(&self) -> bool;

    /// Upload under `submissions/{file_id}/{file_name}` and return the key
    /// with its computed retention expiration.
    async fn upload(
        &self,
        file_id: &str,
        file_name: &str,
        bytes: &[u8],
    ) -> anyhow::Result<StoredObject>;

    async fn download(&self, key: &str) -> anyhow::Result<NamedBytes>;

    async fn delete(&self, key: &str) -> anyhow::Result<()>;
}
