use async_trait::async_trait;

use crate::model::entity::User;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_by_id(&self, id: i32) -> anyhow::Result<Option<User>>;

    /// Resolve an `X-API-KEY` value to its owning user, enforcing the key's
    /// expiration.
    async fn get_by_api_key(&self, key: &str) -> anyhow::Result<Option<User>>;

    /// Create the user on first sight and bump `last_login`/`login_count`.
    async fn upsert_login(&self, user_cn: &str) -> anyhow::Result<User>;
}
