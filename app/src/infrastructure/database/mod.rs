pub mod model;

use sea_orm::{ConnectOptions, DatabaseConnection};
use tracing::log::LevelFilter;

/// Thin handle around the sea-orm connection pool.
pub struct Database {
    connection: DatabaseConnection,
}

impl Database {
    pub async fn connect(url: &str) -> anyhow::Result<Self> {
        let mut options = ConnectOptions::new(url.to_owned());
        options.sqlx_logging_level(LevelFilter::Trace);
        let connection = sea_orm::Database::connect(options).await?;
        Ok(Self { connection })
    }

    pub fn get_connection(&self) -> &DatabaseConnection {
        &self.connection
    }

    pub async fn ping(&self) -> bool {
        self.connection.ping().await.is_ok()
    }
}
