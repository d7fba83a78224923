use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A principal known to the system. Created on first successful
/// authentication, updated on every login and successful submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    /// External identity (directory common name or API-key owner).
    pub user_cn: String,
    pub first_name: String,
    pub last_name: String,
    pub last_login: Option<DateTime<Utc>>,
    pub login_count: i32,
    pub files_submitted: i32,
}

/// An API key resolved by the auth boundary. Issuance is out of scope; the
/// pipeline only consumes the resolved [`User`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKey {
    pub key: String,
    pub user_cn: String,
    pub expiration: DateTime<Utc>,
}
