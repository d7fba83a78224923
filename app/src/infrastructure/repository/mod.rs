mod submission;
mod user;

use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::infrastructure::database::Database;

pub use submission::{sort_target, SortTarget};

/// sea-orm backed implementation of the domain repository traits.
#[derive(TypedBuilder)]
pub struct OrmRepo {
    db: Arc<Database>,
}

impl OrmRepo {
    pub(crate) fn connection(&self) -> &sea_orm::DatabaseConnection {
        self.db.get_connection()
    }
}
