pub mod api_key;
pub mod file_submission;
pub mod user;

pub mod prelude {
    #[rustfmt::skip]
    pub use super::{
        api_key::Entity as ApiKeyEntity,
        file_submission::Entity as FileSubmissionEntity,
        user::Entity as UserEntity,
    };
}
