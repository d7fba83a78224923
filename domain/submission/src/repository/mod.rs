mod submission;
mod user;

#[rustfmt::skip]
pub use {
    submission::SubmissionRepo,
    user::UserRepo,
};
