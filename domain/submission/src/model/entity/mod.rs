pub mod submission;
pub mod user;

#[rustfmt::skip]
pub use {
    submission::{Submission, SubmissionDraft, SubmissionKind},
    user::{ApiKey, User},
};
