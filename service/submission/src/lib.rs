pub mod insight;
pub mod priority;
mod submit;

#[rustfmt::skip]
pub use {
    submit::{SubmitServiceImpl, BUNDLE_PASSWORD, MAX_UPLOAD_BYTES},
};
