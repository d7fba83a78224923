use chrono::{DateTime, Utc};

pub type SubmissionResult<T> = Result<T, SubmissionException>;

/// Pipeline failure taxonomy. Enrichment and object-storage failures are
/// intentionally absent: they degrade inside the orchestrator and never
/// reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum SubmissionException {
    #[error("{reason}")]
    Validation { reason: String },

    #[error("failed to extract files: {reason}")]
    Unpack { reason: String },

    #[error("file type {mime} is not supported for password extraction")]
    UnsupportedArchive { mime: String },

    #[error("failed to submit {file_name} to the scanner: {source}")]
    Scan {
        file_name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("bundle was not ready after {attempts} polling attempts")]
    BundleNotReady { attempts: u32 },

    #[error("{reason}")]
    Bundle { reason: String },

    #[error("submission {file_id} not found")]
    NotFound { file_id: String },

    #[error("the stored file for {file_id} expired at {expired_at}")]
    Expired {
        file_id: String,
        expired_at: DateTime<Utc>,
    },

    #[error("a submission with file id {file_id} already exists")]
    DuplicateFileId { file_id: String },

    #[error("internal error: {source}")]
    Internal {
        #[from]
        #[source]
        source: anyhow::Error,
    },
}

impl SubmissionException {
    /// HTTP status the API layer responds with for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. }
            | Self::Unpack { .. }
            | Self::UnsupportedArchive { .. }
            | Self::BundleNotReady { .. }
            | Self::Bundle { .. } => 400,
            Self::Scan { .. } => 415,
            Self::NotFound { .. } => 404,
            Self::Expired { .. } => 410,
            Self::DuplicateFileId { .. } | Self::Internal { .. } => 500,
        }
    }

    /// Stable summary string for the `{error, details}` payload.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Submission was not successful",
            Self::Unpack { .. } | Self::UnsupportedArchive { .. } => "Failed to unpack file",
            Self::Scan { .. } => "Failed to submit file",
            Self::BundleNotReady { .. } | Self::Bundle { .. } => {
                "Reputation request was not successful"
            }
            Self::NotFound { .. } => "Submission not found",
            Self::Expired { .. } => "File has expired",
            Self::DuplicateFileId { .. } | Self::Internal { .. } => "Submission failed",
        }
    }

    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}
