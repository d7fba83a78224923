use crate::exception::SubmissionResult;
use crate::model::vo::NamedBytes;

/// Extracts member files from an encrypted archive.
///
/// The container format is sniffed from content, never from the filename.
/// Implementations must release all scratch storage on every exit path.
pub trait ArchiveUnpackService: Send + Sync {
    fn unpack(&self, bytes: &[u8], password: &str) -> SubmissionResult<Vec<NamedBytes>>;
}
