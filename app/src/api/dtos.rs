use actix_easy_multipart::tempfile::Tempfile;
use actix_easy_multipart::text::Text;
use actix_easy_multipart::MultipartForm;
use serde::Deserialize;

/// `multipart/form-data` upload of the file itself.
#[derive(MultipartForm)]
pub struct UploadForm {
    pub file: Tempfile,
    pub description: Text<String>,
    /// Archive password; defaults to the well-known quarantine password.
    pub password: Option<Text<String>>,
}

/// JSON submission of a content hash to be fetched through the
/// reputation service.
#[derive(Debug, Deserialize)]
pub struct HashSubmission {
    pub description: String,
    pub hash: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
    #[serde(default)]
    pub just_mine: bool,
}
