use std::fmt;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use domain_submission::exception::SubmissionException;

pub mod auth;
pub mod dtos;
pub mod status;
pub mod submission;

pub type ApiResult<T> = Result<T, ApiError>;

/// Pipeline failure carried to the HTTP boundary. Renders as
/// `{error, details}` with the status the exception maps to.
pub struct ApiError(pub SubmissionException);

impl fmt::Debug for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl actix_web::ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.0.summary(),
            "details": self.0.to_string(),
        }))
    }
}

impl From<SubmissionException> for ApiError {
    fn from(exception: SubmissionException) -> Self {
        Self(exception)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(source: anyhow::Error) -> Self {
        Self(SubmissionException::Internal { source })
    }
}
