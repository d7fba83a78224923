use actix_web::dev::Payload;
use actix_web::error::InternalError;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use domain_submission::model::entity::User;
use futures::future::LocalBoxFuture;

use crate::infrastructure::ServiceProvider;

pub const API_KEY_HEADER: &str = "X-API-KEY";

/// The authenticated caller, resolved from the `X-API-KEY` header.
///
/// Each successful resolution also records the access: the user row is
/// created on first sight and its login counters are bumped.
pub struct ApiUser(pub User);

impl FromRequest for ApiUser {
    type Error = actix_web::Error;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let provider = req.app_data::<web::Data<ServiceProvider>>().cloned();
        let key = req
            .headers()
            .get(API_KEY_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        Box::pin(async move {
            let Some(provider) = provider else {
                return Err(actix_web::error::ErrorInternalServerError(
                    "service provider is not registered",
                ));
            };
            let Some(key) = key else {
                return Err(unauthorized("missing X-API-KEY header"));
            };
            let user = match provider.user_repo.get_by_api_key(&key).await {
                Ok(Some(user)) => user,
                Ok(None) => return Err(unauthorized("invalid or expired api key")),
                Err(error) => {
                    tracing::error!(%error, "Api key lookup failed");
                    return Err(actix_web::error::ErrorInternalServerError(error));
                }
            };
            match provider.user_repo.upsert_login(&user.user_cn).await {
                Ok(user) => Ok(Self(user)),
                Err(error) => {
                    tracing::warn!(%error, user_cn = %user.user_cn, "Failed to record login");
                    Ok(Self(user))
                }
            }
        })
    }
}

fn unauthorized(details: &str) -> actix_web::Error {
    let response = HttpResponse::Unauthorized().json(serde_json::json!({
        "error": "Unauthorized",
        "details": details,
    }));
    InternalError::from_response(details.to_owned(), response).into()
}
