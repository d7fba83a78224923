use actix_web::{web, HttpResponse};

use crate::api::auth::ApiUser;
use crate::api::ApiResult;
use crate::infrastructure::ServiceProvider;

/// Liveness probe against the scanner frontend's TCP port.
pub async fn scanner(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
) -> ApiResult<HttpResponse> {
    let reachable = provider.scanner.status().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "reachable": reachable })))
}

pub async fn database(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
) -> ApiResult<HttpResponse> {
    let reachable = provider.database.ping().await;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "reachable": reachable })))
}

/// Whether hash submissions and enrichment are available at all, i.e.
/// whether a reputation api key is configured.
pub async fn reputation_enabled(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({ "enabled": provider.reputation.enabled() })))
}
