use actix_easy_multipart::MultipartForm;
use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{Duration, Utc};
use domain_submission::exception::SubmissionException;
use domain_submission::model::vo::{ScanStats, SortOrder, SubmissionQuery, SubmissionRequest, SubmissionSource};
use tokio_util::sync::CancellationToken;

use crate::api::auth::ApiUser;
use crate::api::dtos::{HashSubmission, ListQuery, UploadForm};
use crate::api::{ApiError, ApiResult};
use crate::infrastructure::ServiceProvider;

pub async fn submit_file(
    provider: web::Data<ServiceProvider>,
    user: ApiUser,
    form: MultipartForm<UploadForm>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let form = form.into_inner();
    // The spooled upload can be up to 150 MiB.
    let bytes = tokio::fs::read(form.file.file.path()).await.map_err(|e| {
        ApiError(SubmissionException::Internal { source: e.into() })
    })?;
    let request = SubmissionRequest {
        source: SubmissionSource::File {
            name: form.file.file_name.unwrap_or_default(),
            bytes,
        },
        description: form.description.into_inner(),
        password: form.password.map(|p| p.into_inner()),
        submitted_from_ip: client_ip(&req),
        submitted_from_client: client_name(&req),
        bypass_cache: false,
    };
    let receipt = provider
        .submit
        .submit(request, &user.0, CancellationToken::new())
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn submit_hash(
    provider: web::Data<ServiceProvider>,
    user: ApiUser,
    body: web::Json<HashSubmission>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let body = body.into_inner();
    let request = SubmissionRequest {
        source: SubmissionSource::ReputationHash(body.hash),
        description: body.description,
        password: None,
        submitted_from_ip: client_ip(&req),
        submitted_from_client: client_name(&req),
        bypass_cache: false,
    };
    let receipt = provider
        .submit
        .submit(request, &user.0, CancellationToken::new())
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn list(
    provider: web::Data<ServiceProvider>,
    user: ApiUser,
    query: web::Query<ListQuery>,
) -> ApiResult<HttpResponse> {
    let query = query.into_inner();
    let page = provider
        .submission_repo
        .list(&SubmissionQuery {
            page: query.page.unwrap_or(1).max(1),
            per_page: query.per_page.unwrap_or(provider.config.listing.default_per_page),
            just_mine: query.just_mine.then_some(user.0.id),
            search: query.search.filter(|s| !s.trim().is_empty()),
            sort_field: query.sort.unwrap_or_else(|| "submitted_at".to_owned()),
            sort_order: match query.order.as_deref() {
                Some("asc") => SortOrder::Ascend,
                _ => SortOrder::Descend,
            },
            excluded_submitters: provider.config.listing.excluded_submitters.clone(),
        })
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_one(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
    file_id: web::Path<String>,
) -> ApiResult<HttpResponse> {
    let file_id = file_id.into_inner();
    let submission = provider
        .submission_repo
        .get_by_file_id(&file_id)
        .await?
        .ok_or_else(|| SubmissionException::NotFound {
            file_id: file_id.clone(),
        })?;
    Ok(HttpResponse::Ok().json(submission))
}

pub async fn resubmit(
    provider: web::Data<ServiceProvider>,
    user: ApiUser,
    file_id: web::Path<String>,
    req: HttpRequest,
) -> ApiResult<HttpResponse> {
    let receipt = provider
        .submit
        .resubmit(
            &file_id,
            &user.0,
            &client_ip(&req),
            &client_name(&req),
            CancellationToken::new(),
        )
        .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

pub async fn stats(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
) -> ApiResult<HttpResponse> {
    let now = Utc::now();
    let repo = &provider.submission_repo;
    let stats = ScanStats {
        all_time: repo.count_since(None).await?,
        thirty_days: repo.count_since(Some(now - Duration::days(30))).await?,
        seven_days: repo.count_since(Some(now - Duration::days(7))).await?,
        twentyfour_hours: repo.count_since(Some(now - Duration::hours(24))).await?,
    };
    Ok(HttpResponse::Ok().json(stats))
}

pub async fn mime_type_stats(
    provider: web::Data<ServiceProvider>,
    _user: ApiUser,
) -> ApiResult<HttpResponse> {
    let stats = provider.submission_repo.mime_type_counts_since(6).await?;
    Ok(HttpResponse::Ok().json(stats))
}

fn client_ip(req: &HttpRequest) -> String {
    req.connection_info()
        .realip_remote_addr()
        .unwrap_or("unknown")
        .to_owned()
}

fn client_name(req: &HttpRequest) -> String {
    req.headers()
        .get(actix_web::http::header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
        .to_owned()
}
