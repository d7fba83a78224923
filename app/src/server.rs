use std::sync::Arc;

use actix_easy_multipart::MultipartFormConfig;
use actix_web::guard::{self, GuardContext};
use actix_web::http::header;
use actix_web::web;
use service_submission::MAX_UPLOAD_BYTES;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::api;
use crate::infrastructure::config::build_config;
use crate::infrastructure::ServiceProvider;

pub fn run() {
    match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(async_run()),
        Err(e) => eprintln!("Cannot build tokio runtime: {e}"),
    }
}

pub async fn async_run() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match build_config() {
        Ok(x) => x,
        Err(e) => {
            return eprintln!("Cannot build config: {e}");
        }
    };

    let service_provider = match ServiceProvider::build(config).await {
        Ok(x) => Arc::new(x),
        Err(e) => {
            return eprintln!("Cannot build service provider: {e}");
        }
    };

    tokio::select! {
        _ = initialize_web_host(service_provider) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Stopping services (ctrl-c handling).");
            std::process::exit(0);
        }
    }
}

pub async fn initialize_web_host(sp: Arc<ServiceProvider>) {
    let bind_address = sp.config.host.bind_address.clone();
    match actix_web::HttpServer::new(move || {
        actix_web::App::new()
            .wrap(actix_web::middleware::Logger::default())
            .app_data(MultipartFormConfig::default().total_limit(MAX_UPLOAD_BYTES + 1024 * 1024))
            .app_data(web::Data::from(sp.clone()))
            .service(
                // One resource, two POST bodies: multipart uploads carry the
                // file itself, JSON bodies carry a hash.
                web::resource("/submissions")
                    .route(
                        web::post().guard(guard::fn_guard(is_multipart)).to(api::submission::submit_file),
                    )
                    .route(web::post().to(api::submission::submit_hash))
                    .route(web::get().to(api::submission::list)),
            )
            .route("/submissions/stats", web::get().to(api::submission::stats))
            .route(
                "/submissions/mime-type-stats",
                web::get().to(api::submission::mime_type_stats),
            )
            .route("/submissions/{file_id}", web::get().to(api::submission::get_one))
            .route(
                "/submissions/{file_id}/resubmit",
                web::post().to(api::submission::resubmit),
            )
            .route("/status/scanner", web::get().to(api::status::scanner))
            .route("/status/database", web::get().to(api::status::database))
            .route("/reputation/enabled", web::get().to(api::status::reputation_enabled))
    })
    .bind(&bind_address)
    {
        Ok(server) => match server.disable_signals().run().await {
            Ok(_) => info!("Web server stopped successfully."),
            Err(e) => error!("Web server into error: {e}"),
        },
        Err(e) => error!("Cannot bind {bind_address}: {e}"),
    }
}

fn is_multipart(ctx: &GuardContext<'_>) -> bool {
    ctx.head()
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/"))
}
