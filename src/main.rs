use actix_web::middleware::NormalizePath;
use actix_web::web::{self, Data};
use actix_web::{App, HttpResponse, HttpServer};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod utils;

use config::Config;
use db::init_db;

use crate::auth::auth::MaybeAuthUser;
use crate::docs::ApiDoc;
use crate::error::ApiError;
use crate::utils::{email_cache, email_filter, response};
use tracing::{debug, info, warn};
use tracing_appender::rolling;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn health(user: MaybeAuthUser) -> HttpResponse {
    response::ok(
        serde_json::json!({
            "status": "ok",
            "authenticatedAs": user.0.map(|u| u.email),
        }),
        "Success",
    )
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config).await;

    let pool_for_filter_warmup = pool.clone();
    let pool_for_cache_warmup = pool.clone();
    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    // Warm the signup fast paths in the background; the store stays the
    // source of truth if either warmup fails.
    actix_web::rt::spawn(async move {
        if let Err(e) = email_filter::warmup_email_filter(&pool_for_filter_warmup, 100).await {
            warn!(error = ?e, "Failed to warm up email filter");
        }
    });

    actix_web::rt::spawn(async move {
        // Last 30 days of active accounts, in batches of 250
        if let Err(e) = email_cache::warmup_email_cache(&pool_for_cache_warmup, 30, 250).await {
            warn!(error = ?e, "Failed to warm up email cache");
        }
    });

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            // Malformed bodies/queries/paths get the standard envelope
            // instead of actix's default error page.
            .app_data(web::JsonConfig::default().error_handler(|err, _| {
                debug!(error = %err, "Rejected request body");
                ApiError::bad_request("Invalid request data").into()
            }))
            .app_data(web::QueryConfig::default().error_handler(|err, _| {
                debug!(error = %err, "Rejected query string");
                ApiError::bad_request("Invalid request data").into()
            }))
            .app_data(web::PathConfig::default().error_handler(|err, _| {
                debug!(error = %err, "Rejected path parameter");
                ApiError::bad_request("Invalid request data").into()
            }))
            .route("/health", web::get().to(health))
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
