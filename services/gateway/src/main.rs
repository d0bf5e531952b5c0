use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use exchange_core::Exchange;
use skill_gateway::{
    auth::{Argon2Hasher, FacebookVerifier, GoogleVerifier, JwtAuth, TokenIssuer},
    config::Config,
    handlers,
    metrics::RequestMetrics,
    services::AuthService,
};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {}", e))?;

    info!("Starting Skill Gateway on port {}", config.server.port);

    let exchange = Arc::new(
        Exchange::open(config.exchange.clone())
            .await
            .context("Failed to open exchange")?,
    );

    let tokens = TokenIssuer::new(&config.auth.jwt_secret, config.auth.token_ttl_hours);
    let google = GoogleVerifier::new(
        config.auth.google_tokeninfo_url.clone(),
        config.auth.google_client_id.clone(),
    )?;
    let facebook = FacebookVerifier::new(config.auth.facebook_graph_url.clone())?;

    let auth_service = Arc::new(AuthService::new(
        exchange.clone(),
        tokens.clone(),
        Arc::new(Argon2Hasher),
        Arc::new(google),
        Arc::new(facebook),
    ));

    let allowed_origins = config.server.allowed_origins.clone();
    let app_exchange = exchange.clone();

    HttpServer::new(move || {
        let cors = if allowed_origins.is_empty() {
            Cors::permissive()
        } else {
            allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
                .allow_any_method()
                .allow_any_header()
        };

        App::new()
            .wrap(JwtAuth::new(tokens.clone()))
            .wrap(RequestMetrics)
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::NormalizePath::trim())
            .app_data(web::Data::new(app_exchange.clone()))
            .app_data(web::Data::new(auth_service.clone()))
            .configure(handlers::configure_routes)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await?;

    info!("HTTP server stopped, flushing exchange");
    exchange.shutdown().await?;

    Ok(())
}
