use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use doc_store::MemoryStore;
use event_control::clients::{
    HttpMediaControl, HttpPasswordMailer, S3ObjectStorage, StripeGateway,
};
use event_control::db::tables::{schemas, TableNames};
use event_control::middleware::RequestMetrics;
use event_control::util::SystemClock;
use event_control::{routes, AppState, Config};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("failed to load configuration")?;
    let bind_addr = (config.app.host.clone(), config.app.port);

    let table_names = TableNames {
        events: config.store.events_table.clone(),
        viewers: config.store.viewers_table.clone(),
        payments: config.store.payments_table.clone(),
        sessions: config.store.sessions_table.clone(),
        admins: config.store.admins_table.clone(),
    };
    let store = Arc::new(MemoryStore::new(schemas(&table_names)));

    let media = Arc::new(HttpMediaControl::new(config.media.control_url.clone()));
    let storage = Arc::new(S3ObjectStorage::from_env().await);
    let mailer = Arc::new(HttpPasswordMailer::new(config.media.mailer_url.clone()));
    let gateway = Arc::new(StripeGateway::new(config.payment.gateway_secret_key.clone()));
    let clock = Arc::new(SystemClock);

    let state = web::Data::new(AppState::build(
        &config, store, media, storage, mailer, gateway, clock,
    ));

    tracing::info!(
        host = %config.app.host,
        port = config.app.port,
        env = %config.app.env,
        "starting event-control"
    );

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.app.frontend_url)
            .allowed_methods(["GET", "POST", "PUT", "DELETE"])
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .wrap(cors)
            .wrap(Logger::default())
            .wrap(RequestMetrics)
            .configure(routes::configure_routes)
    })
    .bind(bind_addr)
    .context("failed to bind server")?
    .run()
    .await
    .context("server error")
}
