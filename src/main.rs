use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod application;
mod auth;
mod config;
mod domain;
mod http;
mod identity;
mod messaging;
mod metrics;
mod store;
mod utils;

use application::{AddressUseCase, CustomerUseCase};
use auth::{JwtVerifier, TokenVerifier};
use config::AppConfig;
use identity::{IdentityProvider, KeycloakIdentityProvider};
use messaging::{
    IdentityReconciler, KafkaPublisher, MessageHandler, MessagePublisher, OutboxRelay,
    QueueConsumer, QueueProcessor, ROUTES,
};
use store::PgStore;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,customer_service=debug")),
        )
        .init();

    tracing::info!("🚀 Starting customer service");

    let config = AppConfig::from_env()?;

    // === 1. Connect to Postgres and apply migrations ===
    tracing::info!("Connecting to Postgres...");
    let store = Arc::new(
        PgStore::connect(&config.database_url, config.database_max_connections).await?,
    );
    store.migrate().await?;

    // === 2. Initialize Prometheus metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );

    let metrics_server = metrics::start_metrics_server(metrics.clone(), config.metrics_port);
    actix_web::rt::spawn(async move {
        if let Err(e) = metrics_server.await {
            tracing::error!("Metrics server error: {}", e);
        }
    });

    // === 3. Kafka producer and outbox relay ===
    let publisher: Arc<dyn MessagePublisher> =
        Arc::new(KafkaPublisher::new(&config.kafka_bootstrap_servers)?);

    OutboxRelay::new(
        store.clone(),
        publisher.clone(),
        metrics.clone(),
        config.outbox_poll_interval,
        config.outbox_batch_size,
        config.outbox_retention,
    )
    .spawn();

    // === 4. Identity reconciliation, one consumer per queue ===
    let identity: Arc<dyn IdentityProvider> =
        Arc::new(KeycloakIdentityProvider::new(config.keycloak.clone())?);
    let reconciler: Arc<dyn MessageHandler> =
        Arc::new(IdentityReconciler::new(store.clone(), identity));

    for route in ROUTES.iter() {
        let processor = QueueProcessor::new(
            route,
            reconciler.clone(),
            publisher.clone(),
            metrics.clone(),
            config.reconciliation_retry.clone(),
        );
        QueueConsumer::new(
            &config.kafka_bootstrap_servers,
            &config.kafka_consumer_group,
            processor,
        )?
        .spawn();
    }

    // === 5. Bearer-token verification keys ===
    let http_client = reqwest::Client::builder()
        .timeout(config.keycloak.timeout)
        .build()?;
    let verifier: Arc<dyn TokenVerifier> =
        Arc::new(JwtVerifier::discover(&http_client, &config.jwt_issuer).await?);
    tracing::info!(issuer = %config.jwt_issuer, "🔑 Loaded realm verification keys");

    // === 6. HTTP API ===
    let verifier = web::Data::from(verifier);
    let customers = web::Data::new(CustomerUseCase::new(store.clone()));
    let addresses = web::Data::new(AddressUseCase::new(store.clone(), store));

    tracing::info!(bind = %config.http_bind, "🌐 Serving customer API");
    HttpServer::new(move || {
        App::new()
            .app_data(verifier.clone())
            .app_data(customers.clone())
            .app_data(addresses.clone())
            .configure(http::configure)
    })
    .bind(config.http_bind.as_str())?
    .run()
    .await?;

    tracing::info!("👋 Customer service stopped");
    Ok(())
}
