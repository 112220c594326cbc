//! NetShield Service
//!
//! This is the main entry point for the NetShield service.
//! It initializes the application components and starts the web server.

use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use metrics_exporter_prometheus::PrometheusBuilder;
use redis::Client;
use std::sync::Arc;
use tokio::sync::Mutex;

use netshield_service::api::{self, ApiState};
use netshield_service::config;
use netshield_service::core::{run_notification_loop, Classifier, Notifier, Store, WebhookClient};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    env_logger::init();

    info!("Starting NetShield service...");

    // Load configuration
    let config = config::load_config().expect("Failed to load configuration");
    let config = Arc::new(config);

    // Initialize Redis client
    let redis_client = Client::open(config.redis.url.as_str())
        .expect("Failed to create Redis client");

    // Initialize core components
    let store = Store::new(redis_client);
    let classifier = Classifier::new(config.classifier.clone());
    let notifier = Arc::new(Mutex::new(Notifier::new(&config.notifications)));
    let webhook = config
        .notifications
        .webhook_url
        .clone()
        .map(WebhookClient::new);

    // Install the Prometheus recorder backing the /metrics endpoint
    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install metrics recorder");

    // Drive notifications in the background
    tokio::spawn(run_notification_loop(
        store.clone(),
        notifier,
        webhook,
        config.clone(),
    ));

    // Create API state
    let state = web::Data::new(ApiState {
        classifier,
        store,
        config: config.clone(),
        metrics: Some(metrics_handle),
    });

    // Start HTTP server
    HttpServer::new(move || {
        App::new()
            .wrap(Cors::permissive())
            .app_data(state.clone())
            .configure(api::config)
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
