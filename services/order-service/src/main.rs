use anyhow::{anyhow, Context, Result};
use common::telemetry::{init_telemetry, shutdown_telemetry, TelemetryConfig};
use common::AppConfig;
use domain::OrderValidator;
use futures_util::stream::StreamExt;
use ingestion::{DeadLetterSink, IngestionConsumer, MessageHandler};
use messaging::{OrderConsumer, OrderPublisher};
use order_cache::OrderCache;
use order_orchestrator::{with_deadline, OrderService};
use order_store::{OrderRepository, PostgresOrderStore};
use signal_hook::consts::signal::*;
use signal_hook_tokio::Signals;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

mod handlers;
mod routes;
mod state;

use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    let enable_jaeger = std::env::var("ENABLE_JAEGER")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    init_telemetry(TelemetryConfig {
        service_name: "order-service".to_string(),
        log_level: config.log_level.clone(),
        environment: config.environment.clone(),
        jaeger_endpoint: std::env::var("JAEGER_ENDPOINT").ok(),
        enable_jaeger,
    })
    .map_err(|e| anyhow!("failed to initialize telemetry: {}", e))?;

    info!("Starting order service ({})", config.environment);
    info!("Distributed tracing: {}", if enable_jaeger { "enabled" } else { "disabled" });

    let store = PostgresOrderStore::connect(&config.database)
        .await
        .context("failed to connect to database")?;
    let store: Arc<dyn OrderRepository> = Arc::new(store);

    let cache = Arc::new(match config.cache.max_entries {
        Some(max_entries) => OrderCache::with_capacity(config.cache.ttl, max_entries),
        None => OrderCache::new(config.cache.ttl),
    });
    let service = Arc::new(OrderService::new(store, Arc::clone(&cache)));

    // An empty cache is still usable; reads fall back to the store.
    if let Err(e) = with_deadline(config.http.request_timeout, service.restore_cache()).await {
        warn!("Failed to restore cache at startup: {}", e);
    }

    let shutdown = CancellationToken::new();
    let sweeper = cache.spawn_sweeper(config.cache.sweep_interval, shutdown.clone());

    let publisher = Arc::new(OrderPublisher::new(
        &config.kafka.brokers,
        config.kafka.topic.clone(),
    )?);

    let dead_letters = match &config.kafka.dead_letter_topic {
        Some(topic) => {
            info!("Dead-letter topic: {}", topic);
            let sink = OrderPublisher::new(&config.kafka.brokers, topic.clone())?;
            Some(Arc::new(sink) as Arc<dyn DeadLetterSink>)
        }
        None => {
            warn!("No dead-letter topic configured; failing messages stall their partition");
            None
        }
    };

    let handler = Arc::new(MessageHandler::new(
        OrderValidator::new(),
        Arc::clone(&service),
        config.ingestion.clone(),
        dead_letters,
    ));
    let consumer = OrderConsumer::new(&config.kafka.brokers, &config.kafka.group_id)?;
    let ingestion = IngestionConsumer::new(consumer, config.kafka.topic.clone(), handler);
    let consumer_task = tokio::spawn(ingestion.run(shutdown.clone()));

    // Setup signal handling
    let signals = Signals::new([SIGTERM, SIGINT])?;
    let signals_handle = signals.handle();
    let signal_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let mut signals = signals;
            tokio::select! {
                _ = shutdown.cancelled() => {}
                signal = signals.next() => {
                    if let Some(signal) = signal {
                        info!("Received signal {}, shutting down...", signal);
                    }
                    shutdown.cancel();
                }
            }
        })
    };

    let state = AppState::new(service, publisher, config.http.request_timeout);
    let app = routes::create_router(state, &config.http.static_dir);

    let listener = tokio::net::TcpListener::bind(&config.http.address).await?;
    info!("Order service listening on {}", config.http.address);

    let server = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let drained = shutdown.clone();
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { drained.cancelled().await })
                .await;
            // A server that stops on its own takes the rest of the process with it.
            shutdown.cancel();
            result
        })
    };

    shutdown.cancelled().await;
    info!("Shutting down...");

    match tokio::time::timeout(config.http.shutdown_timeout, server).await {
        Ok(Ok(Ok(()))) => info!("HTTP server stopped gracefully"),
        Ok(Ok(Err(e))) => error!("Server error: {}", e),
        Ok(Err(e)) => error!("Server task failed: {}", e),
        Err(_) => warn!(
            "HTTP server did not drain within {:?}",
            config.http.shutdown_timeout
        ),
    }

    if let Err(e) = consumer_task.await {
        error!("Consumer task failed: {}", e);
    }
    if let Err(e) = sweeper.await {
        error!("Cache sweeper failed: {}", e);
    }

    signals_handle.close();
    let _ = signal_task.await;

    shutdown_telemetry();
    info!("Order service stopped");

    Ok(())
}
