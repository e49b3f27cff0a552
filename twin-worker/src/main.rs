use std::sync::Arc;

use axum::routing::get;
use envconfig::Envconfig;
use time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use fleet_common::metrics::{serve, setup_metrics_router};
use fleet_common::store::RedisTwinStore;
use health::HealthRegistry;
use twin_worker::config::Config;
use twin_worker::consumer::TelemetryConsumer;
use twin_worker::error::WorkerError;
use twin_worker::updater::TwinUpdater;

async fn shutdown() {
    let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())
        .expect("failed to register SIGTERM handler");

    let mut interrupt = signal::unix::signal(signal::unix::SignalKind::interrupt())
        .expect("failed to register SIGINT handler");

    tokio::select! {
        _ = term.recv() => {},
        _ = interrupt.recv() => {},
    };

    info!("Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> Result<(), WorkerError> {
    let config = Config::init_from_env().expect("invalid configuration:");

    let log_layer = tracing_subscriber::fmt::layer().with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(log_layer).init();

    let liveness = HealthRegistry::new("liveness");
    let worker_liveness = liveness
        .register("worker".to_string(), Duration::seconds(60))
        .await;

    let store = Arc::new(
        RedisTwinStore::new(config.redis_url.clone()).expect("failed to create redis client"),
    );
    let updater = TwinUpdater::new(store, Duration::seconds(config.twin_ttl_seconds as i64));
    let consumer = TelemetryConsumer::new(&config)?;

    let bind = config.bind_host.clone();
    let registry = liveness.clone();
    tokio::task::spawn(async move {
        let router = setup_metrics_router().route(
            "/_liveness",
            get(move || std::future::ready(registry.get_status())),
        );
        serve(router, &bind)
            .await
            .expect("failed to start serving metrics");
    });

    info!(
        "consuming from {} as group {}",
        config.kafka_topic, config.kafka_consumer_group
    );

    let shutdown = shutdown();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            result = consumer.recv() => {
                let (envelope, offset) = match result {
                    Ok(received) => received,
                    Err(e) => {
                        // Poison pills have already had their offset stored
                        warn!("skipping message: {}", e);
                        continue;
                    }
                };

                match updater.update(&envelope).await {
                    Ok(_) => {
                        worker_liveness.report_healthy().await;
                        // Only mark consumed once the twin write has landed
                        offset.store()?;
                    }
                    Err(e) => {
                        error!("failed to update twin for {}: {}", envelope.vehicle_id, e);
                        // Leave the offset unstored so the broker redelivers
                    }
                }
            }
        }
    }

    Ok(())
}
