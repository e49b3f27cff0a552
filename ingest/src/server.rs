use std::future::Future;
use std::sync::Arc;

use health::{ComponentStatus, HealthRegistry};
use time::Duration;
use tokio::net::TcpListener;

use fleet_common::store::RedisTwinStore;
use fleet_common::time::SystemClock;

use crate::adapter::JsonTelemetryAdapter;
use crate::config::Config;
use crate::mqtt::MqttListener;
use crate::router;
use crate::sinks::kafka::KafkaSink;
use crate::sinks::{PrintSink, TelemetrySink};

pub async fn serve<F>(config: Config, listener: TcpListener, shutdown: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let liveness = HealthRegistry::new("liveness");

    let store = Arc::new(
        RedisTwinStore::new(config.redis_url.clone()).expect("failed to create redis client"),
    );
    let timesource = Arc::new(SystemClock::default());
    let adapter = Arc::new(JsonTelemetryAdapter {});

    let sink: Arc<dyn TelemetrySink> = if config.print_sink {
        // Print sink is only used for local debug, don't allow a container with it to run on prod
        liveness
            .register("print_sink".to_string(), Duration::seconds(30))
            .await
            .report_status(ComponentStatus::Unhealthy)
            .await;

        Arc::new(PrintSink {})
    } else {
        let sink_liveness = liveness
            .register("rdkafka".to_string(), Duration::seconds(30))
            .await;
        Arc::new(KafkaSink::new(config.kafka, sink_liveness).expect("failed to start Kafka sink"))
    };

    if config.mqtt.mqtt_enabled {
        let mqtt_liveness = liveness
            .register("mqtt".to_string(), Duration::seconds(60))
            .await;
        let mqtt = MqttListener::new(
            config.mqtt,
            sink.clone(),
            adapter.clone(),
            timesource.clone(),
            mqtt_liveness,
        );
        tokio::spawn(mqtt.run());
    }

    let app = router::router(
        timesource,
        adapter,
        liveness,
        sink,
        store,
        config.export_prometheus,
    );

    tracing::info!("listening on {:?}", listener.local_addr().unwrap());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .unwrap()
}
