use std::sync::Arc;
use std::time::Duration;

use health::HealthHandle;
use metrics::counter;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tracing::{debug, error, info, instrument, warn};

use fleet_common::time::TimeSource;

use crate::adapter::TelemetryAdapter;
use crate::config::MqttConfig;
use crate::sinks::TelemetrySink;
use crate::validation::validate;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);
const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Bridges an MQTT broker into the same normalization pipeline as the HTTP
/// endpoint. There is no response channel back to the device, so payloads
/// that fail adaptation or validation are logged and dropped.
pub struct MqttListener {
    config: MqttConfig,
    sink: Arc<dyn TelemetrySink>,
    adapter: Arc<dyn TelemetryAdapter>,
    timesource: Arc<dyn TimeSource>,
    liveness: HealthHandle,
}

impl MqttListener {
    pub fn new(
        config: MqttConfig,
        sink: Arc<dyn TelemetrySink>,
        adapter: Arc<dyn TelemetryAdapter>,
        timesource: Arc<dyn TimeSource>,
        liveness: HealthHandle,
    ) -> MqttListener {
        MqttListener {
            config,
            sink,
            adapter,
            timesource,
            liveness,
        }
    }

    /// Runs until the process exits, reconnecting on broker failures.
    #[instrument(skip_all, fields(host = %self.config.mqtt_host, port = self.config.mqtt_port))]
    pub async fn run(self) {
        loop {
            if let Err(e) = self.run_connection().await {
                error!("MQTT connection error: {}", e);
                counter!("ingest_mqtt_reconnects_total").increment(1);
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    async fn run_connection(&self) -> Result<(), anyhow::Error> {
        let mut options = MqttOptions::new(
            &self.config.mqtt_client_id,
            &self.config.mqtt_host,
            self.config.mqtt_port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(options, EVENT_CHANNEL_CAPACITY);
        client
            .subscribe(&self.config.mqtt_telemetry_topic, QoS::AtLeastOnce)
            .await?;
        client
            .subscribe(&self.config.mqtt_heartbeat_topic, QoS::AtLeastOnce)
            .await?;
        info!(
            "subscribed to {} and {}",
            self.config.mqtt_telemetry_topic, self.config.mqtt_heartbeat_topic
        );

        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.liveness.report_healthy().await;
                    self.handle_message(&publish.topic, &publish.payload).await;
                }
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("connected to MQTT broker");
                    self.liveness.report_healthy().await;
                }
                Ok(Event::Incoming(Packet::PingResp)) => {
                    // Broker answered our keep-alive, the link is up
                    self.liveness.report_healthy().await;
                }
                Ok(_) => {}
                // Hand poll errors back to run() so a single loop owns
                // reconnection and the reconnect counter.
                Err(e) => return Err(e.into()),
            }
        }
    }

    #[instrument(skip(self, payload), fields(payload_size = payload.len()))]
    async fn handle_message(&self, topic: &str, payload: &[u8]) {
        counter!("ingest_events_received_total", "protocol" => "mqtt").increment(1);

        let now = self.timesource.now();
        let mut envelope = match self.adapter.adapt(payload, now) {
            Ok(envelope) => envelope,
            Err(e) => {
                counter!("ingest_events_dropped_total", "cause" => "invalid_payload")
                    .increment(1);
                warn!("dropping MQTT payload: {}", e);
                return;
            }
        };

        envelope.connection =
            fleet_common::envelope::ConnectionMetadata::for_protocol(
                fleet_common::envelope::Protocol::Mqtt,
            );
        if topic_matches(&self.config.mqtt_heartbeat_topic, topic) {
            envelope.connection.is_heartbeat = Some(true);
        }

        if let Err(e) = validate(&envelope) {
            counter!("ingest_events_dropped_total", "cause" => "validation_failed").increment(1);
            warn!("dropping MQTT envelope: {}", e);
            return;
        }

        if let Err(e) = self.sink.publish(envelope).await {
            counter!("ingest_events_dropped_total", "cause" => "publish_error").increment(1);
            error!("failed to publish MQTT envelope: {}", e);
        } else {
            debug!("published MQTT envelope");
        }
    }
}

/// Single-level trailing wildcard matching, enough for the `prefix/+`
/// filters this listener subscribes with.
fn topic_matches(filter: &str, topic: &str) -> bool {
    match filter.strip_suffix('+') {
        Some(prefix) => {
            topic.strip_prefix(prefix).is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
        }
        None => filter == topic,
    }
}
