use std::time::Duration;

use async_trait::async_trait;
use health::HealthHandle;
use metrics::{counter, gauge};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, error, info, info_span, instrument, Instrument};

use fleet_common::envelope::CanonicalTelemetryEnvelope;

use crate::api::IngestError;
use crate::config::KafkaConfig;
use crate::sinks::TelemetrySink;

struct KafkaContext {
    liveness: HealthHandle,
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, stats: rdkafka::Statistics) {
        // Signal liveness, as the main rdkafka loop is running and calling us
        self.liveness.report_healthy_blocking();

        gauge!("ingest_kafka_producer_queue_depth").set(stats.msg_cnt as f64);
        gauge!("ingest_kafka_producer_queue_depth_limit").set(stats.msg_max as f64);
        for (_, stats) in stats.brokers {
            let id_string = format!("{}", stats.nodeid);
            counter!("ingest_kafka_broker_tx_errors_total", "broker" => id_string)
                .absolute(stats.txerrs);
        }
    }
}

/// Publishes envelopes to the single normalized-telemetry topic, keyed by
/// vehicle id so that per-vehicle relative order is retained on one
/// partition. Delivery is awaited before returning.
#[derive(Clone)]
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
}

impl KafkaSink {
    pub fn new(config: KafkaConfig, liveness: HealthHandle) -> anyhow::Result<KafkaSink> {
        info!("connecting to Kafka brokers at {}...", config.kafka_hosts);

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("linger.ms", config.kafka_producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            )
            .set("compression.codec", config.kafka_compression_codec)
            .set(
                "queue.buffering.max.kbytes",
                (config.kafka_producer_queue_mib * 1024).to_string(),
            );

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext { liveness })?;

        // Ping the cluster to make sure we can reach brokers, fail after 10 seconds
        drop(producer.client().fetch_metadata(
            Some("__consumer_offsets"),
            Timeout::After(Duration::new(10, 0)),
        )?);
        info!("connected to Kafka brokers");

        Ok(KafkaSink {
            producer,
            topic: config.kafka_topic,
        })
    }

    pub fn flush(&self) -> Result<(), KafkaError> {
        self.producer.flush(Duration::new(30, 0))
    }

    async fn kafka_send(
        producer: FutureProducer<KafkaContext>,
        topic: String,
        envelope: CanonicalTelemetryEnvelope,
    ) -> Result<DeliveryFuture, IngestError> {
        let payload = serde_json::to_string(&envelope).map_err(|e| {
            error!("failed to serialize envelope: {}", e);
            IngestError::EventEncodingError
        })?;

        match producer.send_result(FutureRecord {
            topic: topic.as_str(),
            payload: Some(&payload),
            partition: None,
            key: Some(envelope.partition_key()),
            timestamp: None,
            headers: None,
        }) {
            Ok(ack) => Ok(ack),
            Err((e, _)) => match e.rdkafka_error_code() {
                Some(RDKafkaErrorCode::MessageSizeTooLarge) => {
                    counter!("ingest_events_dropped_total", "cause" => "message_size")
                        .increment(1);
                    Err(IngestError::EventTooBig)
                }
                _ => {
                    counter!("ingest_events_dropped_total", "cause" => "kafka_write_error")
                        .increment(1);
                    error!("failed to produce envelope: {}", e);
                    Err(IngestError::IngestionUnavailable)
                }
            },
        }
    }

    async fn process_ack(delivery: DeliveryFuture) -> Result<(), IngestError> {
        match delivery.await {
            Err(_) => {
                // Cancelled due to timeout while retrying
                counter!("ingest_kafka_produce_errors_total").increment(1);
                error!("failed to produce to Kafka before write timeout");
                Err(IngestError::IngestionUnavailable)
            }
            Ok(Err((KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge), _))) => {
                // Rejected by broker due to message size
                counter!("ingest_events_dropped_total", "cause" => "message_size").increment(1);
                Err(IngestError::EventTooBig)
            }
            Ok(Err((err, _))) => {
                counter!("ingest_kafka_produce_errors_total").increment(1);
                error!("failed to produce to Kafka: {}", err);
                Err(IngestError::IngestionUnavailable)
            }
            Ok(Ok(_)) => {
                counter!("ingest_events_published_total").increment(1);
                Ok(())
            }
        }
    }
}

#[async_trait]
impl TelemetrySink for KafkaSink {
    #[instrument(skip_all, fields(vehicle_id = %envelope.vehicle_id))]
    async fn publish(&self, envelope: CanonicalTelemetryEnvelope) -> Result<(), IngestError> {
        let ack = Self::kafka_send(self.producer.clone(), self.topic.clone(), envelope).await?;
        Self::process_ack(ack)
            .instrument(info_span!("ack_wait"))
            .await
    }
}
