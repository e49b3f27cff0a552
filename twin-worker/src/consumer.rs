use std::sync::{Arc, Weak};

use rdkafka::{
    consumer::{Consumer, StreamConsumer},
    error::KafkaError,
    ClientConfig, Message,
};

use fleet_common::envelope::CanonicalTelemetryEnvelope;

use crate::config::Config;

/// Stream consumer over the normalized telemetry topic. Offsets are stored
/// manually so that an envelope is only marked consumed once its twin update
/// has landed in the store; undecodable messages are the exception and get
/// their offset stored immediately so they cannot wedge the partition.
#[derive(Clone)]
pub struct TelemetryConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RecvErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Received empty payload")]
    Empty,
}

#[derive(Debug, thiserror::Error)]
pub enum OffsetErr {
    #[error("Kafka error: {0}")]
    Kafka(#[from] KafkaError),
    #[error("Consumer gone")]
    Gone,
}

impl TelemetryConsumer {
    pub fn new(config: &Config) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", &config.kafka_consumer_group)
            .set("auto.offset.reset", &config.kafka_consumer_offset_reset);

        client_config.set("enable.auto.offset.store", "false");

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[config.kafka_topic.as_str()])?;

        let inner = Inner {
            consumer,
            topic: config.kafka_topic.clone(),
        };
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub async fn recv(&self) -> Result<(CanonicalTelemetryEnvelope, Offset), RecvErr> {
        let message = self.inner.consumer.recv().await?;

        let offset = Offset {
            handle: Arc::downgrade(&self.inner),
            partition: message.partition(),
            offset: message.offset(),
        };

        let Some(payload) = message.payload() else {
            // We auto-store poison pills, panicking on failure
            metrics::counter!("twin_worker_poison_pills_total", "cause" => "empty").increment(1);
            offset.store().unwrap();
            return Err(RecvErr::Empty);
        };

        let envelope = match serde_json::from_slice(payload) {
            Ok(e) => e,
            Err(e) => {
                // We auto-store poison pills, panicking on failure
                metrics::counter!("twin_worker_poison_pills_total", "cause" => "undecodable")
                    .increment(1);
                offset.store().unwrap();
                return Err(RecvErr::Serde(e));
            }
        };

        Ok((envelope, offset))
    }
}

pub struct Offset {
    handle: Weak<Inner>,
    partition: i32,
    offset: i64,
}

impl Offset {
    pub fn store(self) -> Result<(), OffsetErr> {
        let inner = self.handle.upgrade().ok_or(OffsetErr::Gone)?;
        inner
            .consumer
            .store_offset(&inner.topic, self.partition, self.offset)?;
        Ok(())
    }
}
