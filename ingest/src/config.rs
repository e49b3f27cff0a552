use std::net::SocketAddr;

use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "false")]
    pub print_sink: bool,

    #[envconfig(default = "127.0.0.1:3000")]
    pub address: SocketAddr,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub mqtt: MqttConfig,
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "telemetry.normal")]
    pub kafka_topic: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,
}

#[derive(Envconfig, Clone)]
pub struct MqttConfig {
    #[envconfig(default = "false")]
    pub mqtt_enabled: bool,

    #[envconfig(default = "localhost")]
    pub mqtt_host: String,

    #[envconfig(default = "1883")]
    pub mqtt_port: u16,

    #[envconfig(default = "fleet-ingest")]
    pub mqtt_client_id: String,

    #[envconfig(default = "fleet/telemetry/+")]
    pub mqtt_telemetry_topic: String,

    #[envconfig(default = "fleet/heartbeat/+")]
    pub mqtt_heartbeat_topic: String,
}
