use envconfig::Envconfig;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(default = "0.0.0.0:3301")]
    pub bind_host: String,

    #[envconfig(default = "redis://localhost:6379/")]
    pub redis_url: String,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,

    #[envconfig(default = "telemetry.normal")]
    pub kafka_topic: String,

    #[envconfig(default = "digital-twin-updater")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "earliest")]
    pub kafka_consumer_offset_reset: String,

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    // Twins disappear from the store when nothing refreshes them for this long
    #[envconfig(default = "120")]
    pub twin_ttl_seconds: u32,
}
