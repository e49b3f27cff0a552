pub mod adapter;
pub mod api;
pub mod config;
pub mod fleet;
pub mod mqtt;
pub mod router;
pub mod server;
pub mod sinks;
pub mod telemetry;
pub mod validation;
