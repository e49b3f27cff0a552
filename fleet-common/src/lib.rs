pub mod envelope;
pub mod health_score;
pub mod metrics;
pub mod store;
pub mod time;
pub mod twin;
