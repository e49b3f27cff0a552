use thiserror::Error;

use fleet_common::store::StoreError;

use crate::consumer::{OffsetErr, RecvErr};

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("failed to create consumer: {0}")]
    ConsumerCreation(#[from] rdkafka::error::KafkaError),
    #[error("failed to receive envelope: {0}")]
    Recv(#[from] RecvErr),
    #[error("failed to store offset: {0}")]
    Offset(#[from] OffsetErr),
    #[error("twin store error: {0}")]
    Store(#[from] StoreError),
}
