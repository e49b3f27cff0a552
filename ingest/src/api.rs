use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum IngestResponseCode {
    Accepted = 1,
}

#[derive(Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct IngestResponse {
    pub status: IngestResponseCode,
}

/// Terminal failures of one ingestion request. None of these are retried by
/// the service itself: the caller (vehicle or simulator) owns the retry on
/// 503, and client errors must not be retried at all.
#[derive(Error, Debug)]
pub enum IngestError {
    /// Raw input could not be parsed or misses a structurally required field.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// Parsed envelope fails a business-rule precondition.
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("event exceeds the maximum stream message size")]
    EventTooBig,
    #[error("event could not be encoded for the stream")]
    EventEncodingError,

    /// The durable stream rejected or timed out on the publish.
    #[error("ingestion temporarily unavailable, please retry")]
    IngestionUnavailable,
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        match self {
            IngestError::InvalidPayload(_) | IngestError::EventTooBig => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }

            IngestError::ValidationFailed(_) => {
                (StatusCode::UNPROCESSABLE_ENTITY, self.to_string())
            }

            IngestError::EventEncodingError => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }

            IngestError::IngestionUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, self.to_string())
            }
        }
        .into_response()
    }
}
