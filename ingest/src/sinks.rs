use std::sync::Mutex;

use async_trait::async_trait;
use metrics::counter;

use fleet_common::envelope::CanonicalTelemetryEnvelope;

use crate::api::IngestError;

pub mod kafka;

/// Destination of validated envelopes. `publish` is synchronous from the
/// caller's perspective: it only returns once the stream has accepted or
/// rejected the event, so an `Ok` means the reading is durably on its way.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn publish(&self, envelope: CanonicalTelemetryEnvelope) -> Result<(), IngestError>;
}

/// Log-and-drop sink for local development without a broker.
pub struct PrintSink {}

#[async_trait]
impl TelemetrySink for PrintSink {
    async fn publish(&self, envelope: CanonicalTelemetryEnvelope) -> Result<(), IngestError> {
        tracing::info!("normalized envelope: {:?}", envelope);
        counter!("ingest_events_published_total").increment(1);
        Ok(())
    }
}

/// Captures published envelopes in memory. Test double.
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<CanonicalTelemetryEnvelope>>,
}

impl MemorySink {
    pub fn captured(&self) -> Vec<CanonicalTelemetryEnvelope> {
        self.events
            .lock()
            .expect("poisoned MemorySink mutex")
            .clone()
    }
}

#[async_trait]
impl TelemetrySink for MemorySink {
    async fn publish(&self, envelope: CanonicalTelemetryEnvelope) -> Result<(), IngestError> {
        self.events
            .lock()
            .expect("poisoned MemorySink mutex")
            .push(envelope);
        Ok(())
    }
}

/// Always reports the stream as unavailable. Test double for the 503 path.
pub struct FailingSink {}

#[async_trait]
impl TelemetrySink for FailingSink {
    async fn publish(&self, _envelope: CanonicalTelemetryEnvelope) -> Result<(), IngestError> {
        Err(IngestError::IngestionUnavailable)
    }
}
