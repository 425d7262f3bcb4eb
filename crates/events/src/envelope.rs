use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Envelope for an outbound event with stream metadata.
///
/// `stream_id` names the aggregate the event belongs to (for products, the
/// SKU). `sequence_number` is the aggregate version the event was observed
/// at; it never decreases within a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,

    stream_id: String,
    aggregate_type: String,

    sequence_number: u64,

    payload: E,
}

impl<E> EventEnvelope<E> {
    pub fn new(
        event_id: Uuid,
        stream_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self {
            event_id,
            stream_id: stream_id.into(),
            aggregate_type: aggregate_type.into(),
            sequence_number,
            payload,
        }
    }

    /// Wrap a payload with a fresh time-ordered (v7) event id.
    pub fn wrap(
        stream_id: impl Into<String>,
        aggregate_type: impl Into<String>,
        sequence_number: u64,
        payload: E,
    ) -> Self {
        Self::new(Uuid::now_v7(), stream_id, aggregate_type, sequence_number, payload)
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }
}
