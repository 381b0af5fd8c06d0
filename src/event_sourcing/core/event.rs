use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use uuid::Uuid;
use chrono::{DateTime, Utc};
use anyhow::Result;

// ============================================================================
// Event Envelope - Event Metadata
// ============================================================================
//
// Wraps domain events with identity, ordering and actor information.
// Generic over the event type.
//
// ============================================================================

/// Generic Event Envelope - wraps any domain event with metadata
///
/// Type Parameter:
/// - `E`: The domain event type (must implement DomainEvent trait)
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EventEnvelope<E> {
    // Event Identity
    pub event_id: Uuid,
    pub aggregate_id: Uuid,
    pub sequence_number: i64,

    // Event Type Information
    pub event_type: String,
    pub event_version: i32,

    // Event Payload
    pub event_data: E,

    // Causation & Correlation
    pub causation_id: Option<Uuid>,
    pub correlation_id: Uuid,

    // Actor Information
    pub user_id: Option<Uuid>,

    // Timing
    pub timestamp: DateTime<Utc>,
}

impl<E: DomainEvent> EventEnvelope<E> {
    pub fn new(
        aggregate_id: Uuid,
        sequence_number: i64,
        event_data: E,
        correlation_id: Uuid,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            aggregate_id,
            sequence_number,
            event_type: event_data.event_type().to_string(),
            event_version: event_data.event_version(),
            event_data,
            causation_id: None,
            correlation_id,
            user_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Wrap a batch of freshly emitted events, numbering them after `current_version`
    pub fn sequence(
        aggregate_id: Uuid,
        current_version: i64,
        events: Vec<E>,
        correlation_id: Uuid,
    ) -> Vec<Self> {
        events
            .into_iter()
            .zip(current_version + 1..)
            .map(|(event, seq)| Self::new(aggregate_id, seq, event, correlation_id))
            .collect()
    }
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// All domain events implement this to be stored in an event log.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Stable name of the concrete event, e.g. "DeclarationRecorded"
    fn event_type(&self) -> &'static str;

    fn event_version(&self) -> i32 { 1 }
}

// ============================================================================
// Event Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: DeserializeOwned>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
    struct TestEvent {
        data: String,
    }

    impl DomainEvent for TestEvent {
        fn event_type(&self) -> &'static str { "TestEvent" }
    }

    #[test]
    fn test_event_envelope_creation() {
        let aggregate_id = Uuid::new_v4();
        let correlation_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();

        let envelope = EventEnvelope::new(
            aggregate_id,
            1,
            TestEvent { data: "test".to_string() },
            correlation_id,
        )
        .with_user(user_id);

        assert_eq!(envelope.aggregate_id, aggregate_id);
        assert_eq!(envelope.sequence_number, 1);
        assert_eq!(envelope.event_type, "TestEvent");
        assert_eq!(envelope.event_version, 1);
        assert_eq!(envelope.correlation_id, correlation_id);
        assert_eq!(envelope.user_id, Some(user_id));
    }

    #[test]
    fn test_sequence_continues_after_current_version() {
        let events = vec![
            TestEvent { data: "a".to_string() },
            TestEvent { data: "b".to_string() },
        ];

        let envelopes = EventEnvelope::sequence(Uuid::new_v4(), 4, events, Uuid::new_v4());

        let seqs: Vec<i64> = envelopes.iter().map(|e| e.sequence_number).collect();
        assert_eq!(seqs, vec![5, 6]);
        assert_eq!(envelopes[0].correlation_id, envelopes[1].correlation_id);
    }

    #[test]
    fn test_event_serialization() {
        let event = TestEvent {
            data: "test data".to_string(),
        };

        let json = serialize_event(&event).unwrap();
        let deserialized: TestEvent = deserialize_event(&json).unwrap();

        assert_eq!(event, deserialized);
    }
}
