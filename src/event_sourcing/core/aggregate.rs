use uuid::Uuid;
use anyhow::Result;
use super::event::EventEnvelope;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything is written
// 2. Accepted commands produce events, events are facts
// 3. State only changes by applying events
// 4. The persisted snapshot is always the fold of the event log
//
// ============================================================================

/// Generic Aggregate trait
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Create new aggregate from first event
    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    /// Get aggregate ID
    fn aggregate_id(&self) -> Uuid;

    /// Get current version (number of applied events)
    fn version(&self) -> i64;

    /// Copy of the current state with `events` applied
    fn applied(&self, events: &[Self::Event]) -> Result<Self, Self::Error>
    where
        Self: Clone,
    {
        let mut next = self.clone();
        for event in events {
            next.apply_event(event)?;
        }
        Ok(next)
    }

    /// Rebuild state from bare events, first one creates the aggregate
    fn from_events(events: &[Self::Event]) -> Result<Option<Self>, Self::Error> {
        let Some((first, rest)) = events.split_first() else {
            return Ok(None);
        };

        let mut aggregate = Self::apply_first_event(first)?;
        for event in rest {
            aggregate.apply_event(event)?;
        }

        Ok(Some(aggregate))
    }

    /// Load aggregate from event history (reconstruct from events)
    fn load_from_events(events: Vec<EventEnvelope<Self::Event>>) -> Result<Self>
    where
        Self::Error: std::fmt::Display,
    {
        if events.is_empty() {
            anyhow::bail!("No events to load");
        }

        let mut aggregate = Self::apply_first_event(&events[0].event_data)
            .map_err(|e| anyhow::anyhow!("Failed to apply first event: {}", e))?;

        for envelope in events.iter().skip(1) {
            aggregate.apply_event(&envelope.event_data)
                .map_err(|e| anyhow::anyhow!("Failed to apply event {}: {}", envelope.sequence_number, e))?;
        }

        Ok(aggregate)
    }
}
