// ============================================================================
// Event Sourcing Core - Generic Abstractions
// ============================================================================
//
// Reusable pieces that know nothing about waste declarations:
// - Aggregate trait (command -> events -> state)
// - Event envelope and serialization helpers
//
// ============================================================================

pub mod aggregate;
pub mod event;

pub use aggregate::Aggregate;
pub use event::{DomainEvent, EventEnvelope, serialize_event, deserialize_event};
