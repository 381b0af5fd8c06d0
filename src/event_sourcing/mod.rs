// ============================================================================
// Event Sourcing Infrastructure
// ============================================================================
//
// Generic aggregate/event plumbing. Domain-specific code is in src/domain/,
// persistence of snapshots and event logs is in src/store/.
//
// ============================================================================

mod core;

pub use self::core::*;
