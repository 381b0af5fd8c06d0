// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with value objects, events,
// commands, errors, the aggregate itself and its command handler.
//
// This layer only talks to persistence through the store traits.
//
// ============================================================================

pub mod access;
pub mod company;
pub mod declaration;
