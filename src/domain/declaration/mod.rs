// ============================================================================
// Declaration Domain - Lifecycle of a Waste Disposal Declaration
// ============================================================================
//
// - Value objects (WasteType, Quantity, DeclarationStatus, ...)
// - Validation of candidate payloads
// - Status state machine
// - Derived metrics (kg normalization, recyclability, impact)
// - BSD tracking numbers
// - Events, Commands, Errors
// - Aggregate (Declaration) and its command handler
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod validation;
pub mod status;
pub mod derived;
pub mod tracking;
pub mod events;
pub mod commands;
pub mod aggregate;
pub mod query;
pub mod command_handler;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use validation::{
    validate_declaration, validate_document, DeclarationPayload, DocumentUpload, ValidatedDeclaration,
};
pub use status::check_transition;
pub use derived::{compute_derived_fields, DerivedFields};
pub use tracking::TrackingNumber;
pub use events::*;
pub use commands::*;
pub use aggregate::Declaration;
pub use query::{DeclarationFilter, DeclarationPage, DeclarationQuery, ListRequest, ListSort, ListSummary};
pub use command_handler::DeclarationCommandHandler;
