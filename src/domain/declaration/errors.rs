use serde::Serialize;
use uuid::Uuid;

use crate::domain::access::Role;
use crate::utils::IsTransient;
use super::value_objects::DeclarationStatus;

// ============================================================================
// Declaration Errors
// ============================================================================

/// One rejected field of a declaration payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { field: field.into(), message: message.into() }
    }
}

/// Every field-level problem found in a payload, in field order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, thiserror::Error)]
#[error("validation failed: {}", summarize(.errors))]
pub struct ValidationErrors {
    pub errors: Vec<FieldError>,
}

impl ValidationErrors {
    pub fn single(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self { errors: vec![FieldError::new(field, message)] }
    }

    pub fn push(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }

    /// `Ok(value)` when nothing was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

fn summarize(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// How a caller should surface an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    /// Client-correctable payload problem
    Validation,
    /// Operation not allowed in the current status
    InvalidTransition,
    NotFound,
    Forbidden,
    /// Retryable collision
    Conflict,
    /// Opaque failure, details only in logs
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeclarationError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: DeclarationStatus,
        to: DeclarationStatus,
    },

    #[error("Declaration can no longer be edited in status {0}")]
    NotEditable(DeclarationStatus),

    #[error("Only draft declarations can be deleted, status is {0}")]
    NotDeletable(DeclarationStatus),

    #[error("Declaration not found: {0}")]
    NotFound(Uuid),

    #[error("Declaration {0} belongs to another company")]
    Forbidden(Uuid),

    #[error("Role {role} is not allowed to {action}")]
    RoleNotPermitted {
        role: Role,
        action: &'static str,
    },

    #[error("Tracking numbers only apply to hazardous waste")]
    TrackingNumberNotApplicable,

    #[error("Declaration already carries tracking number {0}")]
    TrackingNumberAlreadyAssigned(String),

    #[error("Tracking number already in use: {0}")]
    TrackingNumberTaken(String),

    #[error("Concurrent modification of declaration {id}: expected version {expected}, found {actual}")]
    StaleVersion {
        id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error("Company stats for {0} were refreshed concurrently")]
    ProjectionConflict(Uuid),

    #[error("Invalid reporting period {year}-{month:02}")]
    InvalidPeriod {
        year: i32,
        month: u32,
    },

    #[error("Aggregate not initialized")]
    NotInitialized,

    #[error("Internal storage error")]
    Storage(#[source] anyhow::Error),
}

impl DeclarationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeclarationError::Validation(_)
            | DeclarationError::TrackingNumberNotApplicable
            | DeclarationError::InvalidPeriod { .. } => ErrorKind::Validation,
            DeclarationError::InvalidTransition { .. }
            | DeclarationError::NotEditable(_)
            | DeclarationError::NotDeletable(_) => ErrorKind::InvalidTransition,
            DeclarationError::NotFound(_) => ErrorKind::NotFound,
            DeclarationError::Forbidden(_) | DeclarationError::RoleNotPermitted { .. } => {
                ErrorKind::Forbidden
            }
            DeclarationError::TrackingNumberAlreadyAssigned(_)
            | DeclarationError::TrackingNumberTaken(_)
            | DeclarationError::StaleVersion { .. }
            | DeclarationError::ProjectionConflict(_) => ErrorKind::Conflict,
            DeclarationError::NotInitialized | DeclarationError::Storage(_) => ErrorKind::Internal,
        }
    }

    /// Whether repeating the same request may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DeclarationError::TrackingNumberTaken(_)
                | DeclarationError::StaleVersion { .. }
                | DeclarationError::ProjectionConflict(_)
        )
    }
}

/// Collisions and projection races are worth another attempt; a stale
/// version needs the caller to reload first.
impl IsTransient for DeclarationError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            DeclarationError::TrackingNumberTaken(_) | DeclarationError::ProjectionConflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors_display_lists_fields() {
        let mut errors = ValidationErrors::default();
        errors.push("quantity.value", "must be >= 0");
        errors.push("destination", "is required");

        let message = DeclarationError::from(errors).to_string();
        assert!(message.contains("quantity.value: must be >= 0"));
        assert!(message.contains("destination: is required"));
    }

    #[test]
    fn test_error_kinds() {
        let id = Uuid::new_v4();
        assert_eq!(DeclarationError::NotFound(id).kind(), ErrorKind::NotFound);
        assert_eq!(DeclarationError::Forbidden(id).kind(), ErrorKind::Forbidden);
        assert_eq!(
            DeclarationError::NotDeletable(DeclarationStatus::Processed).kind(),
            ErrorKind::InvalidTransition
        );
        assert_eq!(
            DeclarationError::TrackingNumberTaken("BSD-202507-0001".into()).kind(),
            ErrorKind::Conflict
        );
        assert_eq!(
            DeclarationError::Storage(anyhow::anyhow!("connection reset")).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn test_storage_error_message_is_opaque() {
        let err = DeclarationError::Storage(anyhow::anyhow!("password authentication failed"));
        assert_eq!(err.to_string(), "Internal storage error");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_only_collisions_are_transient() {
        let id = Uuid::new_v4();
        assert!(DeclarationError::TrackingNumberTaken("BSD-202507-0001".into()).is_transient());
        assert!(DeclarationError::ProjectionConflict(id).is_transient());
        assert!(!DeclarationError::StaleVersion { id, expected: 1, actual: 2 }.is_transient());
        assert!(!DeclarationError::NotFound(id).is_transient());
    }
}
