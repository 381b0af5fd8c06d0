use super::errors::DeclarationError;
use super::value_objects::DeclarationStatus;

// ============================================================================
// Declaration Status State Machine
// ============================================================================
//
//   Draft ──► Declared ──► Collected ──► Processed
//     │          │
//     └──────────┴──► Cancelled
//
// Processed and Cancelled are terminal.
//
// ============================================================================

impl DeclarationStatus {
    /// Statuses reachable in one step from `self`
    pub fn allowed_targets(self) -> &'static [DeclarationStatus] {
        use DeclarationStatus::*;
        match self {
            Draft => &[Declared, Cancelled],
            Declared => &[Collected, Cancelled],
            Collected => &[Processed],
            Processed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, requested: DeclarationStatus) -> bool {
        self.allowed_targets().contains(&requested)
    }

    pub fn is_terminal(self) -> bool {
        self.allowed_targets().is_empty()
    }

    /// Field edits are only accepted before collection
    pub fn is_editable(self) -> bool {
        matches!(self, DeclarationStatus::Draft | DeclarationStatus::Declared)
    }

    pub fn is_deletable(self) -> bool {
        self == DeclarationStatus::Draft
    }

    /// Statuses a declaration may be created in
    pub fn is_initial(self) -> bool {
        matches!(self, DeclarationStatus::Draft | DeclarationStatus::Declared)
    }
}

/// Gate a status change request
pub fn check_transition(
    current: DeclarationStatus,
    requested: DeclarationStatus,
) -> Result<(), DeclarationError> {
    if current.can_transition_to(requested) {
        Ok(())
    } else {
        Err(DeclarationError::InvalidTransition { from: current, to: requested })
    }
}
