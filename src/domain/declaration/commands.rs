use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::derived::DerivedFields;
use super::tracking::TrackingNumber;
use super::value_objects::{DeclarationDetails, DeclarationStatus, DocumentRef};

// ============================================================================
// Declaration Commands - Represent user intent
// ============================================================================
//
// Commands carry already-validated fields and their derived metrics; the
// aggregate only decides whether the current state allows them.
//
// ============================================================================

/// Opens a new declaration
#[derive(Debug, Clone)]
pub struct RecordDeclaration {
    pub declaration_id: Uuid,
    pub company_id: Uuid,
    pub declared_by: Uuid,
    pub details: DeclarationDetails,
    pub derived: DerivedFields,
    pub status: DeclarationStatus,
    pub tracking_number: Option<TrackingNumber>,
    pub at: DateTime<Utc>,
}

/// Commands against an existing declaration
#[derive(Debug, Clone)]
pub enum DeclarationCommand {
    Amend {
        details: DeclarationDetails,
        derived: DerivedFields,
        tracking_number: Option<TrackingNumber>,
        at: DateTime<Utc>,
    },
    ChangeStatus {
        requested: DeclarationStatus,
        acting_user: Uuid,
        at: DateTime<Utc>,
    },
    AttachDocument {
        document: DocumentRef,
    },
    AssignTrackingNumber {
        tracking_number: TrackingNumber,
        at: DateTime<Utc>,
    },
    Delete {
        deleted_by: Uuid,
        at: DateTime<Utc>,
    },
}
