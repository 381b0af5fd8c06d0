use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::DomainEvent;
use super::derived::DerivedFields;
use super::tracking::TrackingNumber;
use super::value_objects::{DeclarationDetails, DeclarationStatus, DocumentRef, ValidatedBy};

// ============================================================================
// Declaration Events
// ============================================================================

/// Union of everything that can happen to a declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum DeclarationEvent {
    Recorded(DeclarationRecorded),
    Amended(DeclarationAmended),
    StatusChanged(DeclarationStatusChanged),
    DocumentAttached(DocumentAttached),
    TrackingNumberAssigned(TrackingNumberAssigned),
    Deleted(DeclarationDeleted),
}

impl DomainEvent for DeclarationEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DeclarationEvent::Recorded(_) => "DeclarationRecorded",
            DeclarationEvent::Amended(_) => "DeclarationAmended",
            DeclarationEvent::StatusChanged(_) => "DeclarationStatusChanged",
            DeclarationEvent::DocumentAttached(_) => "DocumentAttached",
            DeclarationEvent::TrackingNumberAssigned(_) => "TrackingNumberAssigned",
            DeclarationEvent::Deleted(_) => "DeclarationDeleted",
        }
    }
}

// ============================================================================
// Individual Event Types
// ============================================================================

/// First event of every declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationRecorded {
    pub declaration_id: Uuid,
    pub company_id: Uuid,
    pub declared_by: Uuid,
    pub details: DeclarationDetails,
    pub derived: DerivedFields,
    pub status: DeclarationStatus,
    pub recorded_at: DateTime<Utc>,
}

/// Editable fields replaced, derived metrics recomputed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationAmended {
    pub details: DeclarationDetails,
    pub derived: DerivedFields,
    pub amended_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationStatusChanged {
    pub from: DeclarationStatus,
    pub to: DeclarationStatus,
    pub changed_by: Uuid,
    pub changed_at: DateTime<Utc>,
    /// Present only when entering Processed
    pub validated_by: Option<ValidatedBy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentAttached {
    pub document: DocumentRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingNumberAssigned {
    pub tracking_number: TrackingNumber,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeclarationDeleted {
    pub deleted_by: Uuid,
    pub deleted_at: DateTime<Utc>,
}
