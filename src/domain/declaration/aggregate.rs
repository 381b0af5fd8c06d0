use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event_sourcing::Aggregate;
use super::commands::{DeclarationCommand, RecordDeclaration};
use super::derived::DerivedFields;
use super::errors::DeclarationError;
use super::events::*;
use super::status::check_transition;
use super::tracking::TrackingNumber;
use super::value_objects::{
    DeclarationDetails, DeclarationStatus, DocumentRef, ValidatedBy, WasteCategory,
};

// ============================================================================
// Declaration Aggregate
// ============================================================================
//
// Canonical in-memory model of one disposal event. Both the flat relational
// row and the nested document are serializations of this struct.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Declaration {
    // Identity
    pub id: Uuid,
    pub version: i64,

    // Ownership
    pub company_id: Uuid,
    pub declared_by: Uuid,

    // User-supplied fields
    #[serde(flatten)]
    pub details: DeclarationDetails,

    // Computed on every create and update
    #[serde(flatten)]
    pub derived: DerivedFields,

    // Lifecycle
    pub status: DeclarationStatus,
    pub tracking_number: Option<TrackingNumber>,
    pub validated_by: Option<ValidatedBy>,
    pub documents: Vec<DocumentRef>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Declaration {
    /// Events opening a new declaration
    pub fn record(command: &RecordDeclaration) -> Result<Vec<DeclarationEvent>, DeclarationError> {
        if !command.status.is_initial() {
            return Err(DeclarationError::InvalidTransition {
                from: DeclarationStatus::Draft,
                to: command.status,
            });
        }

        let mut events = vec![DeclarationEvent::Recorded(DeclarationRecorded {
            declaration_id: command.declaration_id,
            company_id: command.company_id,
            declared_by: command.declared_by,
            details: command.details.clone(),
            derived: command.derived,
            status: command.status,
            recorded_at: command.at,
        })];

        if let Some(tracking_number) = &command.tracking_number {
            if command.details.waste_type.category != WasteCategory::Hazardous {
                return Err(DeclarationError::TrackingNumberNotApplicable);
            }
            events.push(DeclarationEvent::TrackingNumberAssigned(TrackingNumberAssigned {
                tracking_number: tracking_number.clone(),
                assigned_at: command.at,
            }));
        }

        Ok(events)
    }

    /// Build a declaration straight from a creation command
    pub fn open(command: &RecordDeclaration) -> Result<(Self, Vec<DeclarationEvent>), DeclarationError> {
        let events = Self::record(command)?;
        let declaration = Self::from_events(&events)?.ok_or(DeclarationError::NotInitialized)?;
        Ok((declaration, events))
    }

    pub fn can_be_edited(&self) -> bool {
        self.status.is_editable()
    }

    pub fn can_be_deleted(&self) -> bool {
        self.status.is_deletable()
    }

    pub fn quantity_kg(&self) -> f64 {
        self.derived.quantity_kg
    }

    pub fn is_recycled(&self) -> bool {
        self.derived.is_recycled
    }

    /// Apply a status change request and return the resulting declaration
    pub fn transition_status(
        &self,
        requested: DeclarationStatus,
        acting_user: Uuid,
        at: DateTime<Utc>,
    ) -> Result<Self, DeclarationError> {
        let events = self.handle_command(&DeclarationCommand::ChangeStatus {
            requested,
            acting_user,
            at,
        })?;
        self.applied(&events)
    }

    fn ensure_editable(&self) -> Result<(), DeclarationError> {
        if self.can_be_edited() {
            Ok(())
        } else {
            Err(DeclarationError::NotEditable(self.status))
        }
    }

    fn tracking_event(
        &self,
        category: WasteCategory,
        tracking_number: &TrackingNumber,
        at: DateTime<Utc>,
    ) -> Result<DeclarationEvent, DeclarationError> {
        if category != WasteCategory::Hazardous {
            return Err(DeclarationError::TrackingNumberNotApplicable);
        }
        if let Some(existing) = &self.tracking_number {
            return Err(DeclarationError::TrackingNumberAlreadyAssigned(existing.to_string()));
        }

        Ok(DeclarationEvent::TrackingNumberAssigned(TrackingNumberAssigned {
            tracking_number: tracking_number.clone(),
            assigned_at: at,
        }))
    }
}

// ============================================================================
// Aggregate Trait Implementation
// ============================================================================

impl Aggregate for Declaration {
    type Event = DeclarationEvent;
    type Command = DeclarationCommand;
    type Error = DeclarationError;

    fn apply_first_event(event: &Self::Event) -> Result<Self, Self::Error> {
        match event {
            DeclarationEvent::Recorded(e) => Ok(Self {
                id: e.declaration_id,
                version: 1,
                company_id: e.company_id,
                declared_by: e.declared_by,
                details: e.details.clone(),
                derived: e.derived,
                status: e.status,
                tracking_number: None,
                validated_by: None,
                documents: Vec::new(),
                created_at: e.recorded_at,
                updated_at: e.recorded_at,
            }),
            _ => Err(DeclarationError::NotInitialized),
        }
    }

    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
        match event {
            DeclarationEvent::Recorded(_) => {
                // Only valid as the first event
                return Err(DeclarationError::NotInitialized);
            }
            DeclarationEvent::Amended(e) => {
                self.details = e.details.clone();
                self.derived = e.derived;
                self.updated_at = e.amended_at;
            }
            DeclarationEvent::StatusChanged(e) => {
                self.status = e.to;
                if let Some(validated_by) = e.validated_by {
                    self.validated_by = Some(validated_by);
                }
                self.updated_at = e.changed_at;
            }
            DeclarationEvent::DocumentAttached(e) => {
                self.documents.push(e.document.clone());
                self.updated_at = e.document.uploaded_at;
            }
            DeclarationEvent::TrackingNumberAssigned(e) => {
                self.tracking_number = Some(e.tracking_number.clone());
                self.updated_at = e.assigned_at;
            }
            DeclarationEvent::Deleted(e) => {
                // The store drops the snapshot; the log keeps this event
                self.updated_at = e.deleted_at;
            }
        }

        self.version += 1;
        Ok(())
    }

    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            DeclarationCommand::Amend { details, derived, tracking_number, at } => {
                self.ensure_editable()?;

                let mut events = vec![DeclarationEvent::Amended(DeclarationAmended {
                    details: details.clone(),
                    derived: *derived,
                    amended_at: *at,
                })];

                if let Some(tracking_number) = tracking_number {
                    events.push(self.tracking_event(details.waste_type.category, tracking_number, *at)?);
                }

                Ok(events)
            }

            DeclarationCommand::ChangeStatus { requested, acting_user, at } => {
                check_transition(self.status, *requested)?;

                let validated_by = (*requested == DeclarationStatus::Processed).then_some(ValidatedBy {
                    user_id: *acting_user,
                    date: *at,
                });

                Ok(vec![DeclarationEvent::StatusChanged(DeclarationStatusChanged {
                    from: self.status,
                    to: *requested,
                    changed_by: *acting_user,
                    changed_at: *at,
                    validated_by,
                })])
            }

            DeclarationCommand::AttachDocument { document } => {
                self.ensure_editable()?;

                Ok(vec![DeclarationEvent::DocumentAttached(DocumentAttached {
                    document: document.clone(),
                })])
            }

            DeclarationCommand::AssignTrackingNumber { tracking_number, at } => {
                self.ensure_editable()?;
                Ok(vec![self.tracking_event(self.details.waste_type.category, tracking_number, *at)?])
            }

            DeclarationCommand::Delete { deleted_by, at } => {
                if !self.can_be_deleted() {
                    return Err(DeclarationError::NotDeletable(self.status));
                }

                Ok(vec![DeclarationEvent::Deleted(DeclarationDeleted {
                    deleted_by: *deleted_by,
                    deleted_at: *at,
                })])
            }
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
