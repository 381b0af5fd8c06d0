// ============================================================================
// Declaration Store - Persistence Seam
// ============================================================================
//
// A store keeps, per declaration, the current snapshot plus its event log,
// and owns the company stats projection. Every write is atomic:
// - snapshot and events land together or not at all
// - the snapshot version must match what the caller loaded
// - tracking numbers are unique across all declarations
// - the stats refresh reads and writes under one per-company lock
//
// Two adapters serialize the same `Declaration`: the in-memory store keeps
// nested documents, the Postgres store keeps flat rows.
//
// ============================================================================

pub mod document;
pub mod row;
mod memory;
mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::aggregation::{DeclarationTotals, MonthPeriod};
use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::{Declaration, DeclarationError, DeclarationEvent, DeclarationQuery};
use crate::event_sourcing::EventEnvelope;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type DeclarationEnvelope = EventEnvelope<DeclarationEvent>;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("declaration {0} not found")]
    NotFound(Uuid),

    #[error("declaration {0} already exists")]
    AlreadyExists(Uuid),

    #[error("tracking number {0} already in use")]
    DuplicateTrackingNumber(String),

    #[error("version conflict on declaration {id}: expected {expected}, found {actual}")]
    VersionConflict { id: Uuid, expected: i64, actual: i64 },

    #[error("stats of company {0} were written concurrently")]
    SerializationConflict(Uuid),

    #[error("stored value cannot be decoded: {0}")]
    Codec(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<StoreError> for DeclarationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => DeclarationError::NotFound(id),
            StoreError::DuplicateTrackingNumber(number) => DeclarationError::TrackingNumberTaken(number),
            StoreError::VersionConflict { id, expected, actual } => {
                DeclarationError::StaleVersion { id, expected, actual }
            }
            StoreError::SerializationConflict(company_id) => DeclarationError::ProjectionConflict(company_id),
            other => DeclarationError::Storage(anyhow::Error::new(other)),
        }
    }
}

#[async_trait]
pub trait DeclarationStore: Send + Sync {
    /// Store a new declaration with its first events
    async fn insert(&self, declaration: &Declaration, events: &[DeclarationEnvelope]) -> Result<(), StoreError>;

    /// Replace the snapshot if it is still at `expected_version`
    async fn update(
        &self,
        declaration: &Declaration,
        expected_version: i64,
        events: &[DeclarationEnvelope],
    ) -> Result<(), StoreError>;

    /// Drop the snapshot; the events are kept
    async fn delete(&self, id: Uuid, expected_version: i64, events: &[DeclarationEnvelope]) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Declaration>, StoreError>;

    async fn find(&self, query: &DeclarationQuery) -> Result<Vec<Declaration>, StoreError>;

    /// Full history, oldest first
    async fn load_events(&self, id: Uuid) -> Result<Vec<DeclarationEnvelope>, StoreError>;

    async fn monthly_totals(&self, company_id: Uuid, period: &MonthPeriod) -> Result<DeclarationTotals, StoreError>;

    /// Recompute the company rollup and overwrite its projection atomically
    async fn refresh_company_stats(
        &self,
        company_id: Uuid,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CompanyStatsProjection, StoreError>;

    async fn company_stats(&self, company_id: Uuid) -> Result<Option<CompanyStatsProjection>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::declaration::ErrorKind;

    #[test]
    fn test_store_errors_map_to_domain_errors() {
        let id = Uuid::new_v4();

        let taken: DeclarationError = StoreError::DuplicateTrackingNumber("BSD-202507-0001".into()).into();
        assert!(matches!(taken, DeclarationError::TrackingNumberTaken(ref n) if n == "BSD-202507-0001"));

        let stale: DeclarationError = StoreError::VersionConflict { id, expected: 2, actual: 3 }.into();
        assert_eq!(stale.kind(), ErrorKind::Conflict);

        let missing: DeclarationError = StoreError::NotFound(id).into();
        assert_eq!(missing.kind(), ErrorKind::NotFound);

        let opaque: DeclarationError = StoreError::Codec("bad status".into()).into();
        assert_eq!(opaque.kind(), ErrorKind::Internal);
        assert_eq!(opaque.to_string(), "Internal storage error");
    }
}
