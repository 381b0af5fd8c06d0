use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::aggregation::{company_rollup, monthly_totals, DeclarationTotals, MonthPeriod};
use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::{Declaration, DeclarationQuery};
use super::document::DeclarationDocument;
use super::{DeclarationEnvelope, DeclarationStore, StoreError};

// ============================================================================
// In-Memory Store
// ============================================================================
//
// Keeps declarations in their nested document form. One RwLock guards the
// whole state, so every write (including the stats refresh) is serialized.
//
// ============================================================================

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, DeclarationDocument>,
    events: HashMap<Uuid, Vec<DeclarationEnvelope>>,
    /// tracking number -> declaration id
    tracking_numbers: HashMap<String, Uuid>,
    stats: HashMap<Uuid, CompanyStatsProjection>,
}

impl MemoryState {
    fn claim_tracking_number(&mut self, declaration: &Declaration) -> Result<(), StoreError> {
        let Some(number) = &declaration.tracking_number else {
            return Ok(());
        };

        match self.tracking_numbers.get(number.as_str()) {
            Some(owner) if *owner != declaration.id => {
                Err(StoreError::DuplicateTrackingNumber(number.to_string()))
            }
            _ => {
                self.tracking_numbers.insert(number.to_string(), declaration.id);
                Ok(())
            }
        }
    }

    fn current_version(&self, id: Uuid) -> Result<i64, StoreError> {
        self.documents
            .get(&id)
            .map(|doc| doc.version)
            .ok_or(StoreError::NotFound(id))
    }

    fn check_version(&self, id: Uuid, expected: i64) -> Result<(), StoreError> {
        let actual = self.current_version(id)?;
        if actual != expected {
            return Err(StoreError::VersionConflict { id, expected, actual });
        }
        Ok(())
    }

    fn append(&mut self, id: Uuid, events: &[DeclarationEnvelope]) {
        self.events.entry(id).or_default().extend_from_slice(events);
    }

    fn declarations(&self) -> impl Iterator<Item = Declaration> + '_ {
        self.documents.values().cloned().map(Declaration::from)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DeclarationStore for MemoryStore {
    async fn insert(&self, declaration: &Declaration, events: &[DeclarationEnvelope]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        if state.documents.contains_key(&declaration.id) {
            return Err(StoreError::AlreadyExists(declaration.id));
        }
        state.claim_tracking_number(declaration)?;

        state.documents.insert(declaration.id, DeclarationDocument::from(declaration));
        state.append(declaration.id, events);

        tracing::debug!(
            declaration_id = %declaration.id,
            event_count = events.len(),
            "Stored new declaration"
        );
        Ok(())
    }

    async fn update(
        &self,
        declaration: &Declaration,
        expected_version: i64,
        events: &[DeclarationEnvelope],
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        state.check_version(declaration.id, expected_version)?;
        state.claim_tracking_number(declaration)?;

        state.documents.insert(declaration.id, DeclarationDocument::from(declaration));
        state.append(declaration.id, events);

        tracing::debug!(
            declaration_id = %declaration.id,
            version = declaration.version,
            "Updated declaration"
        );
        Ok(())
    }

    async fn delete(&self, id: Uuid, expected_version: i64, events: &[DeclarationEnvelope]) -> Result<(), StoreError> {
        let mut state = self.state.write().await;

        state.check_version(id, expected_version)?;

        if let Some(doc) = state.documents.remove(&id) {
            if let Some(number) = doc.bsd_number {
                state.tracking_numbers.remove(number.as_str());
            }
        }
        state.append(id, events);

        tracing::debug!(declaration_id = %id, "Deleted declaration");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Declaration>, StoreError> {
        let state = self.state.read().await;
        Ok(state.documents.get(&id).cloned().map(Declaration::from))
    }

    async fn find(&self, query: &DeclarationQuery) -> Result<Vec<Declaration>, StoreError> {
        let state = self.state.read().await;
        Ok(state.declarations().filter(|d| query.matches(d)).collect())
    }

    async fn load_events(&self, id: Uuid) -> Result<Vec<DeclarationEnvelope>, StoreError> {
        let state = self.state.read().await;
        Ok(state.events.get(&id).cloned().unwrap_or_default())
    }

    async fn monthly_totals(&self, company_id: Uuid, period: &MonthPeriod) -> Result<DeclarationTotals, StoreError> {
        let state = self.state.read().await;
        let declarations: Vec<Declaration> = state.declarations().collect();
        Ok(monthly_totals(&declarations, company_id, period))
    }

    async fn refresh_company_stats(
        &self,
        company_id: Uuid,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CompanyStatsProjection, StoreError> {
        // Held across read and write
        let mut state = self.state.write().await;

        let declarations: Vec<Declaration> = state.declarations().collect();
        let projection = company_rollup(&declarations, company_id).into_projection(company_id, refreshed_at);
        state.stats.insert(company_id, projection.clone());

        Ok(projection)
    }

    async fn company_stats(&self, company_id: Uuid) -> Result<Option<CompanyStatsProjection>, StoreError> {
        let state = self.state.read().await;
        Ok(state.stats.get(&company_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::declaration::aggregate::tests::{details, record_command};
    use crate::domain::declaration::*;
    use crate::event_sourcing::{Aggregate, EventEnvelope};

    async fn stored(store: &MemoryStore, category: WasteCategory, number: Option<u16>) -> Result<Declaration, StoreError> {
        let mut command = record_command(
            details(category, 10.0, QuantityUnit::Kilograms, Destination::Recycling),
            DeclarationStatus::Draft,
        );
        command.tracking_number =
            number.map(|n| TrackingNumber::from_parts(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), n));
        let (declaration, events) = Declaration::open(&command).unwrap();
        let envelopes = EventEnvelope::sequence(declaration.id, 0, events, Uuid::new_v4());

        store.insert(&declaration, &envelopes).await?;
        Ok(declaration)
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = MemoryStore::new();
        let declaration = stored(&store, WasteCategory::Organic, None).await.unwrap();

        assert_eq!(store.get(declaration.id).await.unwrap(), Some(declaration.clone()));
        assert_eq!(store.load_events(declaration.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_tracking_number_is_rejected() {
        let store = MemoryStore::new();
        stored(&store, WasteCategory::Hazardous, Some(42)).await.unwrap();

        let err = stored(&store, WasteCategory::Hazardous, Some(42)).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateTrackingNumber(ref n) if n == "BSD-202507-0042"));

        stored(&store, WasteCategory::Hazardous, Some(43)).await.unwrap();
    }

    #[tokio::test]
    async fn test_stale_update_is_rejected() {
        let store = MemoryStore::new();
        let declaration = stored(&store, WasteCategory::Inert, None).await.unwrap();

        let events = declaration
            .handle_command(&DeclarationCommand::ChangeStatus {
                requested: DeclarationStatus::Declared,
                acting_user: Uuid::new_v4(),
                at: Utc::now(),
            })
            .unwrap();
        let next = declaration.applied(&events).unwrap();
        let envelopes = EventEnvelope::sequence(next.id, declaration.version, events, Uuid::new_v4());

        store.update(&next, declaration.version, &envelopes).await.unwrap();
        let err = store.update(&next, declaration.version, &envelopes).await.unwrap_err();

        assert!(matches!(err, StoreError::VersionConflict { expected: 1, actual: 2, .. }));
    }

    #[tokio::test]
    async fn test_delete_keeps_history_and_frees_number() {
        let store = MemoryStore::new();
        let declaration = stored(&store, WasteCategory::Hazardous, Some(9)).await.unwrap();

        let events = declaration
            .handle_command(&DeclarationCommand::Delete { deleted_by: Uuid::new_v4(), at: Utc::now() })
            .unwrap();
        let envelopes = EventEnvelope::sequence(declaration.id, declaration.version, events, Uuid::new_v4());
        store.delete(declaration.id, declaration.version, &envelopes).await.unwrap();

        assert!(store.get(declaration.id).await.unwrap().is_none());
        assert_eq!(store.load_events(declaration.id).await.unwrap().len(), 3);
        stored(&store, WasteCategory::Hazardous, Some(9)).await.unwrap();
    }

    #[tokio::test]
    async fn test_refresh_writes_projection() {
        let store = MemoryStore::new();
        let declaration = stored(&store, WasteCategory::Organic, None).await.unwrap();
        let company = declaration.company_id;

        assert!(store.company_stats(company).await.unwrap().is_none());

        let now = Utc::now();
        let projection = store.refresh_company_stats(company, now).await.unwrap();
        assert_eq!(projection.total_waste_kg, 10.0);
        assert_eq!(projection.total_recycled_kg, 10.0);
        assert_eq!(store.company_stats(company).await.unwrap(), Some(projection));
    }
}
