use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::DeclarationError;
use crate::metrics::Metrics;
use crate::store::DeclarationStore;
use crate::utils::{retry_on_transient, RetryConfig};
use super::totals::{DeclarationTotals, MonthPeriod};

/// Recomputes rollups from the declaration set and owns the stats write-back
pub struct AggregationEngine {
    store: Arc<dyn DeclarationStore>,
    metrics: Arc<Metrics>,
    retry: RetryConfig,
}

impl AggregationEngine {
    pub fn new(store: Arc<dyn DeclarationStore>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics, retry: RetryConfig::default() }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Totals over declarations dated within the month, whatever their status
    pub async fn monthly_aggregate(
        &self,
        company_id: Uuid,
        year: i32,
        month: u32,
    ) -> Result<DeclarationTotals, DeclarationError> {
        let period = MonthPeriod::new(year, month)?;
        let totals = self.store.monthly_totals(company_id, &period).await?;

        tracing::debug!(
            company_id = %company_id,
            year,
            month,
            count = totals.count,
            "Computed monthly aggregate"
        );
        Ok(totals)
    }

    /// Recompute the lifetime rollup and overwrite the company projection
    pub async fn refresh_company_stats(&self, company_id: Uuid) -> Result<CompanyStatsProjection, DeclarationError> {
        let started = Instant::now();

        let result = retry_on_transient(self.retry.clone(), |_attempt| async move {
            self.store
                .refresh_company_stats(company_id, Utc::now())
                .await
                .map_err(DeclarationError::from)
        })
        .await
        .into_result();

        self.metrics.record_stats_refresh(started.elapsed().as_secs_f64(), result.is_ok());

        if let Ok(projection) = &result {
            tracing::debug!(
                company_id = %company_id,
                total_waste_kg = projection.total_waste_kg,
                recycling_rate = projection.recycling_rate(),
                "Refreshed company stats"
            );
        }
        result
    }

    /// Refresh after a mutation; failures are logged and counted, never returned
    pub async fn refresh_best_effort(&self, company_id: Uuid) -> Option<CompanyStatsProjection> {
        match self.refresh_company_stats(company_id).await {
            Ok(projection) => Some(projection),
            Err(e) => {
                tracing::error!(
                    company_id = %company_id,
                    error = %e,
                    source = ?std::error::Error::source(&e),
                    "Company stats refresh failed"
                );
                None
            }
        }
    }

    /// Stored projection, or zeros for a company that never declared anything
    pub async fn company_stats(&self, company_id: Uuid) -> Result<CompanyStatsProjection, DeclarationError> {
        Ok(self
            .store
            .company_stats(company_id)
            .await?
            .unwrap_or_else(|| CompanyStatsProjection::empty(company_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate};
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::domain::declaration::aggregate::tests::{details, record_command};
    use crate::domain::declaration::*;
    use crate::event_sourcing::EventEnvelope;
    use crate::store::{DeclarationEnvelope, MemoryStore, StoreError};

    async fn seed(store: &MemoryStore, company_id: Uuid, kg: f64, destination: Destination, cost: f64, day: u32) {
        let mut d = details(WasteCategory::NonHazardous, kg, QuantityUnit::Kilograms, destination);
        d.declaration_date = NaiveDate::from_ymd_opt(2025, 7, day).unwrap();
        d.cost.amount = cost;
        let mut command = record_command(d, DeclarationStatus::Declared);
        command.company_id = company_id;
        let (declaration, events) = Declaration::open(&command).unwrap();
        let envelopes = EventEnvelope::sequence(declaration.id, 0, events, Uuid::new_v4());
        store.insert(&declaration, &envelopes).await.unwrap();
    }

    fn engine(store: Arc<dyn DeclarationStore>) -> AggregationEngine {
        AggregationEngine::new(store, Arc::new(Metrics::new().unwrap())).with_retry(RetryConfig::immediate(3))
    }

    #[tokio::test]
    async fn test_july_scenario() {
        let store = Arc::new(MemoryStore::new());
        let company = Uuid::new_v4();
        seed(&store, company, 100.0, Destination::Recycling, 10.0, 4).await;
        seed(&store, company, 50.0, Destination::Landfill, 5.0, 22).await;

        let engine = engine(store);
        let totals = engine.monthly_aggregate(company, 2025, 7).await.unwrap();

        assert_eq!(totals.total_quantity_kg, 150.0);
        assert_eq!(totals.total_recycled_kg, 100.0);
        assert_eq!(totals.total_cost, 15.0);
        assert_eq!(totals.count, 2);
    }

    #[tokio::test]
    async fn test_invalid_month_is_rejected() {
        let engine = engine(Arc::new(MemoryStore::new()));
        let err = engine.monthly_aggregate(Uuid::new_v4(), 2025, 13).await.unwrap_err();
        assert!(matches!(err, DeclarationError::InvalidPeriod { month: 13, .. }));
    }

    #[tokio::test]
    async fn test_refresh_twice_gives_same_totals() {
        let store = Arc::new(MemoryStore::new());
        let company = Uuid::new_v4();
        seed(&store, company, 100.0, Destination::Recycling, 10.0, 4).await;
        seed(&store, company, 50.0, Destination::Landfill, 5.0, 22).await;

        let engine = engine(store);
        let first = engine.refresh_company_stats(company).await.unwrap();
        let second = engine.refresh_company_stats(company).await.unwrap();

        assert_eq!(first.total_waste_kg, second.total_waste_kg);
        assert_eq!(first.total_recycled_kg, second.total_recycled_kg);
        assert_eq!(first.total_cost, second.total_cost);
        assert_eq!(second.recycling_rate(), 67.0);
        assert_eq!(engine.company_stats(company).await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_unknown_company_has_zero_stats() {
        let engine = engine(Arc::new(MemoryStore::new()));
        let company = Uuid::new_v4();
        let stats = engine.company_stats(company).await.unwrap();
        assert_eq!(stats, CompanyStatsProjection::empty(company));
    }

    /// Store whose projection write races a given number of times
    struct RacingStore {
        inner: MemoryStore,
        races_left: AtomicU32,
    }

    #[async_trait]
    impl DeclarationStore for RacingStore {
        async fn insert(&self, d: &Declaration, e: &[DeclarationEnvelope]) -> Result<(), StoreError> {
            self.inner.insert(d, e).await
        }
        async fn update(&self, d: &Declaration, v: i64, e: &[DeclarationEnvelope]) -> Result<(), StoreError> {
            self.inner.update(d, v, e).await
        }
        async fn delete(&self, id: Uuid, v: i64, e: &[DeclarationEnvelope]) -> Result<(), StoreError> {
            self.inner.delete(id, v, e).await
        }
        async fn get(&self, id: Uuid) -> Result<Option<Declaration>, StoreError> {
            self.inner.get(id).await
        }
        async fn find(&self, q: &DeclarationQuery) -> Result<Vec<Declaration>, StoreError> {
            self.inner.find(q).await
        }
        async fn load_events(&self, id: Uuid) -> Result<Vec<DeclarationEnvelope>, StoreError> {
            self.inner.load_events(id).await
        }
        async fn monthly_totals(&self, c: Uuid, p: &MonthPeriod) -> Result<DeclarationTotals, StoreError> {
            self.inner.monthly_totals(c, p).await
        }
        async fn refresh_company_stats(&self, c: Uuid, at: DateTime<Utc>) -> Result<CompanyStatsProjection, StoreError> {
            let left = self.races_left.load(Ordering::SeqCst);
            if left > 0 {
                self.races_left.store(left - 1, Ordering::SeqCst);
                return Err(StoreError::SerializationConflict(c));
            }
            self.inner.refresh_company_stats(c, at).await
        }
        async fn company_stats(&self, c: Uuid) -> Result<Option<CompanyStatsProjection>, StoreError> {
            self.inner.company_stats(c).await
        }
    }

    #[tokio::test]
    async fn test_projection_race_is_retried() {
        let store = Arc::new(RacingStore { inner: MemoryStore::new(), races_left: AtomicU32::new(2) });
        let engine = engine(store);

        assert!(engine.refresh_company_stats(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn test_best_effort_refresh_swallows_failure() {
        let store = Arc::new(RacingStore { inner: MemoryStore::new(), races_left: AtomicU32::new(10) });
        let metrics = Arc::new(Metrics::new().unwrap());
        let engine = AggregationEngine::new(store, metrics.clone()).with_retry(RetryConfig::immediate(2));

        assert!(engine.refresh_best_effort(Uuid::new_v4()).await.is_none());
        assert_eq!(metrics.stats_refresh.with_label_values(&["failure"]).get(), 1);
    }
}
