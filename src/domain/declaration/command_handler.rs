use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::event_sourcing::{Aggregate, EventEnvelope};
use crate::metrics::Metrics;
use crate::store::DeclarationStore;
use crate::utils::{retry_on_transient, RetryConfig};

use super::aggregate::Declaration;
use super::commands::{DeclarationCommand, RecordDeclaration};
use super::errors::DeclarationError;
use super::events::DeclarationEvent;
use super::tracking::{requires_tracking_number, TrackingNumber};

// ============================================================================
// Declaration Command Handler
// ============================================================================
//
// Orchestrates: Command → Aggregate → Events → Store
//
// Commands that carry a freshly drawn tracking number are retried with a new
// draw when the store reports the number as taken.
//
// ============================================================================

pub struct DeclarationCommandHandler {
    store: Arc<dyn DeclarationStore>,
    metrics: Arc<Metrics>,
    numbering: RetryConfig,
}

impl DeclarationCommandHandler {
    pub fn new(store: Arc<dyn DeclarationStore>, metrics: Arc<Metrics>, max_numbering_attempts: u32) -> Self {
        Self {
            store,
            metrics,
            numbering: RetryConfig::immediate(max_numbering_attempts),
        }
    }

    /// Load the current snapshot
    pub async fn load(&self, id: Uuid) -> Result<Declaration, DeclarationError> {
        self.store
            .get(id)
            .await?
            .ok_or(DeclarationError::NotFound(id))
    }

    /// Open a declaration, numbering it when the waste is hazardous
    pub async fn record(
        &self,
        command: RecordDeclaration,
        correlation_id: Uuid,
    ) -> Result<Declaration, DeclarationError> {
        let needs_number = requires_tracking_number(
            command.details.waste_type.category,
            command.tracking_number.as_ref(),
        );
        let issued_on = command.at.date_naive();

        self.with_fresh_numbers(needs_number, issued_on, |number| {
            let mut command = command.clone();
            if number.is_some() {
                command.tracking_number = number;
            }
            async move {
                let events = Declaration::record(&command)?;
                self.commit(None, events, command.declared_by, correlation_id).await
            }
        })
        .await
    }

    /// Run a command against the current snapshot
    pub async fn execute(
        &self,
        current: &Declaration,
        command: DeclarationCommand,
        acting_user: Uuid,
        correlation_id: Uuid,
    ) -> Result<Declaration, DeclarationError> {
        let events = current.handle_command(&command)?;
        self.commit(Some(current), events, acting_user, correlation_id).await
    }

    /// Run a command built around a tracking number drawn for it
    pub async fn execute_numbered<F>(
        &self,
        current: &Declaration,
        issued_on: NaiveDate,
        build: F,
        acting_user: Uuid,
        correlation_id: Uuid,
    ) -> Result<Declaration, DeclarationError>
    where
        F: Fn(TrackingNumber) -> DeclarationCommand,
    {
        self.with_fresh_numbers(true, issued_on, |number| {
            let command = number.map(&build);
            async move {
                let command = command.ok_or(DeclarationError::TrackingNumberNotApplicable)?;
                self.execute(current, command, acting_user, correlation_id).await
            }
        })
        .await
    }

    /// Retry `attempt` with a new random number while the store reports collisions
    async fn with_fresh_numbers<F, Fut>(
        &self,
        enabled: bool,
        issued_on: NaiveDate,
        mut attempt: F,
    ) -> Result<Declaration, DeclarationError>
    where
        F: FnMut(Option<TrackingNumber>) -> Fut,
        Fut: std::future::Future<Output = Result<Declaration, DeclarationError>>,
    {
        if !enabled {
            return attempt(None).await;
        }

        retry_on_transient(self.numbering.clone(), |attempt_no| {
            let number = TrackingNumber::generate(issued_on, &mut rand::thread_rng());
            tracing::debug!(tracking_number = %number, attempt = attempt_no, "Drew tracking number");
            let fut = attempt(Some(number));
            async move {
                let result = fut.await;
                if let Err(DeclarationError::TrackingNumberTaken(number)) = &result {
                    self.metrics.record_collision();
                    tracing::warn!(tracking_number = %number, "Tracking number collision");
                }
                result
            }
        })
        .await
        .into_result()
    }

    /// Apply events, wrap them and hand snapshot plus envelopes to the store
    async fn commit(
        &self,
        before: Option<&Declaration>,
        events: Vec<DeclarationEvent>,
        acting_user: Uuid,
        correlation_id: Uuid,
    ) -> Result<Declaration, DeclarationError> {
        let (after, base_version) = match before {
            Some(current) => (current.applied(&events)?, current.version()),
            None => (
                Declaration::from_events(&events)?.ok_or(DeclarationError::NotInitialized)?,
                0,
            ),
        };
        let deleted = events.iter().any(|e| matches!(e, DeclarationEvent::Deleted(_)));

        let envelopes: Vec<_> = EventEnvelope::sequence(after.id, base_version, events, correlation_id)
            .into_iter()
            .map(|envelope| envelope.with_user(acting_user))
            .collect();

        match before {
            None => self.store.insert(&after, &envelopes).await?,
            Some(_) if deleted => self.store.delete(after.id, base_version, &envelopes).await?,
            Some(_) => self.store.update(&after, base_version, &envelopes).await?,
        }

        for envelope in &envelopes {
            tracing::info!(
                declaration_id = %after.id,
                event_type = %envelope.event_type,
                sequence = envelope.sequence_number,
                correlation_id = %correlation_id,
                "Declaration event stored"
            );
        }

        Ok(after)
    }
}
