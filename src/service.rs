use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::aggregation::{AggregationEngine, DeclarationTotals};
use crate::config::{AppConfig, ImpactFactors};
use crate::domain::access::RequestContext;
use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::tracking::requires_tracking_number;
use crate::domain::declaration::{
    compute_derived_fields, validate_declaration, validate_document, Declaration, DeclarationCommand,
    DeclarationCommandHandler, DeclarationError, DeclarationEvent, DeclarationFilter, DeclarationPage,
    DeclarationPayload, DeclarationQuery, DeclarationStatus, DocumentUpload, ListRequest,
    RecordDeclaration, ValidationErrors,
};
use crate::metrics::Metrics;
use crate::store::{DeclarationEnvelope, DeclarationStore};

// ============================================================================
// Declaration Service
// ============================================================================
//
// Entry point for callers: checks who is acting, validates input, runs the
// command through the aggregate and refreshes the company rollup afterwards.
// The refresh is best-effort; a failed refresh never fails the mutation.
//
// ============================================================================

pub struct DeclarationService {
    store: Arc<dyn DeclarationStore>,
    handler: DeclarationCommandHandler,
    engine: AggregationEngine,
    factors: ImpactFactors,
    metrics: Arc<Metrics>,
}

impl DeclarationService {
    pub fn new(store: Arc<dyn DeclarationStore>, config: &AppConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            handler: DeclarationCommandHandler::new(
                store.clone(),
                metrics.clone(),
                config.tracking_number_max_attempts,
            ),
            engine: AggregationEngine::new(store.clone(), metrics.clone()),
            factors: config.factors.clone(),
            store,
            metrics,
        }
    }

    pub async fn create(
        &self,
        ctx: &RequestContext,
        payload: &DeclarationPayload,
    ) -> Result<Declaration, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let validated = validate_declaration(payload)?;
            let now = Utc::now();
            let status = validated.initial_status();
            let details = validated.into_details(now.date_naive());
            let derived = compute_derived_fields(&details.quantity, details.destination, &self.factors);

            let command = RecordDeclaration {
                declaration_id: Uuid::new_v4(),
                company_id: ctx.company_id,
                declared_by: ctx.user_id,
                details,
                derived,
                status,
                tracking_number: None,
                at: now,
            };
            let declaration = self.handler.record(command, Uuid::new_v4()).await?;
            self.engine.refresh_best_effort(declaration.company_id).await;
            Ok(declaration)
        }
        .await;

        self.observe("create", result)
    }

    /// Replace the editable fields of a declaration
    pub async fn update(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        payload: &DeclarationPayload,
    ) -> Result<Declaration, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let current = self.load_authorized(ctx, id).await?;
            if !current.can_be_edited() {
                return Err(DeclarationError::NotEditable(current.status));
            }

            let validated = validate_declaration(payload)?;
            if let Some(requested) = validated.requested_status {
                if requested != current.status {
                    return Err(ValidationErrors::single(
                        "status",
                        "cannot be changed by an update, use a status change",
                    )
                    .into());
                }
            }

            let now = Utc::now();
            let details = validated.into_details(current.details.declaration_date);
            let derived = compute_derived_fields(&details.quantity, details.destination, &self.factors);
            let correlation_id = Uuid::new_v4();

            let updated = if requires_tracking_number(
                details.waste_type.category,
                current.tracking_number.as_ref(),
            ) {
                self.handler
                    .execute_numbered(
                        &current,
                        now.date_naive(),
                        |tracking_number| DeclarationCommand::Amend {
                            details: details.clone(),
                            derived,
                            tracking_number: Some(tracking_number),
                            at: now,
                        },
                        ctx.user_id,
                        correlation_id,
                    )
                    .await?
            } else {
                let command = DeclarationCommand::Amend { details, derived, tracking_number: None, at: now };
                self.handler.execute(&current, command, ctx.user_id, correlation_id).await?
            };

            self.engine.refresh_best_effort(updated.company_id).await;
            Ok(updated)
        }
        .await;

        self.observe("update", result)
    }

    pub async fn change_status(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        requested: DeclarationStatus,
    ) -> Result<Declaration, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            ctx.require_manager("change declaration status")?;
            let current = self.load_authorized(ctx, id).await?;

            let command = DeclarationCommand::ChangeStatus {
                requested,
                acting_user: ctx.user_id,
                at: Utc::now(),
            };
            let updated = self.handler.execute(&current, command, ctx.user_id, Uuid::new_v4()).await?;

            self.metrics.record_transition(current.status.as_str(), updated.status.as_str());
            tracing::info!(
                declaration_id = %id,
                from = %current.status,
                to = %updated.status,
                "Declaration status changed"
            );

            self.engine.refresh_best_effort(updated.company_id).await;
            Ok(updated)
        }
        .await;

        self.observe("change_status", result)
    }

    pub async fn attach_document(
        &self,
        ctx: &RequestContext,
        id: Uuid,
        upload: &DocumentUpload,
    ) -> Result<Declaration, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let current = self.load_authorized(ctx, id).await?;
            let document = validate_document(upload, ctx.user_id, Utc::now())?;
            self.handler
                .execute(&current, DeclarationCommand::AttachDocument { document }, ctx.user_id, Uuid::new_v4())
                .await
        }
        .await;

        self.observe("attach_document", result)
    }

    /// Number a hazardous declaration that has no tracking number yet
    pub async fn assign_tracking_number(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Declaration, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let current = self.load_authorized(ctx, id).await?;
            let now = Utc::now();
            self.handler
                .execute_numbered(
                    &current,
                    now.date_naive(),
                    |tracking_number| DeclarationCommand::AssignTrackingNumber { tracking_number, at: now },
                    ctx.user_id,
                    Uuid::new_v4(),
                )
                .await
        }
        .await;

        self.observe("assign_tracking_number", result)
    }

    pub async fn delete(&self, ctx: &RequestContext, id: Uuid) -> Result<(), DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            ctx.require_manager("delete declarations")?;
            let current = self.load_authorized(ctx, id).await?;

            let command = DeclarationCommand::Delete { deleted_by: ctx.user_id, at: Utc::now() };
            self.handler.execute(&current, command, ctx.user_id, Uuid::new_v4()).await?;

            self.engine.refresh_best_effort(current.company_id).await;
            Ok(())
        }
        .await;

        self.observe("delete", result)
    }

    pub async fn get(&self, ctx: &RequestContext, id: Uuid) -> Result<Declaration, DeclarationError> {
        let result = self.load_authorized(ctx, id).await;
        self.observe("get", result)
    }

    /// Event history, still readable after the declaration was deleted
    pub async fn history(
        &self,
        ctx: &RequestContext,
        id: Uuid,
    ) -> Result<Vec<DeclarationEnvelope>, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let events = self.store.load_events(id).await?;
            let owner = events.iter().find_map(|envelope| match &envelope.event_data {
                DeclarationEvent::Recorded(e) => Some(e.company_id),
                _ => None,
            });

            match owner {
                Some(company_id) => {
                    ctx.authorize_company(id, company_id)?;
                    Ok(events)
                }
                None => Err(DeclarationError::NotFound(id)),
            }
        }
        .await;

        self.observe("history", result)
    }

    /// Declarations of the caller's company matching `filter`
    pub async fn list(
        &self,
        ctx: &RequestContext,
        filter: DeclarationFilter,
        request: ListRequest,
    ) -> Result<DeclarationPage, DeclarationError> {
        let result: Result<_, DeclarationError> = async {
            let query = DeclarationQuery::with_filter(ctx.company_id, filter);
            let matching = self.store.find(&query).await?;
            Ok(DeclarationPage::paginate(matching, request))
        }
        .await;

        self.observe("list", result)
    }

    pub async fn monthly_aggregate(
        &self,
        ctx: &RequestContext,
        year: i32,
        month: u32,
    ) -> Result<DeclarationTotals, DeclarationError> {
        let result = self.engine.monthly_aggregate(ctx.company_id, year, month).await;
        self.observe("monthly_aggregate", result)
    }

    pub async fn company_stats(&self, ctx: &RequestContext) -> Result<CompanyStatsProjection, DeclarationError> {
        let result = self.engine.company_stats(ctx.company_id).await;
        self.observe("company_stats", result)
    }

    async fn load_authorized(&self, ctx: &RequestContext, id: Uuid) -> Result<Declaration, DeclarationError> {
        let declaration = self.handler.load(id).await?;
        ctx.authorize_company(id, declaration.company_id)?;
        Ok(declaration)
    }

    fn observe<T>(&self, command: &'static str, result: Result<T, DeclarationError>) -> Result<T, DeclarationError> {
        match &result {
            Ok(_) => self.metrics.record_command(command),
            Err(e) => {
                let kind = e.kind();
                self.metrics.record_rejection(kind.as_str());
                tracing::warn!(
                    command,
                    kind = kind.as_str(),
                    error = %e,
                    source = ?std::error::Error::source(e),
                    "Declaration command rejected"
                );
            }
        }
        result
    }
}
