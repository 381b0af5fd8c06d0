use std::sync::Arc;

use anyhow::Context;
use chrono::Datelike;
use serde_json::json;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use waste_ledger::config::AppConfig;
use waste_ledger::domain::access::{RequestContext, Role};
use waste_ledger::domain::declaration::{DeclarationPayload, DeclarationStatus};
use waste_ledger::metrics::{start_metrics_server, Metrics};
use waste_ledger::store::{DeclarationStore, MemoryStore, PgStore};
use waste_ledger::DeclarationService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG overrides the default filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,waste_ledger=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(
        factors = %config.factors.version,
        tracking_number_attempts = config.tracking_number_max_attempts,
        "Starting waste declaration ledger"
    );

    // === 1. Storage ===
    let store: Arc<dyn DeclarationStore> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to Postgres...");
            let store = PgStore::connect(url).await.context("connecting to Postgres")?;
            store.ensure_schema().await.context("creating schema")?;
            Arc::new(store)
        }
        None => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    if config.metrics_enabled {
        let registry = Arc::new(metrics.registry().clone());
        let port = config.metrics_port;
        std::thread::spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "Could not start metrics runtime");
                    return;
                }
            };
            rt.block_on(async {
                if let Err(e) = start_metrics_server(registry, port).await {
                    tracing::error!(error = %e, "Metrics server error");
                }
            });
        });
    }

    let service = DeclarationService::new(store, &config, metrics.clone());

    // === 3. Demonstration lifecycle ===
    let company_id = Uuid::new_v4();
    let operator = RequestContext::new(Uuid::new_v4(), company_id, Role::User);
    let manager = RequestContext::new(Uuid::new_v4(), company_id, Role::Manager);
    let today = chrono::Utc::now().date_naive();

    let cardboard: DeclarationPayload = serde_json::from_value(json!({
        "wasteType": { "name": "Cardboard", "code": "15 01 01", "category": "Non-hazardous" },
        "quantity": { "value": 1.2, "unit": "t" },
        "collectionDate": today.to_string(),
        "providerId": Uuid::new_v4().to_string(),
        "destination": "Recycling",
        "recyclingRate": 95,
        "cost": { "amount": 180, "currency": "EUR" }
    }))?;

    let declaration = service.create(&operator, &cardboard).await?;
    tracing::info!(declaration_id = %declaration.id, quantity_kg = declaration.quantity_kg(), "Declared cardboard");

    service.change_status(&manager, declaration.id, DeclarationStatus::Collected).await?;
    let processed = service.change_status(&manager, declaration.id, DeclarationStatus::Processed).await?;
    tracing::info!(
        declaration_id = %processed.id,
        validated_by = ?processed.validated_by,
        "Cardboard processed"
    );

    let solvents: DeclarationPayload = serde_json::from_value(json!({
        "wasteType": { "name": "Spent solvents", "code": "14 06 03*", "category": "Hazardous" },
        "quantity": { "value": 180, "unit": "kg" },
        "collectionDate": today.to_string(),
        "providerId": Uuid::new_v4().to_string(),
        "destination": "Incineration",
        "cost": { "amount": 420 }
    }))?;

    let hazardous = service.create(&operator, &solvents).await?;
    tracing::info!(
        declaration_id = %hazardous.id,
        tracking_number = ?hazardous.tracking_number.as_ref().map(|n| n.to_string()),
        "Declared hazardous waste"
    );

    let month = service
        .monthly_aggregate(&operator, today.year(), today.month())
        .await?;
    tracing::info!(
        total_kg = month.total_quantity_kg,
        recycled_kg = month.total_recycled_kg,
        cost = month.total_cost,
        count = month.count,
        "Monthly aggregate"
    );

    let stats = service.company_stats(&operator).await?;
    tracing::info!(
        total_waste_kg = stats.total_waste_kg,
        recycling_rate = stats.recycling_rate(),
        co2_saved = stats.co2_saved,
        "Company stats"
    );

    tracing::info!("Demo complete");
    Ok(())
}
