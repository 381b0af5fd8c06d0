use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::Query;
use sqlx::{Postgres, QueryBuilder, Row, Transaction};
use uuid::Uuid;

use crate::aggregation::{DeclarationTotals, MonthPeriod};
use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::{Declaration, DeclarationEvent, DeclarationQuery, DeclarationStatus};
use crate::event_sourcing::{deserialize_event, serialize_event, EventEnvelope};
use super::row::{DeclarationRow, COLUMNS};
use super::{DeclarationEnvelope, DeclarationStore, StoreError};

// ============================================================================
// Postgres Store
// ============================================================================
//
// Tables:
// - waste_declarations: current snapshot, one flat row per declaration
// - declaration_events: append-only log, survives deletion
// - company_stats: projection, written only by refresh_company_stats
//
// Snapshot and events are written in one transaction; the version column
// is the optimistic concurrency check.
//
// ============================================================================

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS waste_declarations (
        id UUID PRIMARY KEY,
        version BIGINT NOT NULL,
        company_id UUID NOT NULL,
        declared_by UUID NOT NULL,
        waste_name TEXT NOT NULL,
        waste_code TEXT NOT NULL,
        waste_category TEXT NOT NULL,
        quantity_value DOUBLE PRECISION NOT NULL CHECK (quantity_value >= 0),
        quantity_unit TEXT NOT NULL,
        quantity_kg DOUBLE PRECISION NOT NULL,
        declaration_date DATE NOT NULL,
        collection_date DATE NOT NULL,
        provider_id UUID NOT NULL,
        destination TEXT NOT NULL,
        is_recycled BOOLEAN NOT NULL,
        recycling_rate DOUBLE PRECISION NOT NULL CHECK (recycling_rate BETWEEN 0 AND 100),
        cost_amount DOUBLE PRECISION NOT NULL,
        cost_currency TEXT NOT NULL,
        status TEXT NOT NULL,
        tracking_number TEXT,
        validated_by_user UUID,
        validated_at TIMESTAMPTZ,
        co2_saved DOUBLE PRECISION NOT NULL,
        water_saved DOUBLE PRECISION NOT NULL,
        energy_saved DOUBLE PRECISION NOT NULL,
        site_name TEXT,
        site_address TEXT,
        site_lat DOUBLE PRECISION,
        site_lng DOUBLE PRECISION,
        comments TEXT,
        documents TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL,
        updated_at TIMESTAMPTZ NOT NULL
    )",
    "CREATE UNIQUE INDEX IF NOT EXISTS waste_declarations_tracking_number_key
        ON waste_declarations (tracking_number) WHERE tracking_number IS NOT NULL",
    "CREATE INDEX IF NOT EXISTS waste_declarations_company_date_idx
        ON waste_declarations (company_id, declaration_date DESC)",
    "CREATE INDEX IF NOT EXISTS waste_declarations_company_status_idx
        ON waste_declarations (company_id, status)",
    "CREATE TABLE IF NOT EXISTS declaration_events (
        event_id UUID PRIMARY KEY,
        aggregate_id UUID NOT NULL,
        sequence_number BIGINT NOT NULL,
        event_type TEXT NOT NULL,
        event_version INT NOT NULL,
        event_data TEXT NOT NULL,
        causation_id UUID,
        correlation_id UUID NOT NULL,
        user_id UUID,
        occurred_at TIMESTAMPTZ NOT NULL,
        UNIQUE (aggregate_id, sequence_number)
    )",
    "CREATE TABLE IF NOT EXISTS company_stats (
        company_id UUID PRIMARY KEY,
        total_waste_kg DOUBLE PRECISION NOT NULL,
        total_recycled_kg DOUBLE PRECISION NOT NULL,
        total_cost DOUBLE PRECISION NOT NULL,
        co2_saved DOUBLE PRECISION NOT NULL,
        last_declaration_at TIMESTAMPTZ
    )",
];

const SERIALIZATION_FAILURE: &str = "40001";

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        tracing::info!("Connected to Postgres");
        Ok(Self::new(pool))
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create tables and indexes if missing
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Declaration schema ready");
        Ok(())
    }

    fn select_columns() -> String {
        COLUMNS.join(", ")
    }

    async fn append_events(
        tx: &mut Transaction<'_, Postgres>,
        events: &[DeclarationEnvelope],
    ) -> Result<(), StoreError> {
        for envelope in events {
            let event_json = serialize_event(&envelope.event_data).map_err(|e| StoreError::Codec(e.to_string()))?;

            sqlx::query(
                "INSERT INTO declaration_events (
                    event_id, aggregate_id, sequence_number, event_type, event_version,
                    event_data, causation_id, correlation_id, user_id, occurred_at
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(envelope.event_id)
            .bind(envelope.aggregate_id)
            .bind(envelope.sequence_number)
            .bind(&envelope.event_type)
            .bind(envelope.event_version)
            .bind(event_json)
            .bind(envelope.causation_id)
            .bind(envelope.correlation_id)
            .bind(envelope.user_id)
            .bind(envelope.timestamp)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    /// Version currently stored, for conflict reporting
    async fn stored_version(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT version FROM waste_declarations WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut **tx)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("version")?),
            None => Err(StoreError::NotFound(id)),
        }
    }
}

fn bind_row<'q>(query: Query<'q, Postgres, PgArguments>, row: DeclarationRow) -> Query<'q, Postgres, PgArguments> {
    query
        .bind(row.id)
        .bind(row.version)
        .bind(row.company_id)
        .bind(row.declared_by)
        .bind(row.waste_name)
        .bind(row.waste_code)
        .bind(row.waste_category)
        .bind(row.quantity_value)
        .bind(row.quantity_unit)
        .bind(row.quantity_kg)
        .bind(row.declaration_date)
        .bind(row.collection_date)
        .bind(row.provider_id)
        .bind(row.destination)
        .bind(row.is_recycled)
        .bind(row.recycling_rate)
        .bind(row.cost_amount)
        .bind(row.cost_currency)
        .bind(row.status)
        .bind(row.tracking_number)
        .bind(row.validated_by_user)
        .bind(row.validated_at)
        .bind(row.co2_saved)
        .bind(row.water_saved)
        .bind(row.energy_saved)
        .bind(row.site_name)
        .bind(row.site_address)
        .bind(row.site_lat)
        .bind(row.site_lng)
        .bind(row.comments)
        .bind(row.documents)
        .bind(row.created_at)
        .bind(row.updated_at)
}

fn placeholders(from: usize, count: usize) -> String {
    (from..from + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Turn a unique violation on the tracking number index into a domain conflict
fn classify_write_error(err: sqlx::Error, declaration: &Declaration) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        let on_tracking_number = db.constraint().is_some_and(|c| c.contains("tracking_number"));
        if db.is_unique_violation() && on_tracking_number {
            if let Some(number) = &declaration.tracking_number {
                return StoreError::DuplicateTrackingNumber(number.to_string());
            }
        }
        if db.is_unique_violation() && db.constraint() == Some("waste_declarations_pkey") {
            return StoreError::AlreadyExists(declaration.id);
        }
    }
    StoreError::Database(err)
}

fn is_serialization_failure(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some(SERIALIZATION_FAILURE))
}

#[async_trait]
impl DeclarationStore for PgStore {
    async fn insert(&self, declaration: &Declaration, events: &[DeclarationEnvelope]) -> Result<(), StoreError> {
        let row = DeclarationRow::from_declaration(declaration)?;
        let sql = format!(
            "INSERT INTO waste_declarations ({}) VALUES ({})",
            Self::select_columns(),
            placeholders(1, COLUMNS.len())
        );

        let mut tx = self.pool.begin().await?;
        bind_row(sqlx::query(&sql), row)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_write_error(e, declaration))?;
        Self::append_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::debug!(declaration_id = %declaration.id, "Inserted declaration row");
        Ok(())
    }

    async fn update(
        &self,
        declaration: &Declaration,
        expected_version: i64,
        events: &[DeclarationEnvelope],
    ) -> Result<(), StoreError> {
        let row = DeclarationRow::from_declaration(declaration)?;
        let sql = format!(
            "UPDATE waste_declarations SET ({}) = ({}) WHERE id = ${} AND version = ${}",
            Self::select_columns(),
            placeholders(1, COLUMNS.len()),
            COLUMNS.len() + 1,
            COLUMNS.len() + 2
        );

        let mut tx = self.pool.begin().await?;
        let result = bind_row(sqlx::query(&sql), row)
            .bind(declaration.id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await
            .map_err(|e| classify_write_error(e, declaration))?;

        if result.rows_affected() == 0 {
            let actual = Self::stored_version(&mut tx, declaration.id).await?;
            return Err(StoreError::VersionConflict { id: declaration.id, expected: expected_version, actual });
        }

        Self::append_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::debug!(
            declaration_id = %declaration.id,
            version = declaration.version,
            "Updated declaration row"
        );
        Ok(())
    }

    async fn delete(&self, id: Uuid, expected_version: i64, events: &[DeclarationEnvelope]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM waste_declarations WHERE id = $1 AND version = $2")
            .bind(id)
            .bind(expected_version)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            let actual = Self::stored_version(&mut tx, id).await?;
            return Err(StoreError::VersionConflict { id, expected: expected_version, actual });
        }

        Self::append_events(&mut tx, events).await?;
        tx.commit().await?;

        tracing::debug!(declaration_id = %id, "Deleted declaration row");
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Declaration>, StoreError> {
        let sql = format!("SELECT {} FROM waste_declarations WHERE id = $1", Self::select_columns());
        let row: Option<DeclarationRow> = sqlx::query_as(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(DeclarationRow::into_declaration).transpose()
    }

    async fn find(&self, query: &DeclarationQuery) -> Result<Vec<Declaration>, StoreError> {
        let filter = &query.filter;
        let mut builder: QueryBuilder<Postgres> = QueryBuilder::new(format!(
            "SELECT {} FROM waste_declarations WHERE company_id = ",
            Self::select_columns()
        ));
        builder.push_bind(query.company_id);

        if let Some(status) = filter.status {
            builder.push(" AND status = ").push_bind(status.as_str());
        }
        if let Some(name) = &filter.waste_name {
            let escaped = name.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
            builder.push(" AND waste_name ILIKE ").push_bind(format!("%{}%", escaped));
        }
        if let Some(provider_id) = filter.provider_id {
            builder.push(" AND provider_id = ").push_bind(provider_id);
        }
        if let Some(from) = filter.declared_from {
            builder.push(" AND declaration_date >= ").push_bind(from);
        }
        if let Some(to) = filter.declared_to {
            builder.push(" AND declaration_date <= ").push_bind(to);
        }

        let rows: Vec<DeclarationRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(DeclarationRow::into_declaration).collect()
    }

    async fn load_events(&self, id: Uuid) -> Result<Vec<DeclarationEnvelope>, StoreError> {
        let rows = sqlx::query(
            "SELECT event_id, aggregate_id, sequence_number, event_type, event_version,
                    event_data, causation_id, correlation_id, user_id, occurred_at
             FROM declaration_events
             WHERE aggregate_id = $1
             ORDER BY sequence_number ASC",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            let event_json: String = row.try_get("event_data")?;
            let event_data: DeclarationEvent =
                deserialize_event(&event_json).map_err(|e| StoreError::Codec(e.to_string()))?;

            events.push(EventEnvelope {
                event_id: row.try_get("event_id")?,
                aggregate_id: row.try_get("aggregate_id")?,
                sequence_number: row.try_get("sequence_number")?,
                event_type: row.try_get("event_type")?,
                event_version: row.try_get("event_version")?,
                event_data,
                causation_id: row.try_get("causation_id")?,
                correlation_id: row.try_get("correlation_id")?,
                user_id: row.try_get("user_id")?,
                timestamp: row.try_get("occurred_at")?,
            });
        }

        tracing::debug!(declaration_id = %id, count = events.len(), "Loaded declaration events");
        Ok(events)
    }

    async fn monthly_totals(&self, company_id: Uuid, period: &MonthPeriod) -> Result<DeclarationTotals, StoreError> {
        let row = sqlx::query(
            "SELECT COALESCE(SUM(quantity_kg), 0)::FLOAT8 AS total_quantity_kg,
                    COALESCE(SUM(quantity_kg) FILTER (WHERE is_recycled), 0)::FLOAT8 AS total_recycled_kg,
                    COALESCE(SUM(cost_amount), 0)::FLOAT8 AS total_cost,
                    COALESCE(SUM(co2_saved), 0)::FLOAT8 AS co2_saved,
                    COUNT(*) AS count
             FROM waste_declarations
             WHERE company_id = $1 AND declaration_date BETWEEN $2 AND $3",
        )
        .bind(company_id)
        .bind(period.first_day)
        .bind(period.last_day)
        .fetch_one(&self.pool)
        .await?;

        totals_from_row(&row)
    }

    async fn refresh_company_stats(
        &self,
        company_id: Uuid,
        refreshed_at: DateTime<Utc>,
    ) -> Result<CompanyStatsProjection, StoreError> {
        let serialization = |e: sqlx::Error| {
            if is_serialization_failure(&e) {
                StoreError::SerializationConflict(company_id)
            } else {
                StoreError::Database(e)
            }
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(serialization)?;
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(company_id.to_string())
            .execute(&mut *tx)
            .await
            .map_err(serialization)?;

        let row = sqlx::query(
            "SELECT COALESCE(SUM(quantity_kg), 0)::FLOAT8 AS total_quantity_kg,
                    COALESCE(SUM(quantity_kg) FILTER (WHERE is_recycled), 0)::FLOAT8 AS total_recycled_kg,
                    COALESCE(SUM(cost_amount), 0)::FLOAT8 AS total_cost,
                    COALESCE(SUM(co2_saved), 0)::FLOAT8 AS co2_saved,
                    COUNT(*) AS count
             FROM waste_declarations
             WHERE company_id = $1 AND status <> $2",
        )
        .bind(company_id)
        .bind(DeclarationStatus::Cancelled.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(serialization)?;

        let projection = totals_from_row(&row)?.into_projection(company_id, refreshed_at);

        sqlx::query(
            "INSERT INTO company_stats (
                company_id, total_waste_kg, total_recycled_kg, total_cost, co2_saved, last_declaration_at
             ) VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (company_id) DO UPDATE SET
                total_waste_kg = EXCLUDED.total_waste_kg,
                total_recycled_kg = EXCLUDED.total_recycled_kg,
                total_cost = EXCLUDED.total_cost,
                co2_saved = EXCLUDED.co2_saved,
                last_declaration_at = EXCLUDED.last_declaration_at",
        )
        .bind(projection.company_id)
        .bind(projection.total_waste_kg)
        .bind(projection.total_recycled_kg)
        .bind(projection.total_cost)
        .bind(projection.co2_saved)
        .bind(projection.last_declaration_at)
        .execute(&mut *tx)
        .await
        .map_err(serialization)?;

        tx.commit().await.map_err(serialization)?;
        Ok(projection)
    }

    async fn company_stats(&self, company_id: Uuid) -> Result<Option<CompanyStatsProjection>, StoreError> {
        let row = sqlx::query(
            "SELECT company_id, total_waste_kg, total_recycled_kg, total_cost, co2_saved, last_declaration_at
             FROM company_stats WHERE company_id = $1",
        )
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CompanyStatsProjection {
            company_id: row.try_get("company_id")?,
            total_waste_kg: row.try_get("total_waste_kg")?,
            total_recycled_kg: row.try_get("total_recycled_kg")?,
            total_cost: row.try_get("total_cost")?,
            co2_saved: row.try_get("co2_saved")?,
            last_declaration_at: row.try_get("last_declaration_at")?,
        }))
    }
}

fn totals_from_row(row: &sqlx::postgres::PgRow) -> Result<DeclarationTotals, StoreError> {
    let count: i64 = row.try_get("count")?;
    Ok(DeclarationTotals {
        total_quantity_kg: row.try_get("total_quantity_kg")?,
        total_recycled_kg: row.try_get("total_recycled_kg")?,
        total_cost: row.try_get("total_cost")?,
        co2_saved: row.try_get("co2_saved")?,
        count: count.max(0) as u64,
    })
}
