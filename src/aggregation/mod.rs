// ============================================================================
// Aggregation Engine - Monthly and Company Rollups
// ============================================================================

pub mod totals;
pub mod engine;

pub use totals::{company_rollup, monthly_totals, DeclarationTotals, MonthPeriod};
pub use engine::AggregationEngine;
