// ============================================================================
// Company Domain - Denormalized Statistics
// ============================================================================
//
// Companies themselves live upstream; the only company state owned here is
// the stats projection written by the aggregation engine.
//
// ============================================================================

pub mod stats;

pub use stats::CompanyStatsProjection;
