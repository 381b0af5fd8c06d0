use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifetime totals of a company, excluding cancelled declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyStatsProjection {
    pub company_id: Uuid,
    pub total_waste_kg: f64,
    pub total_recycled_kg: f64,
    pub total_cost: f64,
    pub co2_saved: f64,
    /// Time of the last refresh, not of the last declaration date
    pub last_declaration_at: Option<DateTime<Utc>>,
}

impl CompanyStatsProjection {
    pub fn empty(company_id: Uuid) -> Self {
        Self {
            company_id,
            total_waste_kg: 0.0,
            total_recycled_kg: 0.0,
            total_cost: 0.0,
            co2_saved: 0.0,
            last_declaration_at: None,
        }
    }

    /// Recycled share of the total mass, as a whole percentage
    pub fn recycling_rate(&self) -> f64 {
        if self.total_waste_kg > 0.0 {
            (self.total_recycled_kg / self.total_waste_kg * 100.0).round()
        } else {
            0.0
        }
    }
}
