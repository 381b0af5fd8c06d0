use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregate::Declaration;
use super::value_objects::DeclarationStatus;

// ============================================================================
// Declaration Listing
// ============================================================================

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 200;

/// Caller-supplied narrowing of a listing
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationFilter {
    pub status: Option<DeclarationStatus>,
    /// Case-insensitive substring of the waste type name
    pub waste_name: Option<String>,
    pub provider_id: Option<Uuid>,
    /// Inclusive bounds on the declaration date
    pub declared_from: Option<NaiveDate>,
    pub declared_to: Option<NaiveDate>,
}

/// Filter over one company's declarations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationQuery {
    pub company_id: Uuid,
    #[serde(flatten)]
    pub filter: DeclarationFilter,
}

impl DeclarationQuery {
    pub fn for_company(company_id: Uuid) -> Self {
        Self { company_id, filter: DeclarationFilter::default() }
    }

    pub fn with_filter(company_id: Uuid, filter: DeclarationFilter) -> Self {
        Self { company_id, filter }
    }

    pub fn matches(&self, declaration: &Declaration) -> bool {
        let filter = &self.filter;
        if declaration.company_id != self.company_id {
            return false;
        }
        if filter.status.is_some_and(|status| status != declaration.status) {
            return false;
        }
        if let Some(needle) = &filter.waste_name {
            let name = declaration.details.waste_type.name.to_lowercase();
            if !name.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if filter.provider_id.is_some_and(|id| id != declaration.details.provider_id) {
            return false;
        }

        let date = declaration.details.declaration_date;
        if filter.declared_from.is_some_and(|from| date < from) {
            return false;
        }
        if filter.declared_to.is_some_and(|to| date > to) {
            return false;
        }

        true
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListSort {
    /// Most recent declaration date first
    #[default]
    NewestFirst,
    OldestFirst,
}

impl ListSort {
    pub fn apply(self, declarations: &mut [Declaration]) {
        declarations.sort_by(|a, b| {
            let key_a = (a.details.declaration_date, a.created_at);
            let key_b = (b.details.declaration_date, b.created_at);
            match self {
                ListSort::NewestFirst => key_b.cmp(&key_a),
                ListSort::OldestFirst => key_a.cmp(&key_b),
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListRequest {
    pub page: u32,
    pub limit: u32,
    pub sort: ListSort,
}

impl Default for ListRequest {
    fn default() -> Self {
        Self { page: DEFAULT_PAGE, limit: DEFAULT_LIMIT, sort: ListSort::default() }
    }
}

impl ListRequest {
    /// Page and limit clamped into a usable range
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.clamp(1, MAX_LIMIT),
            sort: self.sort,
        }
    }

    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize) * self.limit as usize
    }
}

/// Totals over the whole filtered set, not only the returned page
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSummary {
    pub total_quantity_kg: f64,
    pub total_cost: f64,
    pub avg_recycling_rate: f64,
    pub co2_saved: f64,
}

impl ListSummary {
    pub fn over<'a>(declarations: impl IntoIterator<Item = &'a Declaration>) -> Self {
        let mut summary = Self::default();
        let mut count = 0usize;
        let mut rate_sum = 0.0;

        for declaration in declarations {
            summary.total_quantity_kg += declaration.derived.quantity_kg;
            summary.total_cost += declaration.details.cost.amount;
            summary.co2_saved += declaration.derived.environmental_impact.co2_saved;
            rate_sum += declaration.details.recycling_rate;
            count += 1;
        }

        if count > 0 {
            summary.avg_recycling_rate = rate_sum / count as f64;
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationPage {
    pub items: Vec<Declaration>,
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub pages: u32,
    pub summary: ListSummary,
}

impl DeclarationPage {
    /// Sort, summarize and slice an already-filtered set
    pub fn paginate(mut matching: Vec<Declaration>, request: ListRequest) -> Self {
        let request = request.normalized();
        request.sort.apply(&mut matching);

        let total = matching.len();
        let summary = ListSummary::over(&matching);
        let pages = total.div_ceil(request.limit as usize) as u32;
        let items = matching
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();

        Self { items, page: request.page, limit: request.limit, total, pages, summary }
    }
}
