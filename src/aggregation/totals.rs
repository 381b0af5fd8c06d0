use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::company::CompanyStatsProjection;
use crate::domain::declaration::{Declaration, DeclarationError, DeclarationStatus};

// ============================================================================
// Rollup Arithmetic
// ============================================================================
//
// Sums are taken over normalized kilograms, never raw quantity values.
// Monthly totals include every status; the company rollup skips Cancelled.
//
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationTotals {
    pub total_quantity_kg: f64,
    pub total_recycled_kg: f64,
    pub total_cost: f64,
    pub co2_saved: f64,
    pub count: u64,
}

impl DeclarationTotals {
    pub fn add(&mut self, declaration: &Declaration) {
        let kg = declaration.derived.quantity_kg;
        self.total_quantity_kg += kg;
        if declaration.derived.is_recycled {
            self.total_recycled_kg += kg;
        }
        self.total_cost += declaration.details.cost.amount;
        self.co2_saved += declaration.derived.environmental_impact.co2_saved;
        self.count += 1;
    }

    pub fn over<'a>(declarations: impl IntoIterator<Item = &'a Declaration>) -> Self {
        let mut totals = Self::default();
        for declaration in declarations {
            totals.add(declaration);
        }
        totals
    }

    /// Projection overwriting whatever was stored for the company
    pub fn into_projection(self, company_id: Uuid, refreshed_at: DateTime<Utc>) -> CompanyStatsProjection {
        CompanyStatsProjection {
            company_id,
            total_waste_kg: self.total_quantity_kg,
            total_recycled_kg: self.total_recycled_kg,
            total_cost: self.total_cost,
            co2_saved: self.co2_saved,
            last_declaration_at: Some(refreshed_at),
        }
    }
}

/// Closed calendar month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthPeriod {
    pub year: i32,
    pub month: u32,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
}

impl MonthPeriod {
    pub fn new(year: i32, month: u32) -> Result<Self, DeclarationError> {
        let invalid = || DeclarationError::InvalidPeriod { year, month };

        let first_day = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next_month = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        };
        let last_day = next_month.and_then(|d| d.pred_opt()).ok_or_else(invalid)?;

        Ok(Self { year, month, first_day, last_day })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.first_day..=self.last_day).contains(&date)
    }
}

/// Monthly aggregate, no status filter
pub fn monthly_totals<'a>(
    declarations: impl IntoIterator<Item = &'a Declaration>,
    company_id: Uuid,
    period: &MonthPeriod,
) -> DeclarationTotals {
    DeclarationTotals::over(
        declarations
            .into_iter()
            .filter(|d| d.company_id == company_id && period.contains(d.details.declaration_date)),
    )
}

/// Lifetime rollup of a company, cancelled declarations excluded
pub fn company_rollup<'a>(
    declarations: impl IntoIterator<Item = &'a Declaration>,
    company_id: Uuid,
) -> DeclarationTotals {
    DeclarationTotals::over(
        declarations
            .into_iter()
            .filter(|d| d.company_id == company_id && d.status != DeclarationStatus::Cancelled),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::declaration::aggregate::tests::{details, record_command};
    use crate::domain::declaration::value_objects::*;

    fn declaration(company_id: Uuid, date: NaiveDate, kg: f64, destination: Destination, cost: f64) -> Declaration {
        let mut d = details(WasteCategory::NonHazardous, kg, QuantityUnit::Kilograms, destination);
        d.declaration_date = date;
        d.cost.amount = cost;
        let mut command = record_command(d, DeclarationStatus::Declared);
        command.company_id = company_id;
        Declaration::open(&command).unwrap().0
    }

    fn july(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, day).unwrap()
    }

    #[test]
    fn test_july_monthly_aggregate() {
        let company = Uuid::new_v4();
        let set = vec![
            declaration(company, july(3), 100.0, Destination::Recycling, 10.0),
            declaration(company, july(31), 50.0, Destination::Landfill, 5.0),
            declaration(company, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(), 70.0, Destination::Recycling, 1.0),
            declaration(Uuid::new_v4(), july(10), 999.0, Destination::Recycling, 1.0),
        ];

        let totals = monthly_totals(&set, company, &MonthPeriod::new(2025, 7).unwrap());

        assert_eq!(totals.total_quantity_kg, 150.0);
        assert_eq!(totals.total_recycled_kg, 100.0);
        assert_eq!(totals.total_cost, 15.0);
        assert_eq!(totals.count, 2);
    }

    #[test]
    fn test_monthly_includes_cancelled_but_rollup_does_not() {
        let company = Uuid::new_v4();
        let kept = declaration(company, july(5), 10.0, Destination::Recycling, 1.0);
        let cancelled = declaration(company, july(6), 40.0, Destination::Recycling, 4.0)
            .transition_status(DeclarationStatus::Cancelled, Uuid::new_v4(), Utc::now())
            .unwrap();
        let set = vec![kept, cancelled];

        let monthly = monthly_totals(&set, company, &MonthPeriod::new(2025, 7).unwrap());
        let rollup = company_rollup(&set, company);

        assert_eq!(monthly.total_quantity_kg, 50.0);
        assert_eq!(rollup.total_quantity_kg, 10.0);
        assert_eq!(rollup.count, 1);
    }

    #[test]
    fn test_rollup_sums_kilograms_not_raw_values() {
        let company = Uuid::new_v4();
        let mut d = details(WasteCategory::Inert, 2.0, QuantityUnit::Tonnes, Destination::Landfill);
        d.declaration_date = july(1);
        let mut command = record_command(d, DeclarationStatus::Declared);
        command.company_id = company;
        let tonnes = Declaration::open(&command).unwrap().0;

        let rollup = company_rollup([&tonnes], company);
        assert_eq!(rollup.total_quantity_kg, 2000.0);
        assert_eq!(rollup.total_recycled_kg, 0.0);
    }

    #[test]
    fn test_rollup_is_stable() {
        let company = Uuid::new_v4();
        let set = vec![
            declaration(company, july(1), 12.5, Destination::Composting, 3.0),
            declaration(company, july(2), 7.5, Destination::Incineration, 2.0),
        ];
        assert_eq!(company_rollup(&set, company), company_rollup(&set, company));
    }

    #[test]
    fn test_empty_rollup_projects_zeros() {
        let company = Uuid::new_v4();
        let now = Utc::now();
        let projection = company_rollup(std::iter::empty::<&Declaration>(), company).into_projection(company, now);

        assert_eq!(projection.total_waste_kg, 0.0);
        assert_eq!(projection.recycling_rate(), 0.0);
        assert_eq!(projection.last_declaration_at, Some(now));
    }

    #[test]
    fn test_month_bounds() {
        let february = MonthPeriod::new(2024, 2).unwrap();
        assert_eq!(february.last_day, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        let december = MonthPeriod::new(2025, 12).unwrap();
        assert_eq!(december.last_day, NaiveDate::from_ymd_opt(2025, 12, 31).unwrap());
        assert!(MonthPeriod::new(2025, 7).unwrap().contains(july(31)));

        assert!(matches!(
            MonthPeriod::new(2025, 13),
            Err(DeclarationError::InvalidPeriod { year: 2025, month: 13 })
        ));
        assert!(MonthPeriod::new(2025, 0).is_err());
    }
}
