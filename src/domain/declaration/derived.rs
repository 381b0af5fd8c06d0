use serde::{Deserialize, Serialize};

use crate::config::ImpactFactors;
use super::value_objects::{Destination, EnvironmentalImpact, Quantity, QuantityUnit};

// ============================================================================
// Derived Metrics
// ============================================================================
//
// Recomputed from scratch on every create and update. Same inputs and
// factors always give the same output.
//
// ============================================================================

/// Fields computed from quantity and destination
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFields {
    pub quantity_kg: f64,
    pub is_recycled: bool,
    pub environmental_impact: EnvironmentalImpact,
}

/// Quantity expressed in kilograms
pub fn normalize_to_kg(quantity: &Quantity, factors: &ImpactFactors) -> f64 {
    match quantity.unit {
        QuantityUnit::Kilograms => quantity.value,
        QuantityUnit::Tonnes => quantity.value * factors.tonne_to_kg,
        QuantityUnit::CubicMetres => quantity.value * factors.m3_to_kg,
    }
}

/// Savings estimate for a recycled mass; zero when nothing was recycled
pub fn estimate_impact(quantity_kg: f64, is_recycled: bool, factors: &ImpactFactors) -> EnvironmentalImpact {
    if !is_recycled || quantity_kg <= 0.0 {
        return EnvironmentalImpact::default();
    }

    EnvironmentalImpact {
        co2_saved: quantity_kg * factors.co2_kg_per_kg,
        water_saved: quantity_kg * factors.water_l_per_kg,
        energy_saved: quantity_kg * factors.energy_kwh_per_kg,
    }
}

pub fn compute_derived_fields(
    quantity: &Quantity,
    destination: Destination,
    factors: &ImpactFactors,
) -> DerivedFields {
    let quantity_kg = normalize_to_kg(quantity, factors);
    let is_recycled = destination.is_valorization();

    DerivedFields {
        quantity_kg,
        is_recycled,
        environmental_impact: estimate_impact(quantity_kg, is_recycled, factors),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn qty(value: f64, unit: QuantityUnit) -> Quantity {
        Quantity { value, unit }
    }

    #[test]
    fn test_unit_normalization() {
        let factors = ImpactFactors::default();

        assert_eq!(normalize_to_kg(&qty(2.0, QuantityUnit::Tonnes), &factors), 2000.0);
        assert_eq!(normalize_to_kg(&qty(1.0, QuantityUnit::Kilograms), &factors), 1.0);
        assert_eq!(normalize_to_kg(&qty(3.0, QuantityUnit::CubicMetres), &factors), 1500.0);
    }

    #[test]
    fn test_two_tonnes_recycled() {
        let derived = compute_derived_fields(
            &qty(2.0, QuantityUnit::Tonnes),
            Destination::Recycling,
            &ImpactFactors::default(),
        );

        assert_eq!(derived.quantity_kg, 2000.0);
        assert!(derived.is_recycled);
        assert_eq!(derived.environmental_impact.co2_saved, 1000.0);
        assert_eq!(derived.environmental_impact.water_saved, 20000.0);
        assert_eq!(derived.environmental_impact.energy_saved, 4000.0);
    }

    #[test]
    fn test_recycled_iff_valorization_destination() {
        let factors = ImpactFactors::default();
        for destination in Destination::ALL {
            let derived = compute_derived_fields(&qty(10.0, QuantityUnit::Kilograms), destination, &factors);
            assert_eq!(derived.is_recycled, destination.is_valorization(), "{destination}");
            if !derived.is_recycled {
                assert!(derived.environmental_impact.is_zero(), "{destination}");
            }
        }
    }

    #[test]
    fn test_zero_quantity_has_no_impact() {
        let derived = compute_derived_fields(
            &qty(0.0, QuantityUnit::Tonnes),
            Destination::Composting,
            &ImpactFactors::default(),
        );
        assert!(derived.is_recycled);
        assert!(derived.environmental_impact.is_zero());
    }

    #[test]
    fn test_custom_factors_are_honoured() {
        let factors = ImpactFactors {
            version: "test".to_string(),
            m3_to_kg: 250.0,
            co2_kg_per_kg: 1.5,
            ..ImpactFactors::default()
        };

        let derived = compute_derived_fields(&qty(2.0, QuantityUnit::CubicMetres), Destination::EnergyRecovery, &factors);
        assert_eq!(derived.quantity_kg, 500.0);
        assert_eq!(derived.environmental_impact.co2_saved, 750.0);
    }

    #[test]
    fn test_computation_is_idempotent() {
        let factors = ImpactFactors::default();
        let quantity = qty(7.25, QuantityUnit::Tonnes);
        let first = compute_derived_fields(&quantity, Destination::Recycling, &factors);
        let second = compute_derived_fields(&quantity, Destination::Recycling, &factors);
        assert_eq!(first, second);
    }
}
