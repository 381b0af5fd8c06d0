use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Declaration Value Objects
// ============================================================================
//
// The closed vocabularies (category, unit, destination, status, document kind)
// carry their wire labels; `FromStr` and serde accept exactly those labels.
//
// ============================================================================

/// Unknown label for one of the closed vocabularies
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unknown {kind} {value:?}")]
pub struct UnknownLabel {
    pub kind: &'static str,
    pub value: String,
}

fn parse_label<T: Copy>(
    kind: &'static str,
    all: &[T],
    label: fn(T) -> &'static str,
    value: &str,
) -> Result<T, UnknownLabel> {
    all.iter()
        .copied()
        .find(|candidate| label(*candidate) == value.trim())
        .ok_or_else(|| UnknownLabel { kind, value: value.to_string() })
}

/// Regulatory waste category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WasteCategory {
    Hazardous,
    #[serde(rename = "Non-hazardous")]
    NonHazardous,
    Inert,
    Electronic,
    Organic,
}

impl WasteCategory {
    pub const ALL: [WasteCategory; 5] = [
        WasteCategory::Hazardous,
        WasteCategory::NonHazardous,
        WasteCategory::Inert,
        WasteCategory::Electronic,
        WasteCategory::Organic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WasteCategory::Hazardous => "Hazardous",
            WasteCategory::NonHazardous => "Non-hazardous",
            WasteCategory::Inert => "Inert",
            WasteCategory::Electronic => "Electronic",
            WasteCategory::Organic => "Organic",
        }
    }
}

/// Unit a quantity was declared in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuantityUnit {
    #[serde(rename = "kg")]
    Kilograms,
    #[serde(rename = "t")]
    Tonnes,
    #[serde(rename = "m3")]
    CubicMetres,
}

impl QuantityUnit {
    pub const ALL: [QuantityUnit; 3] = [
        QuantityUnit::Kilograms,
        QuantityUnit::Tonnes,
        QuantityUnit::CubicMetres,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            QuantityUnit::Kilograms => "kg",
            QuantityUnit::Tonnes => "t",
            QuantityUnit::CubicMetres => "m3",
        }
    }
}

/// Where the waste ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Destination {
    Recycling,
    #[serde(rename = "Energy-recovery")]
    EnergyRecovery,
    Landfill,
    Incineration,
    Composting,
}

impl Destination {
    pub const ALL: [Destination; 5] = [
        Destination::Recycling,
        Destination::EnergyRecovery,
        Destination::Landfill,
        Destination::Incineration,
        Destination::Composting,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Destination::Recycling => "Recycling",
            Destination::EnergyRecovery => "Energy-recovery",
            Destination::Landfill => "Landfill",
            Destination::Incineration => "Incineration",
            Destination::Composting => "Composting",
        }
    }

    /// Material or energy recovery, counted as recycled
    pub fn is_valorization(self) -> bool {
        matches!(
            self,
            Destination::Recycling | Destination::EnergyRecovery | Destination::Composting
        )
    }
}

/// Lifecycle status of a declaration (transitions live in `status.rs`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclarationStatus {
    Draft,
    Declared,
    Collected,
    Processed,
    Cancelled,
}

impl DeclarationStatus {
    pub const ALL: [DeclarationStatus; 5] = [
        DeclarationStatus::Draft,
        DeclarationStatus::Declared,
        DeclarationStatus::Collected,
        DeclarationStatus::Processed,
        DeclarationStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeclarationStatus::Draft => "Draft",
            DeclarationStatus::Declared => "Declared",
            DeclarationStatus::Collected => "Collected",
            DeclarationStatus::Processed => "Processed",
            DeclarationStatus::Cancelled => "Cancelled",
        }
    }
}

/// Kind of attached document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DocumentKind {
    #[serde(rename = "BSD")]
    Bsd,
    Invoice,
    Certificate,
    Photo,
    #[default]
    Other,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 5] = [
        DocumentKind::Bsd,
        DocumentKind::Invoice,
        DocumentKind::Certificate,
        DocumentKind::Photo,
        DocumentKind::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Bsd => "BSD",
            DocumentKind::Invoice => "Invoice",
            DocumentKind::Certificate => "Certificate",
            DocumentKind::Photo => "Photo",
            DocumentKind::Other => "Other",
        }
    }
}

impl FromStr for WasteCategory {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("waste category", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for QuantityUnit {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("quantity unit", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for Destination {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("destination", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for DeclarationStatus {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("status", &Self::ALL, Self::as_str, s)
    }
}

impl FromStr for DocumentKind {
    type Err = UnknownLabel;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_label("document kind", &Self::ALL, Self::as_str, s)
    }
}

impl fmt::Display for WasteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for QuantityUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for DeclarationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

// ============================================================================
// Composite Values
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WasteType {
    pub name: String,
    pub code: String,
    pub category: WasteCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    pub value: f64,
    pub unit: QuantityUnit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cost {
    pub amount: f64,
    pub currency: String,
}

impl Default for Cost {
    fn default() -> Self {
        Self { amount: 0.0, currency: "EUR".to_string() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// Production site the waste comes from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub name: Option<String>,
    pub address: Option<String>,
    pub coordinates: Option<Coordinates>,
}

/// Attachment reference; the file itself lives with the upload service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRef {
    #[serde(rename = "type")]
    pub kind: DocumentKind,
    pub name: String,
    pub url: String,
    pub uploaded_by: Uuid,
    pub uploaded_at: DateTime<Utc>,
}

/// Who moved the declaration to Processed, and when
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedBy {
    pub user_id: Uuid,
    pub date: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentalImpact {
    /// kg CO2
    pub co2_saved: f64,
    /// litres
    pub water_saved: f64,
    /// kWh
    pub energy_saved: f64,
}

impl EnvironmentalImpact {
    pub fn is_zero(&self) -> bool {
        self.co2_saved == 0.0 && self.water_saved == 0.0 && self.energy_saved == 0.0
    }
}

/// User-supplied fields of a declaration, after validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationDetails {
    pub waste_type: WasteType,
    pub quantity: Quantity,
    pub declaration_date: NaiveDate,
    pub collection_date: NaiveDate,
    pub provider_id: Uuid,
    pub destination: Destination,
    pub recycling_rate: f64,
    pub cost: Cost,
    pub site: Option<Site>,
    pub comments: Option<String>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_parse_back() {
        for category in WasteCategory::ALL {
            assert_eq!(category.as_str().parse::<WasteCategory>().unwrap(), category);
        }
        for destination in Destination::ALL {
            assert_eq!(destination.to_string().parse::<Destination>().unwrap(), destination);
        }
        assert_eq!("m3".parse::<QuantityUnit>().unwrap(), QuantityUnit::CubicMetres);
    }

    #[test]
    fn test_unknown_label_is_rejected() {
        let err = "Radioactive".parse::<WasteCategory>().unwrap_err();
        assert_eq!(err.kind, "waste category");
        assert!("litres".parse::<QuantityUnit>().is_err());
        assert!("recycling".parse::<Destination>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_labels() {
        assert_eq!(serde_json::to_string(&WasteCategory::NonHazardous).unwrap(), "\"Non-hazardous\"");
        assert_eq!(serde_json::to_string(&Destination::EnergyRecovery).unwrap(), "\"Energy-recovery\"");
        assert_eq!(serde_json::to_string(&QuantityUnit::Tonnes).unwrap(), "\"t\"");
        assert_eq!(serde_json::to_string(&DocumentKind::Bsd).unwrap(), "\"BSD\"");
    }

    #[test]
    fn test_valorization_destinations() {
        let recycled: Vec<Destination> = Destination::ALL
            .into_iter()
            .filter(|d| d.is_valorization())
            .collect();

        assert_eq!(
            recycled,
            vec![Destination::Recycling, Destination::EnergyRecovery, Destination::Composting]
        );
    }
}
