use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::domain::declaration::{
    Coordinates, Cost, Declaration, DeclarationDetails, DeclarationStatus, DerivedFields,
    Destination, DocumentRef, EnvironmentalImpact, Quantity, QuantityUnit, Site, TrackingNumber,
    ValidatedBy, WasteCategory, WasteType,
};
use super::StoreError;

// ============================================================================
// Flat Relational Serialization
// ============================================================================

/// Column order shared by every SELECT and by `bind_row`
pub const COLUMNS: [&str; 33] = [
    "id",
    "version",
    "company_id",
    "declared_by",
    "waste_name",
    "waste_code",
    "waste_category",
    "quantity_value",
    "quantity_unit",
    "quantity_kg",
    "declaration_date",
    "collection_date",
    "provider_id",
    "destination",
    "is_recycled",
    "recycling_rate",
    "cost_amount",
    "cost_currency",
    "status",
    "tracking_number",
    "validated_by_user",
    "validated_at",
    "co2_saved",
    "water_saved",
    "energy_saved",
    "site_name",
    "site_address",
    "site_lat",
    "site_lng",
    "comments",
    "documents",
    "created_at",
    "updated_at",
];

/// One `waste_declarations` row
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct DeclarationRow {
    pub id: Uuid,
    pub version: i64,
    pub company_id: Uuid,
    pub declared_by: Uuid,
    pub waste_name: String,
    pub waste_code: String,
    pub waste_category: String,
    pub quantity_value: f64,
    pub quantity_unit: String,
    pub quantity_kg: f64,
    pub declaration_date: NaiveDate,
    pub collection_date: NaiveDate,
    pub provider_id: Uuid,
    pub destination: String,
    pub is_recycled: bool,
    pub recycling_rate: f64,
    pub cost_amount: f64,
    pub cost_currency: String,
    pub status: String,
    pub tracking_number: Option<String>,
    pub validated_by_user: Option<Uuid>,
    pub validated_at: Option<DateTime<Utc>>,
    pub co2_saved: f64,
    pub water_saved: f64,
    pub energy_saved: f64,
    pub site_name: Option<String>,
    pub site_address: Option<String>,
    pub site_lat: Option<f64>,
    pub site_lng: Option<f64>,
    pub comments: Option<String>,
    /// JSON array of attachment references
    pub documents: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeclarationRow {
    pub fn from_declaration(declaration: &Declaration) -> Result<Self, StoreError> {
        let details = &declaration.details;
        let site = details.site.clone().unwrap_or_default();
        let coordinates = site.coordinates;

        Ok(Self {
            id: declaration.id,
            version: declaration.version,
            company_id: declaration.company_id,
            declared_by: declaration.declared_by,
            waste_name: details.waste_type.name.clone(),
            waste_code: details.waste_type.code.clone(),
            waste_category: details.waste_type.category.as_str().to_string(),
            quantity_value: details.quantity.value,
            quantity_unit: details.quantity.unit.as_str().to_string(),
            quantity_kg: declaration.derived.quantity_kg,
            declaration_date: details.declaration_date,
            collection_date: details.collection_date,
            provider_id: details.provider_id,
            destination: details.destination.as_str().to_string(),
            is_recycled: declaration.derived.is_recycled,
            recycling_rate: details.recycling_rate,
            cost_amount: details.cost.amount,
            cost_currency: details.cost.currency.clone(),
            status: declaration.status.as_str().to_string(),
            tracking_number: declaration.tracking_number.as_ref().map(|n| n.to_string()),
            validated_by_user: declaration.validated_by.map(|v| v.user_id),
            validated_at: declaration.validated_by.map(|v| v.date),
            co2_saved: declaration.derived.environmental_impact.co2_saved,
            water_saved: declaration.derived.environmental_impact.water_saved,
            energy_saved: declaration.derived.environmental_impact.energy_saved,
            site_name: site.name,
            site_address: site.address,
            site_lat: coordinates.map(|c| c.lat),
            site_lng: coordinates.map(|c| c.lng),
            comments: details.comments.clone(),
            documents: serde_json::to_string(&declaration.documents)?,
            created_at: declaration.created_at,
            updated_at: declaration.updated_at,
        })
    }

    pub fn into_declaration(self) -> Result<Declaration, StoreError> {
        let id = self.id;
        let codec = move |e: &dyn std::fmt::Display| StoreError::Codec(format!("declaration {}: {}", id, e));

        let category = self.waste_category.parse::<WasteCategory>().map_err(|e| codec(&e))?;
        let unit = self.quantity_unit.parse::<QuantityUnit>().map_err(|e| codec(&e))?;
        let destination = self.destination.parse::<Destination>().map_err(|e| codec(&e))?;
        let status = self.status.parse::<DeclarationStatus>().map_err(|e| codec(&e))?;
        let tracking_number = self
            .tracking_number
            .as_deref()
            .map(TrackingNumber::parse)
            .transpose()
            .map_err(|e| codec(&e))?;
        let validated_by = match (self.validated_by_user, self.validated_at) {
            (Some(user_id), Some(date)) => Some(ValidatedBy { user_id, date }),
            (None, None) => None,
            _ => return Err(codec(&"validator user and date must be set together")),
        };
        let documents: Vec<DocumentRef> = serde_json::from_str(&self.documents).map_err(|e| codec(&e))?;

        let coordinates = match (self.site_lat, self.site_lng) {
            (Some(lat), Some(lng)) => Some(Coordinates { lat, lng }),
            _ => None,
        };
        let site = if self.site_name.is_some() || self.site_address.is_some() || coordinates.is_some() {
            Some(Site { name: self.site_name, address: self.site_address, coordinates })
        } else {
            None
        };

        Ok(Declaration {
            id: self.id,
            version: self.version,
            company_id: self.company_id,
            declared_by: self.declared_by,
            details: DeclarationDetails {
                waste_type: WasteType { name: self.waste_name, code: self.waste_code, category },
                quantity: Quantity { value: self.quantity_value, unit },
                declaration_date: self.declaration_date,
                collection_date: self.collection_date,
                provider_id: self.provider_id,
                destination,
                recycling_rate: self.recycling_rate,
                cost: Cost { amount: self.cost_amount, currency: self.cost_currency },
                site,
                comments: self.comments,
            },
            derived: DerivedFields {
                quantity_kg: self.quantity_kg,
                is_recycled: self.is_recycled,
                environmental_impact: EnvironmentalImpact {
                    co2_saved: self.co2_saved,
                    water_saved: self.water_saved,
                    energy_saved: self.energy_saved,
                },
            },
            status,
            tracking_number,
            validated_by,
            documents,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::declaration::aggregate::tests::{details, record_command};

    fn with_site() -> Declaration {
        let mut d = details(WasteCategory::Hazardous, 3.0, QuantityUnit::CubicMetres, Destination::Incineration);
        d.site = Some(Site {
            name: Some("Plant 2".into()),
            address: None,
            coordinates: Some(Coordinates { lat: 45.76, lng: 4.83 }),
        });
        d.comments = Some("drums".into());
        let mut command = record_command(d, DeclarationStatus::Declared);
        command.tracking_number = Some(TrackingNumber::from_parts(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 5));
        Declaration::open(&command).unwrap().0
    }

    #[test]
    fn test_row_uses_wire_labels() {
        let row = DeclarationRow::from_declaration(&with_site()).unwrap();

        assert_eq!(row.waste_category, "Hazardous");
        assert_eq!(row.quantity_unit, "m3");
        assert_eq!(row.quantity_kg, 1500.0);
        assert_eq!(row.status, "Declared");
        assert_eq!(row.tracking_number.as_deref(), Some("BSD-202507-0005"));
        assert_eq!(row.documents, "[]");
    }

    #[test]
    fn test_row_preserves_the_model() {
        let declaration = with_site();
        let row = DeclarationRow::from_declaration(&declaration).unwrap();
        assert_eq!(row.into_declaration().unwrap(), declaration);
    }

    #[test]
    fn test_corrupt_row_is_a_codec_error() {
        let mut row = DeclarationRow::from_declaration(&with_site()).unwrap();
        row.status = "Archived".into();
        assert!(matches!(row.into_declaration(), Err(StoreError::Codec(_))));
    }
}
