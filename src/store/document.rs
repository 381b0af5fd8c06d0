use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::declaration::{
    Cost, Declaration, DeclarationDetails, DeclarationStatus, DerivedFields, Destination,
    DocumentRef, EnvironmentalImpact, Quantity, Site, TrackingNumber, ValidatedBy, WasteType,
};

// ============================================================================
// Nested Document Serialization
// ============================================================================
//
// Document-database shape of a declaration: references are plain ids under
// their collection names, the tracking number is `bsdNumber`, the validator
// is `validatedBy.user` and the version is `__v`.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationDocument {
    #[serde(rename = "_id")]
    pub id: Uuid,
    #[serde(rename = "__v")]
    pub version: i64,
    pub company: Uuid,
    pub declared_by: Uuid,
    pub waste_type: WasteType,
    pub quantity: Quantity,
    pub quantity_in_kg: f64,
    pub declaration_date: NaiveDate,
    pub collection_date: NaiveDate,
    pub provider: Uuid,
    pub destination: Destination,
    pub is_recycled: bool,
    pub recycling_rate: f64,
    pub cost: Cost,
    #[serde(default)]
    pub documents: Vec<DocumentRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<Site>,
    pub status: DeclarationStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bsd_number: Option<TrackingNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validated_by: Option<ValidatorRef>,
    #[serde(default)]
    pub environmental_impact: EnvironmentalImpact,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidatorRef {
    pub user: Uuid,
    pub date: DateTime<Utc>,
}

impl From<&Declaration> for DeclarationDocument {
    fn from(declaration: &Declaration) -> Self {
        let details = &declaration.details;
        Self {
            id: declaration.id,
            version: declaration.version,
            company: declaration.company_id,
            declared_by: declaration.declared_by,
            waste_type: details.waste_type.clone(),
            quantity: details.quantity,
            quantity_in_kg: declaration.derived.quantity_kg,
            declaration_date: details.declaration_date,
            collection_date: details.collection_date,
            provider: details.provider_id,
            destination: details.destination,
            is_recycled: declaration.derived.is_recycled,
            recycling_rate: details.recycling_rate,
            cost: details.cost.clone(),
            documents: declaration.documents.clone(),
            site: details.site.clone(),
            status: declaration.status,
            bsd_number: declaration.tracking_number.clone(),
            comments: details.comments.clone(),
            validated_by: declaration.validated_by.map(|v| ValidatorRef { user: v.user_id, date: v.date }),
            environmental_impact: declaration.derived.environmental_impact,
            created_at: declaration.created_at,
            updated_at: declaration.updated_at,
        }
    }
}

impl From<DeclarationDocument> for Declaration {
    fn from(doc: DeclarationDocument) -> Self {
        Self {
            id: doc.id,
            version: doc.version,
            company_id: doc.company,
            declared_by: doc.declared_by,
            details: DeclarationDetails {
                waste_type: doc.waste_type,
                quantity: doc.quantity,
                declaration_date: doc.declaration_date,
                collection_date: doc.collection_date,
                provider_id: doc.provider,
                destination: doc.destination,
                recycling_rate: doc.recycling_rate,
                cost: doc.cost,
                site: doc.site,
                comments: doc.comments,
            },
            derived: DerivedFields {
                quantity_kg: doc.quantity_in_kg,
                is_recycled: doc.is_recycled,
                environmental_impact: doc.environmental_impact,
            },
            status: doc.status,
            tracking_number: doc.bsd_number,
            validated_by: doc.validated_by.map(|v| ValidatedBy { user_id: v.user, date: v.date }),
            documents: doc.documents,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::domain::declaration::aggregate::tests::{details, record_command};
    use crate::domain::declaration::{DocumentKind, QuantityUnit, WasteCategory};

    fn processed_hazardous() -> Declaration {
        let mut command = record_command(
            details(WasteCategory::Hazardous, 1.5, QuantityUnit::Tonnes, Destination::EnergyRecovery),
            DeclarationStatus::Declared,
        );
        command.tracking_number = Some(TrackingNumber::from_parts(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 77));
        let mut declaration = Declaration::open(&command).unwrap().0;
        declaration.documents.push(DocumentRef {
            kind: DocumentKind::Bsd,
            name: "bsd.pdf".into(),
            url: "/uploads/bsd.pdf".into(),
            uploaded_by: declaration.declared_by,
            uploaded_at: declaration.created_at,
        });
        declaration.status = DeclarationStatus::Processed;
        declaration.validated_by = Some(ValidatedBy { user_id: Uuid::new_v4(), date: Utc::now() });
        declaration
    }

    #[test]
    fn test_document_field_names() {
        let json = serde_json::to_value(DeclarationDocument::from(&processed_hazardous())).unwrap();

        assert!(json["_id"].is_string());
        assert_eq!(json["__v"], 2);
        assert_eq!(json["bsdNumber"], "BSD-202507-0077");
        assert_eq!(json["quantityInKg"], 1500.0);
        assert_eq!(json["destination"], "Energy-recovery");
        assert_eq!(json["documents"][0]["type"], "BSD");
        assert!(json["validatedBy"]["user"].is_string());
        assert!(json.get("site").is_none());
    }

    #[test]
    fn test_document_preserves_the_model() {
        let declaration = processed_hazardous();
        let json = serde_json::to_string(&DeclarationDocument::from(&declaration)).unwrap();
        let back: DeclarationDocument = serde_json::from_str(&json).unwrap();

        assert_eq!(Declaration::from(back), declaration);
    }
}
