use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::ValidationErrors;
use super::value_objects::{
    Cost, DeclarationDetails, DeclarationStatus, Destination, DocumentKind, DocumentRef, Quantity,
    QuantityUnit, Site, WasteCategory, WasteType,
};

// ============================================================================
// Declaration Validator
// ============================================================================
//
// Turns an untrusted payload into typed declaration fields, or reports every
// offending field at once. No I/O.
//
// ============================================================================

/// Raw declaration payload as received from a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeclarationPayload {
    pub waste_type: Option<WasteTypeInput>,
    pub quantity: Option<QuantityInput>,
    pub declaration_date: Option<String>,
    pub collection_date: Option<String>,
    pub provider_id: Option<String>,
    pub destination: Option<String>,
    pub recycling_rate: Option<f64>,
    pub cost: Option<CostInput>,
    pub site: Option<Site>,
    pub comments: Option<String>,
    /// "Draft" to keep the declaration as a draft, defaults to "Declared"
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WasteTypeInput {
    pub name: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuantityInput {
    /// Number or numeric string
    pub value: Option<serde_json::Value>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CostInput {
    pub amount: Option<f64>,
    pub currency: Option<String>,
}

/// Payload that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedDeclaration {
    pub waste_type: WasteType,
    pub quantity: Quantity,
    /// Absent means "today" on creation, "unchanged" on update
    pub declaration_date: Option<NaiveDate>,
    pub collection_date: NaiveDate,
    pub provider_id: Uuid,
    pub destination: Destination,
    pub recycling_rate: f64,
    pub cost: Cost,
    pub site: Option<Site>,
    pub comments: Option<String>,
    pub requested_status: Option<DeclarationStatus>,
}

impl ValidatedDeclaration {
    pub fn initial_status(&self) -> DeclarationStatus {
        self.requested_status.unwrap_or(DeclarationStatus::Declared)
    }

    pub fn into_details(self, default_declaration_date: NaiveDate) -> DeclarationDetails {
        DeclarationDetails {
            waste_type: self.waste_type,
            quantity: self.quantity,
            declaration_date: self.declaration_date.unwrap_or(default_declaration_date),
            collection_date: self.collection_date,
            provider_id: self.provider_id,
            destination: self.destination,
            recycling_rate: self.recycling_rate,
            cost: self.cost,
            site: self.site,
            comments: self.comments,
        }
    }
}

const REQUIRED: &str = "is required";

/// Validate a declaration payload
pub fn validate_declaration(payload: &DeclarationPayload) -> Result<ValidatedDeclaration, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let waste_input = payload.waste_type.clone().unwrap_or_default();
    let name = required_text(&mut errors, "wasteType.name", waste_input.name.as_deref());
    let code = required_text(&mut errors, "wasteType.code", waste_input.code.as_deref());
    let category = required_label::<WasteCategory>(&mut errors, "wasteType.category", waste_input.category.as_deref());

    let quantity_input = payload.quantity.clone().unwrap_or_default();
    let value = quantity_value(&mut errors, quantity_input.value.as_ref());
    let unit = required_label::<QuantityUnit>(&mut errors, "quantity.unit", quantity_input.unit.as_deref());

    let declaration_date = match payload.declaration_date.as_deref() {
        None => None,
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("declarationDate", "must be an ISO 8601 date");
            }
            parsed
        }
    };

    let collection_date = match payload.collection_date.as_deref() {
        None => {
            errors.push("collectionDate", REQUIRED);
            None
        }
        Some(raw) => {
            let parsed = parse_date(raw);
            if parsed.is_none() {
                errors.push("collectionDate", "must be an ISO 8601 date");
            }
            parsed
        }
    };

    let provider_id = match payload.provider_id.as_deref().map(str::trim) {
        None | Some("") => {
            errors.push("providerId", REQUIRED);
            None
        }
        Some(raw) => {
            let parsed = Uuid::parse_str(raw).ok();
            if parsed.is_none() {
                errors.push("providerId", "must be a valid identifier");
            }
            parsed
        }
    };

    let destination = required_label::<Destination>(&mut errors, "destination", payload.destination.as_deref());

    let recycling_rate = payload.recycling_rate.unwrap_or(0.0);
    if !recycling_rate.is_finite() || !(0.0..=100.0).contains(&recycling_rate) {
        errors.push("recyclingRate", "must be between 0 and 100");
    }

    let cost_input = payload.cost.clone().unwrap_or_default();
    let amount = cost_input.amount.unwrap_or(0.0);
    if !amount.is_finite() || amount < 0.0 {
        errors.push("cost.amount", "must be a non-negative number");
    }
    let currency = cost_input
        .currency
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| Cost::default().currency);

    if let Some(coords) = payload.site.as_ref().and_then(|s| s.coordinates) {
        if !(-90.0..=90.0).contains(&coords.lat) || !(-180.0..=180.0).contains(&coords.lng) {
            errors.push("site.coordinates", "must be a valid latitude/longitude pair");
        }
    }

    let requested_status = match payload.status.as_deref() {
        None => None,
        Some(raw) => match DeclarationStatus::from_str(raw) {
            Ok(status) if status.is_initial() => Some(status),
            _ => {
                errors.push("status", "must be Draft or Declared");
                None
            }
        },
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    // Every Option below is Some once no error was recorded
    match (name, code, category, value, unit, collection_date, provider_id, destination) {
        (
            Some(name),
            Some(code),
            Some(category),
            Some(value),
            Some(unit),
            Some(collection_date),
            Some(provider_id),
            Some(destination),
        ) => Ok(ValidatedDeclaration {
            waste_type: WasteType { name, code, category },
            quantity: Quantity { value, unit },
            declaration_date,
            collection_date,
            provider_id,
            destination,
            recycling_rate,
            cost: Cost { amount, currency },
            site: payload.site.clone(),
            comments: payload
                .comments
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
            requested_status,
        }),
        _ => Err(ValidationErrors::single("payload", "is incomplete")),
    }
}

fn required_text(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<String> {
    match value.map(str::trim) {
        Some(text) if !text.is_empty() => Some(text.to_string()),
        _ => {
            errors.push(field, REQUIRED);
            None
        }
    }
}

fn required_label<T: FromStr>(errors: &mut ValidationErrors, field: &str, value: Option<&str>) -> Option<T> {
    match value.map(str::trim) {
        None | Some("") => {
            errors.push(field, REQUIRED);
            None
        }
        Some(raw) => match raw.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(_) => {
                errors.push(field, format!("{:?} is not an accepted value", raw));
                None
            }
        },
    }
}

fn quantity_value(errors: &mut ValidationErrors, value: Option<&serde_json::Value>) -> Option<f64> {
    let number = match value {
        None | Some(serde_json::Value::Null) => {
            errors.push("quantity.value", REQUIRED);
            return None;
        }
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match number {
        Some(n) if n.is_finite() && n >= 0.0 => Some(n),
        Some(n) if n.is_finite() => {
            errors.push("quantity.value", "must be greater than or equal to 0");
            None
        }
        _ => {
            errors.push("quantity.value", "must be numeric");
            None
        }
    }
}

/// Attachment metadata handed over by the upload collaborator
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentUpload {
    /// One of BSD, Invoice, Certificate, Photo, Other; defaults to Other
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    pub url: Option<String>,
}

pub fn validate_document(
    upload: &DocumentUpload,
    uploaded_by: Uuid,
    uploaded_at: DateTime<Utc>,
) -> Result<DocumentRef, ValidationErrors> {
    let mut errors = ValidationErrors::default();

    let kind = match upload.kind.as_deref().map(str::trim) {
        None | Some("") => Some(DocumentKind::default()),
        Some(raw) => match raw.parse::<DocumentKind>() {
            Ok(kind) => Some(kind),
            Err(_) => {
                errors.push("document.type", format!("{:?} is not an accepted value", raw));
                None
            }
        },
    };
    let name = required_text(&mut errors, "document.name", upload.name.as_deref());
    let url = required_text(&mut errors, "document.url", upload.url.as_deref());

    match (kind, name, url) {
        (Some(kind), Some(name), Some(url)) if errors.is_empty() => Ok(DocumentRef {
            kind,
            name,
            url,
            uploaded_by,
            uploaded_at,
        }),
        _ => Err(errors),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp
pub(crate) fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> DeclarationPayload {
        serde_json::from_value(value).unwrap()
    }

    fn valid_json() -> serde_json::Value {
        json!({
            "wasteType": { "name": "Cardboard", "code": "15 01 01", "category": "Non-hazardous" },
            "quantity": { "value": 2, "unit": "t" },
            "collectionDate": "2025-07-14",
            "providerId": "7b1d0c5e-3f7a-4f0e-9d1b-2c5e8f6a9b10",
            "destination": "Recycling",
            "cost": { "amount": 120.5 }
        })
    }

    #[test]
    fn test_valid_payload() {
        let validated = validate_declaration(&payload(valid_json())).unwrap();

        assert_eq!(validated.waste_type.category, WasteCategory::NonHazardous);
        assert_eq!(validated.quantity, Quantity { value: 2.0, unit: QuantityUnit::Tonnes });
        assert_eq!(validated.destination, Destination::Recycling);
        assert_eq!(validated.recycling_rate, 0.0);
        assert_eq!(validated.cost.currency, "EUR");
        assert_eq!(validated.initial_status(), DeclarationStatus::Declared);
        assert!(validated.declaration_date.is_none());
    }

    #[test]
    fn test_missing_required_fields_are_all_reported() {
        let errors = validate_declaration(&DeclarationPayload::default()).unwrap_err();

        for field in [
            "wasteType.name",
            "wasteType.code",
            "wasteType.category",
            "quantity.value",
            "quantity.unit",
            "collectionDate",
            "providerId",
            "destination",
        ] {
            assert!(errors.has_field(field), "missing error for {field}");
        }
    }

    #[test]
    fn test_negative_quantity_rejected() {
        let mut json = valid_json();
        json["quantity"]["value"] = json!(-1);
        let errors = validate_declaration(&payload(json)).unwrap_err();
        assert_eq!(errors.errors.len(), 1);
        assert!(errors.has_field("quantity.value"));
    }

    #[test]
    fn test_non_numeric_quantity_rejected() {
        let mut json = valid_json();
        json["quantity"]["value"] = json!("a lot");
        assert!(validate_declaration(&payload(json)).unwrap_err().has_field("quantity.value"));

        let mut json = valid_json();
        json["quantity"]["value"] = json!("12.5");
        assert_eq!(validate_declaration(&payload(json)).unwrap().quantity.value, 12.5);
    }

    #[test]
    fn test_out_of_set_labels_rejected() {
        let mut json = valid_json();
        json["wasteType"]["category"] = json!("Radioactive");
        json["quantity"]["unit"] = json!("litre");
        json["destination"] = json!("Ocean");

        let errors = validate_declaration(&payload(json)).unwrap_err();
        assert!(errors.has_field("wasteType.category"));
        assert!(errors.has_field("quantity.unit"));
        assert!(errors.has_field("destination"));
    }

    #[test]
    fn test_recycling_rate_bounds() {
        let mut json = valid_json();
        json["recyclingRate"] = json!(100);
        assert_eq!(validate_declaration(&payload(json)).unwrap().recycling_rate, 100.0);

        let mut json = valid_json();
        json["recyclingRate"] = json!(100.5);
        assert!(validate_declaration(&payload(json)).unwrap_err().has_field("recyclingRate"));
    }

    #[test]
    fn test_status_may_only_request_draft_or_declared() {
        let mut json = valid_json();
        json["status"] = json!("Draft");
        assert_eq!(
            validate_declaration(&payload(json)).unwrap().initial_status(),
            DeclarationStatus::Draft
        );

        let mut json = valid_json();
        json["status"] = json!("Processed");
        assert!(validate_declaration(&payload(json)).unwrap_err().has_field("status"));
    }

    #[test]
    fn test_dates_accept_timestamps() {
        let mut json = valid_json();
        json["collectionDate"] = json!("2025-07-14T09:30:00Z");
        json["declarationDate"] = json!("2025-07-01");
        let validated = validate_declaration(&payload(json)).unwrap();

        assert_eq!(validated.collection_date, NaiveDate::from_ymd_opt(2025, 7, 14).unwrap());
        assert_eq!(validated.declaration_date, NaiveDate::from_ymd_opt(2025, 7, 1));

        let mut json = valid_json();
        json["collectionDate"] = json!("14/07/2025");
        assert!(validate_declaration(&payload(json)).unwrap_err().has_field("collectionDate"));
    }

    #[test]
    fn test_invalid_provider_identifier() {
        let mut json = valid_json();
        json["providerId"] = json!("not-an-id");
        assert!(validate_declaration(&payload(json)).unwrap_err().has_field("providerId"));
    }

    #[test]
    fn test_document_kind_defaults_to_other() {
        let upload = DocumentUpload { kind: None, name: Some("scan.pdf".into()), url: Some("/uploads/scan.pdf".into()) };
        let document = validate_document(&upload, Uuid::new_v4(), Utc::now()).unwrap();
        assert_eq!(document.kind, DocumentKind::Other);
        assert_eq!(document.name, "scan.pdf");
    }

    #[test]
    fn test_document_rejects_unknown_kind_and_missing_url() {
        let upload = DocumentUpload { kind: Some("Receipt".into()), name: Some("r.pdf".into()), url: None };
        let errors = validate_document(&upload, Uuid::new_v4(), Utc::now()).unwrap_err();
        assert!(errors.has_field("document.type"));
        assert!(errors.has_field("document.url"));
    }
}
