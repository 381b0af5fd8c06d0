use std::fmt;

use chrono::{Datelike, NaiveDate};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::value_objects::WasteCategory;

// ============================================================================
// Regulatory Tracking Numbers (BSD)
// ============================================================================
//
// Format: BSD-{YYYY}{MM}-{NNNN}. The suffix is random, so uniqueness is only
// guaranteed by the store; callers retry on collision.
//
// ============================================================================

pub const TRACKING_PREFIX: &str = "BSD";
pub const SUFFIX_RANGE: u16 = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TrackingNumber(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed tracking number {0:?}, expected BSD-YYYYMM-NNNN")]
pub struct MalformedTrackingNumber(pub String);

impl TrackingNumber {
    /// Draw a number for a document issued on `issued_on`
    pub fn generate<R: Rng>(issued_on: NaiveDate, rng: &mut R) -> Self {
        Self::from_parts(issued_on, rng.gen_range(0..SUFFIX_RANGE))
    }

    pub fn from_parts(issued_on: NaiveDate, suffix: u16) -> Self {
        Self(format!(
            "{}-{:04}{:02}-{:04}",
            TRACKING_PREFIX,
            issued_on.year(),
            issued_on.month(),
            suffix % SUFFIX_RANGE
        ))
    }

    pub fn parse(raw: &str) -> Result<Self, MalformedTrackingNumber> {
        let malformed = || MalformedTrackingNumber(raw.to_string());

        let mut parts = raw.split('-');
        let (Some(prefix), Some(period), Some(suffix), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let digits = |s: &str, len: usize| s.len() == len && s.bytes().all(|b| b.is_ascii_digit());
        if prefix != TRACKING_PREFIX || !digits(period, 6) || !digits(suffix, 4) {
            return Err(malformed());
        }

        let month: u32 = period[4..].parse().map_err(|_| malformed())?;
        if !(1..=12).contains(&month) {
            return Err(malformed());
        }

        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// "YYYYMM" part of the number
    pub fn period(&self) -> &str {
        &self.0[TRACKING_PREFIX.len() + 1..TRACKING_PREFIX.len() + 7]
    }
}

impl fmt::Display for TrackingNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TrackingNumber {
    type Error = MalformedTrackingNumber;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TrackingNumber> for String {
    fn from(value: TrackingNumber) -> Self {
        value.0
    }
}

/// Hazardous waste needs a tracking document, issued once
pub fn requires_tracking_number(category: WasteCategory, current: Option<&TrackingNumber>) -> bool {
    category == WasteCategory::Hazardous && current.is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn july_2025() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 7, 18).unwrap()
    }

    #[test]
    fn test_generated_number_format() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let number = TrackingNumber::generate(july_2025(), &mut rng);
            let s = number.as_str();

            assert!(s.starts_with("BSD-202507-"), "{s}");
            assert_eq!(s.len(), "BSD-202507-0000".len());
            assert!(s[11..].bytes().all(|b| b.is_ascii_digit()));
            assert_eq!(number.period(), "202507");
            assert_eq!(TrackingNumber::parse(s).unwrap(), number);
        }
    }

    #[test]
    fn test_suffix_is_zero_padded() {
        let number = TrackingNumber::from_parts(NaiveDate::from_ymd_opt(2026, 1, 3).unwrap(), 42);
        assert_eq!(number.as_str(), "BSD-202601-0042");
    }

    #[test]
    fn test_parse_rejects_malformed_numbers() {
        for raw in ["", "BSD-2025-0001", "XYZ-202507-0001", "BSD-202513-0001", "BSD-202507-12345", "BSD-202507-0001-1"] {
            assert!(TrackingNumber::parse(raw).is_err(), "{raw}");
        }
    }

    #[test]
    fn test_serde_validates_format() {
        let number: TrackingNumber = serde_json::from_str("\"BSD-202507-0815\"").unwrap();
        assert_eq!(number.as_str(), "BSD-202507-0815");
        assert!(serde_json::from_str::<TrackingNumber>("\"BSD-nope\"").is_err());
    }

    #[test]
    fn test_only_unnumbered_hazardous_waste_requires_a_number() {
        let existing = TrackingNumber::from_parts(july_2025(), 1);

        assert!(requires_tracking_number(WasteCategory::Hazardous, None));
        assert!(!requires_tracking_number(WasteCategory::Hazardous, Some(&existing)));
        for category in [WasteCategory::NonHazardous, WasteCategory::Inert, WasteCategory::Electronic, WasteCategory::Organic] {
            assert!(!requires_tracking_number(category, None));
        }
    }
}
