//! Column mapping: heuristic detection plus manual override.
//!
//! Each semantic field is resolved by scanning the headers in order and
//! taking the first one whose lowercased name contains one of the field's
//! keywords. The scans are independent, so one header may be detected for
//! more than one field.

use crate::error::{EnrichmentError, Result};
use crate::types::{ColumnMapping, SemanticField};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Keywords matched against lowercased header names.
fn keywords(field: SemanticField) -> &'static [&'static str] {
    match field {
        SemanticField::Address => &["alamat", "address"],
        SemanticField::District => &["kecamatan", "district"],
        SemanticField::Subdistrict => &["kelurahan", "desa", "village"],
    }
}

/// A mapping where any field may still be unresolved.
///
/// Used both for detection results and for user overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialMapping {
    pub address: Option<String>,
    pub district: Option<String>,
    pub subdistrict: Option<String>,
}

impl PartialMapping {
    pub fn get(&self, field: SemanticField) -> Option<&str> {
        match field {
            SemanticField::Address => self.address.as_deref(),
            SemanticField::District => self.district.as_deref(),
            SemanticField::Subdistrict => self.subdistrict.as_deref(),
        }
    }

    fn slot(&mut self, field: SemanticField) -> &mut Option<String> {
        match field {
            SemanticField::Address => &mut self.address,
            SemanticField::District => &mut self.district,
            SemanticField::Subdistrict => &mut self.subdistrict,
        }
    }

    /// Fields that are unset or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        SemanticField::ALL
            .iter()
            .filter(|f| self.get(**f).is_none_or(|v| v.trim().is_empty()))
            .map(|f| f.as_str())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Overlay `overrides` on top of `self`; a set override always wins.
    pub fn with_overrides(&self, overrides: &PartialMapping) -> PartialMapping {
        let mut merged = self.clone();
        for field in SemanticField::ALL {
            if let Some(value) = overrides.get(field).filter(|v| !v.trim().is_empty()) {
                *merged.slot(field) = Some(value.to_string());
            }
        }
        merged
    }
}

/// Detect which headers hold the address, district and sub-district.
pub fn detect(headers: &[String]) -> PartialMapping {
    let mut detected = PartialMapping::default();

    for field in SemanticField::ALL {
        let found = headers.iter().find(|header| {
            let lower = header.to_lowercase();
            keywords(field).iter().any(|kw| lower.contains(kw))
        });
        if let Some(header) = found {
            debug!("Detected '{}' as {} column", header, field.as_str());
            *detected.slot(field) = Some(header.clone());
        }
    }

    detected
}

/// Combine detection with overrides into a complete mapping.
///
/// # Errors
///
/// - [`EnrichmentError::MappingIncomplete`] if any field stays unresolved.
/// - [`EnrichmentError::ColumnNotFound`] if a chosen column is not a header.
pub fn resolve(
    headers: &[String],
    detected: &PartialMapping,
    overrides: &PartialMapping,
) -> Result<ColumnMapping> {
    let merged = detected.with_overrides(overrides);

    let missing = merged.missing();
    if !missing.is_empty() {
        return Err(EnrichmentError::MappingIncomplete(missing));
    }

    let mut chosen = Vec::with_capacity(3);
    for field in SemanticField::ALL {
        let column = merged.get(field).unwrap_or_default();
        if !headers.iter().any(|h| h == column) {
            return Err(EnrichmentError::ColumnNotFound(column.to_string()));
        }
        chosen.push(column.to_string());
    }

    let mut it = chosen.into_iter();
    Ok(ColumnMapping {
        address: it.next().unwrap_or_default(),
        district: it.next().unwrap_or_default(),
        subdistrict: it.next().unwrap_or_default(),
    })
}

/// Check that every column of an already built mapping exists.
pub fn validate(headers: &[String], mapping: &ColumnMapping) -> Result<()> {
    for field in SemanticField::ALL {
        let column = mapping.column(field);
        if column.trim().is_empty() {
            return Err(EnrichmentError::MappingIncomplete(vec![field.as_str()]));
        }
        if !headers.iter().any(|h| h == column) {
            return Err(EnrichmentError::ColumnNotFound(column.to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_indonesian_headers() {
        let detected = detect(&headers(&["conversation_id", "Alamat Lengkap", "Kecamatan", "Kelurahan"]));
        assert_eq!(detected.address.as_deref(), Some("Alamat Lengkap"));
        assert_eq!(detected.district.as_deref(), Some("Kecamatan"));
        assert_eq!(detected.subdistrict.as_deref(), Some("Kelurahan"));
    }

    #[test]
    fn test_detect_english_headers() {
        let detected = detect(&headers(&["id", "ADDRESS", "District", "village_name"]));
        assert_eq!(detected.address.as_deref(), Some("ADDRESS"));
        assert_eq!(detected.district.as_deref(), Some("District"));
        assert_eq!(detected.subdistrict.as_deref(), Some("village_name"));
    }

    #[test]
    fn test_detect_first_match_wins() {
        let detected = detect(&headers(&["desa_lama", "kelurahan"]));
        assert_eq!(detected.subdistrict.as_deref(), Some("desa_lama"));
    }

    #[test]
    fn test_detect_scans_are_independent() {
        // "subdistrict" contains "district", so the same header serves both fields.
        let detected = detect(&headers(&["alamat", "subdistrict"]));
        assert_eq!(detected.district.as_deref(), Some("subdistrict"));
        assert_eq!(detected.subdistrict, None);

        let detected = detect(&headers(&["address_village"]));
        assert_eq!(detected.address.as_deref(), Some("address_village"));
        assert_eq!(detected.subdistrict.as_deref(), Some("address_village"));
    }

    #[test]
    fn test_detect_unresolved_fields_are_none() {
        let detected = detect(&headers(&["conversation_id", "notes"]));
        assert_eq!(detected, PartialMapping::default());
        assert_eq!(detected.missing(), vec!["address", "district", "subdistrict"]);
    }

    #[test]
    fn test_override_beats_detection() {
        let hs = headers(&["alamat", "alamat_kantor", "kecamatan", "kelurahan"]);
        let detected = detect(&hs);
        let overrides = PartialMapping {
            address: Some("alamat_kantor".to_string()),
            ..Default::default()
        };
        let mapping = resolve(&hs, &detected, &overrides).unwrap();
        assert_eq!(mapping, ColumnMapping::new("alamat_kantor", "kecamatan", "kelurahan"));
    }

    #[test]
    fn test_resolve_incomplete_mapping() {
        let hs = headers(&["alamat", "kecamatan"]);
        let result = resolve(&hs, &detect(&hs), &PartialMapping::default());
        assert!(matches!(
            result,
            Err(EnrichmentError::MappingIncomplete(ref missing)) if missing == &vec!["subdistrict"]
        ));
    }

    #[test]
    fn test_resolve_rejects_unknown_override() {
        let hs = headers(&["alamat", "kecamatan", "kelurahan"]);
        let overrides = PartialMapping {
            district: Some("kabupaten".to_string()),
            ..Default::default()
        };
        let result = resolve(&hs, &detect(&hs), &overrides);
        assert!(matches!(result, Err(EnrichmentError::ColumnNotFound(_))));
    }

    #[test]
    fn test_validate_mapping() {
        let hs = headers(&["alamat", "kecamatan", "kelurahan"]);
        assert!(validate(&hs, &ColumnMapping::new("alamat", "kecamatan", "kelurahan")).is_ok());
        assert!(validate(&hs, &ColumnMapping::new("alamat", "", "kelurahan")).is_err());
        assert!(validate(&hs, &ColumnMapping::new("alamat", "kecamatan", "desa")).is_err());
    }
}
