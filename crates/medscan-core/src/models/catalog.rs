//! Reference catalog models.

use serde::{Deserialize, Serialize};

/// Common view over catalog rows the matcher can scan.
pub trait CatalogEntry {
    /// Stable identifier of the entry
    fn id(&self) -> &str;
    /// Canonical display name used for matching
    fn canonical_name(&self) -> &str;
    /// External code (ATC, CIP, LOINC...) if known
    fn code(&self) -> Option<&str>;

    /// Snapshot of this entry for embedding in an extraction result.
    fn to_matched(&self) -> MatchedEntry {
        MatchedEntry {
            id: self.id().to_string(),
            name: self.canonical_name().to_string(),
            code: self.code().map(str::to_string),
        }
    }
}

/// A known drug.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    /// Inactive drugs are kept for history but not matched
    pub active: bool,
}

impl Drug {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: None,
            active: true,
        }
    }
}

impl CatalogEntry for Drug {
    fn id(&self) -> &str {
        &self.id
    }

    fn canonical_name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// A known biomarker with its default reference interval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Biomarker {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
    /// Unit the default range is expressed in
    pub unit: Option<String>,
    pub default_min: Option<f64>,
    pub default_max: Option<f64>,
}

impl Biomarker {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            code: None,
            unit: None,
            default_min: None,
            default_max: None,
        }
    }

    /// Builder-style helper to set the default reference interval.
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.default_min = Some(min);
        self.default_max = Some(max);
        self
    }

    /// Default reference interval; needs both bounds.
    pub fn default_range(&self) -> Option<ReferenceRange> {
        ReferenceRange::new(self.default_min?, self.default_max?)
    }
}

impl CatalogEntry for Biomarker {
    fn id(&self) -> &str {
        &self.id
    }

    fn canonical_name(&self) -> &str {
        &self.name
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }
}

/// A closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ReferenceRange {
    pub min: f64,
    pub max: f64,
}

impl ReferenceRange {
    /// Returns `None` for inverted or non-finite bounds.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min <= max).then_some(Self { min, max })
    }

    /// Bounds are inclusive.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Catalog entry a line item was reconciled with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchedEntry {
    pub id: String,
    pub name: String,
    pub code: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_range_needs_both_bounds() {
        let mut glucose = Biomarker::new("bio-1", "Glucose");
        assert_eq!(glucose.default_range(), None);

        glucose.default_min = Some(70.0);
        assert_eq!(glucose.default_range(), None);

        glucose.default_max = Some(100.0);
        assert_eq!(
            glucose.default_range(),
            Some(ReferenceRange { min: 70.0, max: 100.0 })
        );
    }

    #[test]
    fn test_inverted_range_rejected() {
        assert_eq!(ReferenceRange::new(10.0, 5.0), None);
        assert_eq!(ReferenceRange::new(f64::NAN, 5.0), None);
        assert!(ReferenceRange::new(5.0, 5.0).is_some());
    }

    #[test]
    fn test_range_bounds_inclusive() {
        let range = ReferenceRange::new(70.0, 100.0).unwrap();
        assert!(range.contains(70.0));
        assert!(range.contains(100.0));
        assert!(!range.contains(69.99));
        assert!(!range.contains(100.01));
    }

    #[test]
    fn test_to_matched_snapshot() {
        let mut drug = Drug::new("drug-1", "Paracetamol");
        drug.code = Some("N02BE01".into());

        let matched = drug.to_matched();
        assert_eq!(matched.id, "drug-1");
        assert_eq!(matched.name, "Paracetamol");
        assert_eq!(matched.code.as_deref(), Some("N02BE01"));
    }
}
