//! Vision-model side of the medical document scan pipeline.
//!
//! This crate owns everything that touches model text: the per-document
//! prompts, the `ModelClient` capability the pipeline calls, and the parsing
//! and schema validation of the free-form JSON the model returns.

pub mod client;
pub mod parser;
pub mod prompts;
pub mod schema;

pub use client::*;
pub use parser::*;
pub use prompts::*;
pub use schema::*;

use serde::{Deserialize, Serialize};

/// The two document kinds the pipeline understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Prescription,
    BiologyReport,
}

impl DocumentKind {
    /// Stable identifier used in storage and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "prescription",
            DocumentKind::BiologyReport => "biology_report",
        }
    }

    /// Parse the identifier produced by [`DocumentKind::as_str`].
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "prescription" => Some(DocumentKind::Prescription),
            "biology_report" => Some(DocumentKind::BiologyReport),
            _ => None,
        }
    }

    /// Name of the JSON array holding this document's line items.
    pub fn items_field(&self) -> &'static str {
        match self {
            DocumentKind::Prescription => "medications",
            DocumentKind::BiologyReport => "test_results",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_identifier() {
        for kind in [DocumentKind::Prescription, DocumentKind::BiologyReport] {
            assert_eq!(DocumentKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(DocumentKind::parse("invoice"), None);
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&DocumentKind::BiologyReport).unwrap();
        assert_eq!(json, "\"biology_report\"");
    }
}
