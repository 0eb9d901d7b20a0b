//! Scan records and their extraction lifecycle.

use medscan_llm::DocumentKind;
use serde::{Deserialize, Serialize};

use super::extraction::{ExtractionErrorKind, ExtractionFailure, ExtractionResult, ExtractionSuccess};

/// Where a scan is in its lifecycle.
///
/// ```text
/// pending -> processing -> extracted -> confirmed
///                \-> failed -> pending (reprocess)
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    /// Stored, not yet picked up
    Pending,
    /// An extraction attempt is running or waiting for a retry
    Processing,
    /// Data extracted, awaiting user confirmation
    Extracted,
    /// Extraction ended with an error
    Failed,
    /// User accepted the extracted data
    Confirmed,
}

impl ExtractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Extracted => "extracted",
            Self::Failed => "failed",
            Self::Confirmed => "confirmed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "extracted" => Some(Self::Extracted),
            "failed" => Some(Self::Failed),
            "confirmed" => Some(Self::Confirmed),
            _ => None,
        }
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ExtractionStatus) -> bool {
        use ExtractionStatus::*;
        matches!(
            (self, next),
            (Pending, Processing)
                | (Processing, Extracted)
                | (Processing, Failed)
                | (Extracted, Confirmed)
                | (Failed, Pending)
        )
    }

    /// Confirmed records are never deleted or re-extracted.
    pub fn is_locked(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Persisted outcome of the last extraction attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScanPayload {
    Extracted(ExtractionSuccess),
    Failed(ExtractionFailure),
}

impl ScanPayload {
    /// Status a record carrying this payload ends up in.
    pub fn status(&self) -> ExtractionStatus {
        match self {
            Self::Extracted(_) => ExtractionStatus::Extracted,
            Self::Failed(_) => ExtractionStatus::Failed,
        }
    }

    pub fn error_kind(&self) -> Option<ExtractionErrorKind> {
        match self {
            Self::Extracted(_) => None,
            Self::Failed(failure) => Some(failure.kind()),
        }
    }
}

impl From<ExtractionResult> for ScanPayload {
    fn from(result: ExtractionResult) -> Self {
        match result {
            ExtractionResult::Success(success) => Self::Extracted(success),
            ExtractionResult::Error(failure) => Self::Failed(failure),
        }
    }
}

/// A stored document photo and what was extracted from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanRecord {
    /// Unique record ID
    pub id: String,
    pub kind: DocumentKind,
    /// Key of the photo in the blob store
    pub blob_id: String,
    /// Size of the uploaded photo in bytes
    pub byte_size: u64,
    pub extraction_status: ExtractionStatus,
    /// `None` until the first attempt finishes
    pub extracted_data: Option<ScanPayload>,
    /// Creation timestamp
    pub created_at: String,
    /// Last update timestamp
    pub updated_at: String,
}

impl ScanRecord {
    /// Create a new pending record.
    pub fn new(kind: DocumentKind, blob_id: impl Into<String>, byte_size: u64) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            blob_id: blob_id.into(),
            byte_size,
            extraction_status: ExtractionStatus::Pending,
            extracted_data: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Extraction error of a failed record.
    pub fn failure(&self) -> Option<&ExtractionFailure> {
        match &self.extracted_data {
            Some(ScanPayload::Failed(failure)) => Some(failure),
            _ => None,
        }
    }

    /// Extracted data of an extracted or confirmed record.
    pub fn extraction(&self) -> Option<&ExtractionSuccess> {
        match &self.extracted_data {
            Some(ScanPayload::Extracted(success)) => Some(success),
            _ => None,
        }
    }
}
