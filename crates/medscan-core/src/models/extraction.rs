//! Extraction results.
//!
//! An [`ExtractionResult`] is built once per attempt and never modified
//! afterwards: every field is private and only readable through accessors.

use medscan_llm::{DocumentKind, RawMedication, RawTestResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::catalog::{MatchedEntry, ReferenceRange};
use crate::matching::{requires_verification, RangeEvaluation};

/// Failure classes an extraction or a scan job can end with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionErrorKind {
    /// Model client or catalog not usable
    Configuration,
    /// Model credentials rejected
    Authentication,
    /// Model asked us to slow down
    RateLimit,
    /// Transient model failure
    ApiError,
    /// Image, response or schema problem
    Extraction,
    /// Blob missing at processing time
    NotFound,
    /// Retryable failure that persisted past the retry budget
    RetriesExhausted,
}

impl ExtractionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Configuration => "configuration",
            Self::Authentication => "authentication",
            Self::RateLimit => "rate_limit",
            Self::ApiError => "api_error",
            Self::Extraction => "extraction",
            Self::NotFound => "not_found",
            Self::RetriesExhausted => "retries_exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "configuration" => Some(Self::Configuration),
            "authentication" => Some(Self::Authentication),
            "rate_limit" => Some(Self::RateLimit),
            "api_error" => Some(Self::ApiError),
            "extraction" => Some(Self::Extraction),
            "not_found" => Some(Self::NotFound),
            "retries_exhausted" => Some(Self::RetriesExhausted),
            _ => None,
        }
    }

    /// Only transient model failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimit | Self::ApiError)
    }
}

impl std::fmt::Display for ExtractionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an extraction did not produce data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionFailure {
    kind: ExtractionErrorKind,
    message: String,
}

impl ExtractionFailure {
    pub fn new(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ExtractionErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A prescribed medication after catalog matching and confidence scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedMedication {
    drug_name: String,
    dosage: Option<String>,
    frequency: Option<String>,
    duration: Option<String>,
    route: Option<String>,
    instructions: Option<String>,
    confidence: f64,
    matched_drug: Option<MatchedEntry>,
    requires_verification: bool,
}

impl ExtractedMedication {
    pub fn new(raw: RawMedication, matched_drug: Option<MatchedEntry>) -> Self {
        Self {
            requires_verification: requires_verification(raw.confidence),
            drug_name: raw.drug_name,
            dosage: raw.dosage,
            frequency: raw.frequency,
            duration: raw.duration,
            route: raw.route,
            instructions: raw.instructions,
            confidence: raw.confidence,
            matched_drug,
        }
    }

    pub fn drug_name(&self) -> &str {
        &self.drug_name
    }

    pub fn dosage(&self) -> Option<&str> {
        self.dosage.as_deref()
    }

    pub fn frequency(&self) -> Option<&str> {
        self.frequency.as_deref()
    }

    pub fn duration(&self) -> Option<&str> {
        self.duration.as_deref()
    }

    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    pub fn instructions(&self) -> Option<&str> {
        self.instructions.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn matched_drug(&self) -> Option<&MatchedEntry> {
        self.matched_drug.as_ref()
    }

    pub fn requires_verification(&self) -> bool {
        self.requires_verification
    }
}

/// A lab test line after catalog matching, range evaluation and scoring.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedTestResult {
    biomarker_name: String,
    value: Option<String>,
    unit: Option<String>,
    reference_range: Option<String>,
    confidence: f64,
    matched_biomarker: Option<MatchedEntry>,
    resolved_range: Option<ReferenceRange>,
    out_of_range: Option<bool>,
    requires_verification: bool,
}

impl ExtractedTestResult {
    pub fn new(
        raw: RawTestResult,
        matched_biomarker: Option<MatchedEntry>,
        evaluation: RangeEvaluation,
    ) -> Self {
        Self {
            requires_verification: requires_verification(raw.confidence),
            biomarker_name: raw.biomarker_name,
            value: raw.value,
            unit: raw.unit,
            reference_range: raw.reference_range,
            confidence: raw.confidence,
            matched_biomarker,
            resolved_range: evaluation.range,
            out_of_range: evaluation.out_of_range,
        }
    }

    pub fn biomarker_name(&self) -> &str {
        &self.biomarker_name
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Reference range as written on the report.
    pub fn reference_range(&self) -> Option<&str> {
        self.reference_range.as_deref()
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn matched_biomarker(&self) -> Option<&MatchedEntry> {
        self.matched_biomarker.as_ref()
    }

    /// Range the value was checked against, report first, catalog second.
    pub fn resolved_range(&self) -> Option<ReferenceRange> {
        self.resolved_range
    }

    /// `None` when no usable range or numeric value was available.
    pub fn out_of_range(&self) -> Option<bool> {
        self.out_of_range
    }

    pub fn requires_verification(&self) -> bool {
        self.requires_verification
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionData {
    doctor_name: Option<String>,
    prescription_date: Option<String>,
    medications: Vec<ExtractedMedication>,
}

impl PrescriptionData {
    pub fn new(
        doctor_name: Option<String>,
        prescription_date: Option<String>,
        medications: Vec<ExtractedMedication>,
    ) -> Self {
        Self {
            doctor_name,
            prescription_date,
            medications,
        }
    }

    pub fn doctor_name(&self) -> Option<&str> {
        self.doctor_name.as_deref()
    }

    pub fn prescription_date(&self) -> Option<&str> {
        self.prescription_date.as_deref()
    }

    /// Medications in document order.
    pub fn medications(&self) -> &[ExtractedMedication] {
        &self.medications
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BiologyReportData {
    laboratory_name: Option<String>,
    report_date: Option<String>,
    test_results: Vec<ExtractedTestResult>,
}

impl BiologyReportData {
    pub fn new(
        laboratory_name: Option<String>,
        report_date: Option<String>,
        test_results: Vec<ExtractedTestResult>,
    ) -> Self {
        Self {
            laboratory_name,
            report_date,
            test_results,
        }
    }

    pub fn laboratory_name(&self) -> Option<&str> {
        self.laboratory_name.as_deref()
    }

    pub fn report_date(&self) -> Option<&str> {
        self.report_date.as_deref()
    }

    /// Test results in document order.
    pub fn test_results(&self) -> &[ExtractedTestResult] {
        &self.test_results
    }
}

/// Structured content of a successfully read document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentData {
    Prescription(PrescriptionData),
    BiologyReport(BiologyReportData),
}

impl DocumentData {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Prescription(_) => DocumentKind::Prescription,
            Self::BiologyReport(_) => DocumentKind::BiologyReport,
        }
    }

    /// Number of line items.
    pub fn item_count(&self) -> usize {
        match self {
            Self::Prescription(data) => data.medications.len(),
            Self::BiologyReport(data) => data.test_results.len(),
        }
    }

    /// Number of line items flagged for human verification.
    pub fn flagged_count(&self) -> usize {
        match self {
            Self::Prescription(data) => data
                .medications
                .iter()
                .filter(|m| m.requires_verification)
                .count(),
            Self::BiologyReport(data) => data
                .test_results
                .iter()
                .filter(|t| t.requires_verification)
                .count(),
        }
    }
}

/// Successful extraction with its audit trail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractionSuccess {
    document: DocumentData,
    raw_response: Value,
    response_digest: String,
}

impl ExtractionSuccess {
    /// `response_text` is the model's answer before parsing.
    pub fn new(document: DocumentData, raw_response: Value, response_text: &str) -> Self {
        Self {
            document,
            raw_response,
            response_digest: response_digest(response_text),
        }
    }

    pub fn document(&self) -> &DocumentData {
        &self.document
    }

    /// Parsed model response, kept for audit.
    pub fn raw_response(&self) -> &Value {
        &self.raw_response
    }

    /// SHA-256 hex digest of the model answer.
    pub fn response_digest(&self) -> &str {
        &self.response_digest
    }
}

/// Outcome of one extraction attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionResult {
    Success(ExtractionSuccess),
    Error(ExtractionFailure),
}

impl ExtractionResult {
    pub fn failure(kind: ExtractionErrorKind, message: impl Into<String>) -> Self {
        Self::Error(ExtractionFailure::new(kind, message))
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn success(&self) -> Option<&ExtractionSuccess> {
        match self {
            Self::Success(success) => Some(success),
            Self::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ExtractionFailure> {
        match self {
            Self::Success(_) => None,
            Self::Error(failure) => Some(failure),
        }
    }

    pub fn error_kind(&self) -> Option<ExtractionErrorKind> {
        self.error().map(ExtractionFailure::kind)
    }
}

impl From<Result<ExtractionSuccess, ExtractionFailure>> for ExtractionResult {
    fn from(result: Result<ExtractionSuccess, ExtractionFailure>) -> Self {
        match result {
            Ok(success) => Self::Success(success),
            Err(failure) => Self::Error(failure),
        }
    }
}

/// Hex-encoded SHA-256 of a model answer.
pub fn response_digest(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}
