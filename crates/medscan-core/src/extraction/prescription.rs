//! Prescription extraction.

use medscan_llm::{validate_prescription, DocumentKind};

use super::{catalog_failure, log_outcome, ExtractionContext, ExtractionService};
use crate::matching::match_entity;
use crate::models::{
    CatalogEntry, DocumentData, ExtractedMedication, ExtractionErrorKind, ExtractionFailure,
    ExtractionResult, ExtractionSuccess, PrescriptionData,
};
use crate::store::Blob;

/// Reads prescriptions and matches medications against the drug catalog.
#[derive(Clone)]
pub struct PrescriptionExtractor {
    context: ExtractionContext,
}

impl PrescriptionExtractor {
    pub fn new(context: ExtractionContext) -> Self {
        Self { context }
    }

    fn run(&self, blob: &Blob) -> Result<ExtractionSuccess, ExtractionFailure> {
        let drugs = self.context.catalog().drugs().map_err(catalog_failure)?;
        let answer = self
            .context
            .read_document(blob, DocumentKind::Prescription)?;

        let response = validate_prescription(&answer.value)
            .map_err(|e| ExtractionFailure::new(ExtractionErrorKind::Extraction, e.to_string()))?;

        let medications = response
            .medications
            .into_iter()
            .map(|raw| {
                let matched = match_entity(&raw.drug_name, &drugs).map(CatalogEntry::to_matched);
                ExtractedMedication::new(raw, matched)
            })
            .collect();

        let document = DocumentData::Prescription(PrescriptionData::new(
            response.doctor_name,
            response.prescription_date,
            medications,
        ));
        Ok(ExtractionSuccess::new(document, answer.value, &answer.text))
    }
}

impl ExtractionService for PrescriptionExtractor {
    fn document_kind(&self) -> DocumentKind {
        DocumentKind::Prescription
    }

    fn extract(&self, blob: &Blob) -> ExtractionResult {
        let _span = tracing::info_span!(
            "extract",
            kind = %DocumentKind::Prescription,
            blob_bytes = blob.bytes.len()
        )
        .entered();

        let result = ExtractionResult::from(self.run(blob));
        log_outcome(DocumentKind::Prescription, &result);
        result
    }
}
