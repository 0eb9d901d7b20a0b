//! Biology report extraction.

use medscan_llm::{validate_biology_report, DocumentKind};

use super::{catalog_failure, log_outcome, ExtractionContext, ExtractionService};
use crate::matching::{evaluate_range, match_entity};
use crate::models::{
    BiologyReportData, CatalogEntry, DocumentData, ExtractedTestResult, ExtractionErrorKind,
    ExtractionFailure, ExtractionResult, ExtractionSuccess,
};
use crate::store::Blob;

/// Reads lab reports, matches biomarkers and flags out-of-range values.
#[derive(Clone)]
pub struct BiologyReportExtractor {
    context: ExtractionContext,
}

impl BiologyReportExtractor {
    pub fn new(context: ExtractionContext) -> Self {
        Self { context }
    }

    fn run(&self, blob: &Blob) -> Result<ExtractionSuccess, ExtractionFailure> {
        let biomarkers = self
            .context
            .catalog()
            .biomarkers()
            .map_err(catalog_failure)?;
        let answer = self
            .context
            .read_document(blob, DocumentKind::BiologyReport)?;

        let response = validate_biology_report(&answer.value)
            .map_err(|e| ExtractionFailure::new(ExtractionErrorKind::Extraction, e.to_string()))?;

        let test_results = response
            .test_results
            .into_iter()
            .map(|raw| {
                let matched = match_entity(&raw.biomarker_name, &biomarkers);
                let evaluation = evaluate_range(
                    raw.value.as_deref(),
                    raw.reference_range.as_deref(),
                    matched.and_then(|b| b.default_range()),
                );
                ExtractedTestResult::new(raw, matched.map(CatalogEntry::to_matched), evaluation)
            })
            .collect();

        let document = DocumentData::BiologyReport(BiologyReportData::new(
            response.laboratory_name,
            response.report_date,
            test_results,
        ));
        Ok(ExtractionSuccess::new(document, answer.value, &answer.text))
    }
}

impl ExtractionService for BiologyReportExtractor {
    fn document_kind(&self) -> DocumentKind {
        DocumentKind::BiologyReport
    }

    fn extract(&self, blob: &Blob) -> ExtractionResult {
        let _span = tracing::info_span!(
            "extract",
            kind = %DocumentKind::BiologyReport,
            blob_bytes = blob.bytes.len()
        )
        .entered();

        let result = ExtractionResult::from(self.run(blob));
        log_outcome(DocumentKind::BiologyReport, &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use medscan_llm::{ModelError, ScriptedModelClient};

    use crate::imaging::ImageNormalizer;
    use crate::models::{Biomarker, Drug, ReferenceRange};
    use crate::store::{CatalogRepository, StaticCatalog, StoreError, StoreResult};
    use crate::test_support::png_blob;

    fn catalog() -> StaticCatalog {
        StaticCatalog::new(
            vec![],
            vec![
                Biomarker::new("b1", "Glucose").with_range(70.0, 100.0),
                Biomarker::new("b2", "Hemoglobin").with_range(12.0, 16.0),
                Biomarker::new("b3", "CRP"),
            ],
        )
    }

    fn extractor_with(client: ScriptedModelClient, catalog: impl CatalogRepository + 'static) -> BiologyReportExtractor {
        BiologyReportExtractor::new(ExtractionContext::new(
            ImageNormalizer::default(),
            Arc::new(client),
            Arc::new(catalog),
        ))
    }

    fn extract(response: &str) -> ExtractionResult {
        extractor_with(ScriptedModelClient::replying(response), catalog()).extract(&png_blob())
    }

    fn results(result: &ExtractionResult) -> Vec<ExtractedTestResult> {
        match result.success().map(|s| s.document()) {
            Some(DocumentData::BiologyReport(data)) => data.test_results().to_vec(),
            other => panic!("expected biology report, got {other:?}"),
        }
    }

    #[test]
    fn test_glucose_out_of_range() {
        let result = extract(
            r#"{"test_results":[{"biomarker_name":"Glucose","value":"150","reference_range":"70-100","confidence":0.9}]}"#,
        );

        let items = results(&result);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].matched_biomarker().unwrap().name, "Glucose");
        assert_eq!(items[0].out_of_range(), Some(true));
        assert!(!items[0].requires_verification());
    }

    #[test]
    fn test_catalog_default_range_used() {
        let result = extract(
            r#"{"laboratory_name": "Labo Central", "test_results":[
                {"biomarker_name":"Hémoglobine","value":"11","confidence":0.8},
                {"biomarker_name":"Hemoglobin","value":"11,5","unit":"g/dL","confidence":0.8}
            ]}"#,
        );

        let items = results(&result);
        // Not in the catalog under that spelling: no range, no flag.
        assert!(items[0].matched_biomarker().is_none());
        assert_eq!(items[0].out_of_range(), None);

        assert_eq!(items[1].matched_biomarker().unwrap().id, "b2");
        assert_eq!(
            items[1].resolved_range(),
            Some(ReferenceRange { min: 12.0, max: 16.0 })
        );
        assert_eq!(items[1].out_of_range(), Some(true));

        let DocumentData::BiologyReport(data) = result.success().unwrap().document() else {
            unreachable!()
        };
        assert_eq!(data.laboratory_name(), Some("Labo Central"));
    }

    #[test]
    fn test_unknown_range_and_value() {
        let result = extract(
            r#"{"test_results":[
                {"biomarker_name":"CRP","value":"4","confidence":0.7},
                {"biomarker_name":"Glucose","value":"négatif","confidence":0.7},
                {"biomarker_name":"Glucose","value":"100","confidence":0.2}
            ]}"#,
        );

        let items = results(&result);
        assert_eq!(items[0].out_of_range(), None);
        assert_eq!(items[1].out_of_range(), None);
        assert_eq!(items[2].out_of_range(), Some(false));
        assert!(items[2].requires_verification());
    }

    #[test]
    fn test_missing_confidence_rejected() {
        let result = extract(r#"{"test_results":[{"biomarker_name":"Glucose","value":"90"}]}"#);
        assert_eq!(result.error_kind(), Some(ExtractionErrorKind::Extraction));
        assert!(result.error().unwrap().message().contains("confidence"));
    }

    #[test]
    fn test_non_object_response() {
        let result = extract(r#"[{"biomarker_name":"Glucose"}]"#);
        assert_eq!(
            result.error().unwrap().message(),
            "response is not a JSON object"
        );
    }

    #[test]
    fn test_api_error() {
        let result = extractor_with(
            ScriptedModelClient::always(Err(ModelError::Api("503".into()))),
            catalog(),
        )
        .extract(&png_blob());
        assert_eq!(result.error_kind(), Some(ExtractionErrorKind::ApiError));
    }

    struct BrokenCatalog;

    impl CatalogRepository for BrokenCatalog {
        fn drugs(&self) -> StoreResult<Vec<Drug>> {
            Err(StoreError::LockPoisoned)
        }

        fn biomarkers(&self) -> StoreResult<Vec<Biomarker>> {
            Err(StoreError::LockPoisoned)
        }
    }

    #[test]
    fn test_catalog_failure_is_configuration() {
        let result = extractor_with(
            ScriptedModelClient::replying(r#"{"test_results": []}"#),
            BrokenCatalog,
        )
        .extract(&png_blob());
        assert_eq!(result.error_kind(), Some(ExtractionErrorKind::Configuration));
    }
}
