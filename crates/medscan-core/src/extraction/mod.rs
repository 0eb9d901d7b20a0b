//! Extraction services.
//!
//! ```text
//! Blob -> ImageNormalizer -> ModelClient::ask -> parse_model_response
//!      -> validate_* -> match / range / confidence -> ExtractionResult
//! ```
//!
//! Every failure is reported as an `ExtractionResult::Error` with a typed
//! kind; nothing escapes `extract` as an `Err` or a panic.

mod biology;
mod prescription;

pub use biology::*;
pub use prescription::*;

use std::sync::Arc;

use medscan_llm::{build_prompt, parse_model_response, DocumentKind, ModelClient, ModelError};
use serde_json::Value;
use tracing::debug;

use crate::imaging::{ImageError, ImageNormalizer};
use crate::models::{ExtractionErrorKind, ExtractionFailure, ExtractionResult};
use crate::store::{Blob, CatalogRepository, StoreError};

/// Reads one document kind from a photo.
pub trait ExtractionService: Send + Sync {
    fn document_kind(&self) -> DocumentKind;

    fn extract(&self, blob: &Blob) -> ExtractionResult;
}

/// Dependencies shared by both extractors.
#[derive(Clone)]
pub struct ExtractionContext {
    normalizer: ImageNormalizer,
    client: Arc<dyn ModelClient>,
    catalog: Arc<dyn CatalogRepository>,
}

/// Model answer after parsing: the JSON value and the original text.
pub(crate) struct ModelAnswer {
    pub value: Value,
    pub text: String,
}

impl ExtractionContext {
    pub fn new(
        normalizer: ImageNormalizer,
        client: Arc<dyn ModelClient>,
        catalog: Arc<dyn CatalogRepository>,
    ) -> Self {
        Self {
            normalizer,
            client,
            catalog,
        }
    }

    pub fn catalog(&self) -> &dyn CatalogRepository {
        self.catalog.as_ref()
    }

    /// Normalize the photo, ask the model and parse its JSON answer.
    pub(crate) fn read_document(
        &self,
        blob: &Blob,
        kind: DocumentKind,
    ) -> Result<ModelAnswer, ExtractionFailure> {
        let image = self
            .normalizer
            .normalize(&blob.bytes, &blob.content_type)
            .map_err(image_failure)?;

        debug!(
            width = image.width(),
            height = image.height(),
            content_type = image.content_type(),
            "calling vision model"
        );

        let text = self
            .client
            .ask(&image.as_model_image(), &build_prompt(kind))
            .map_err(model_failure)?;

        // The temp file is no longer needed once the model has answered.
        drop(image);

        let value = parse_model_response(&text)
            .map_err(|e| ExtractionFailure::new(ExtractionErrorKind::Extraction, e.to_string()))?;

        Ok(ModelAnswer { value, text })
    }
}

/// Map a model client error onto the extraction taxonomy.
pub fn model_failure(error: ModelError) -> ExtractionFailure {
    let kind = match &error {
        ModelError::Configuration(_) => ExtractionErrorKind::Configuration,
        ModelError::Authentication(_) => ExtractionErrorKind::Authentication,
        ModelError::RateLimited(_) => ExtractionErrorKind::RateLimit,
        ModelError::Api(_) => ExtractionErrorKind::ApiError,
    };
    ExtractionFailure::new(kind, error.to_string())
}

/// Undecodable or unusable photos are reported as image quality problems.
pub fn image_failure(error: ImageError) -> ExtractionFailure {
    ExtractionFailure::new(
        ExtractionErrorKind::Extraction,
        format!("image could not be processed: {error}"),
    )
}

/// The catalogs are part of the service setup.
pub fn catalog_failure(error: StoreError) -> ExtractionFailure {
    ExtractionFailure::new(
        ExtractionErrorKind::Configuration,
        format!("reference catalog unavailable: {error}"),
    )
}

pub(crate) fn log_outcome(kind: DocumentKind, result: &ExtractionResult) {
    match result {
        ExtractionResult::Success(success) => tracing::info!(
            kind = %kind,
            items = success.document().item_count(),
            flagged = success.document().flagged_count(),
            response_digest = success.response_digest(),
            "extraction succeeded"
        ),
        ExtractionResult::Error(failure) => tracing::warn!(
            kind = %kind,
            error_kind = %failure.kind(),
            "extraction failed"
        ),
    }
}
