//! Medscan Core Library
//!
//! Turns photos of prescriptions and lab reports into structured records a
//! user can review and confirm.
//!
//! # Architecture
//!
//! ```text
//! Upload → ScanWorkflow::submit ──[size ≤ threshold]──► sync attempt
//!                 │                                          │
//!                 └──[size > threshold]──► BackgroundRunner ─┤ (retry on
//!                                                            │  rate_limit /
//!                                                            ▼  api_error)
//!                                                   ExtractionService
//!                                                            │
//!        ImageNormalizer → ModelClient::ask → parse → validate
//!                                                            │
//!                       EntityMatcher → RangeEvaluator → ConfidenceEvaluator
//!                                                            │
//!                                         [STAGING: extracted / failed]
//!                                                            │
//!                                                   User review queue
//!                                                            │
//!                                                  confirm / cancel
//! ```
//!
//! # Core Principle
//!
//! **Extracted data is never trusted without review.** Low-confidence items
//! are flagged, but every record waits in `extracted` until the user confirms.
//!
//! # Modules
//!
//! - [`config`]: TOML pipeline configuration
//! - [`db`]: SQLite database layer
//! - [`extraction`]: Prescription and biology report extractors
//! - [`guidance`]: User-facing advice for failed scans
//! - [`imaging`]: Photo normalization before the model call
//! - [`matching`]: Catalog matching, reference ranges and confidence flags
//! - [`models`]: Domain types (Drug, Biomarker, ScanRecord, ExtractionResult, etc.)
//! - [`store`]: Catalog, scan and blob storage traits with their adapters
//! - [`workflow`]: Scan lifecycle, sync/async dispatch and background jobs

pub mod config;
pub mod db;
pub mod extraction;
pub mod guidance;
pub mod imaging;
pub mod matching;
pub mod models;
pub mod store;
pub mod workflow;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use db::Database;
pub use extraction::{BiologyReportExtractor, ExtractionService, PrescriptionExtractor};
pub use imaging::{ImageNormalizer, ProcessedImage};
pub use models::{
    Biomarker, DocumentKind, Drug, ExtractionErrorKind, ExtractionResult, ExtractionStatus,
    ReferenceRange, ScanRecord,
};
pub use store::{BlobStore, CatalogRepository, ScanStore, SqliteStore};
pub use workflow::{CancelOutcome, ExecutionMode, ModeOverride, ScanWorkflow, Submission};

use std::path::Path;
use std::sync::Arc;

use medscan_llm::ModelClient;
use tracing::info;

use crate::extraction::ExtractionContext;
use crate::workflow::{BackgroundRunner, RetryPolicy, ScanProcessor};

// =========================================================================
// Error Type
// =========================================================================

#[derive(Debug, thiserror::Error)]
pub enum MedscanError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Worker error: {0}")]
    WorkerError(String),
}

pub type MedscanResult<T> = Result<T, MedscanError>;

impl From<db::DbError> for MedscanError {
    fn from(e: db::DbError) -> Self {
        MedscanError::DatabaseError(e.to_string())
    }
}

impl From<store::StoreError> for MedscanError {
    fn from(e: store::StoreError) -> Self {
        match e {
            store::StoreError::Database(e) => e.into(),
            other => MedscanError::StorageError(other.to_string()),
        }
    }
}

impl From<store::BlobError> for MedscanError {
    fn from(e: store::BlobError) -> Self {
        MedscanError::StorageError(e.to_string())
    }
}

impl From<config::ConfigError> for MedscanError {
    fn from(e: config::ConfigError) -> Self {
        MedscanError::ConfigError(e.to_string())
    }
}

impl From<imaging::ImageError> for MedscanError {
    fn from(e: imaging::ImageError) -> Self {
        MedscanError::InvalidInput(e.to_string())
    }
}

impl From<workflow::QueueError> for MedscanError {
    fn from(e: workflow::QueueError) -> Self {
        MedscanError::WorkerError(e.to_string())
    }
}

impl From<std::io::Error> for MedscanError {
    fn from(e: std::io::Error) -> Self {
        MedscanError::WorkerError(e.to_string())
    }
}

impl From<workflow::WorkflowError> for MedscanError {
    fn from(e: workflow::WorkflowError) -> Self {
        use workflow::WorkflowError;
        match e {
            WorkflowError::Store(e) => e.into(),
            WorkflowError::Blob(e) => e.into(),
            WorkflowError::Queue(e) => e.into(),
            WorkflowError::NotFound(id) => MedscanError::NotFound(id),
            WorkflowError::BlobNotFound(id) => MedscanError::NotFound(format!("photo {id}")),
            invalid @ WorkflowError::InvalidTransition { .. } => {
                MedscanError::InvalidInput(invalid.to_string())
            }
        }
    }
}

// =========================================================================
// Factory Functions
// =========================================================================

/// Open or create a pipeline backed by the database at `path`.
pub fn open_pipeline<P: AsRef<Path>>(
    path: P,
    blobs: Arc<dyn BlobStore>,
    client: Arc<dyn ModelClient>,
    config: PipelineConfig,
) -> MedscanResult<MedscanCore> {
    MedscanCore::new(SqliteStore::open(path)?, blobs, client, config)
}

/// Create a pipeline on an in-memory database (for testing).
pub fn open_pipeline_in_memory(
    blobs: Arc<dyn BlobStore>,
    client: Arc<dyn ModelClient>,
    config: PipelineConfig,
) -> MedscanResult<MedscanCore> {
    MedscanCore::new(SqliteStore::open_in_memory()?, blobs, client, config)
}

// =========================================================================
// Main API Object
// =========================================================================

/// Fully wired pipeline: SQLite store, both extractors, workflow and
/// background runner.
pub struct MedscanCore {
    store: SqliteStore,
    runner: Arc<BackgroundRunner>,
    workflow: ScanWorkflow,
}

impl MedscanCore {
    /// Wire the pipeline and requeue scans interrupted by a previous run.
    pub fn new(
        store: SqliteStore,
        blobs: Arc<dyn BlobStore>,
        client: Arc<dyn ModelClient>,
        config: PipelineConfig,
    ) -> MedscanResult<Self> {
        config.validate()?;

        let context = ExtractionContext::new(
            ImageNormalizer::new(config.max_image_dimension),
            client,
            Arc::new(store.clone()),
        );
        let processor = Arc::new(ScanProcessor::new(
            Arc::new(store.clone()),
            blobs,
            Arc::new(PrescriptionExtractor::new(context.clone())),
            Arc::new(BiologyReportExtractor::new(context)),
        ));
        let runner = Arc::new(BackgroundRunner::start(
            processor.clone(),
            RetryPolicy::from_config(&config.retry),
        )?);
        let workflow = ScanWorkflow::new(processor, runner.clone(), config);

        let requeued = workflow.requeue_interrupted()?;
        info!(requeued, "medscan pipeline ready");

        Ok(Self {
            store,
            runner,
            workflow,
        })
    }

    pub fn workflow(&self) -> &ScanWorkflow {
        &self.workflow
    }

    // =========================================================================
    // Catalog Operations
    // =========================================================================

    /// Insert or replace a drug.
    pub fn upsert_drug(&self, drug: &Drug) -> MedscanResult<()> {
        Ok(self.store.with_db(|db| db.upsert_drug(drug))?)
    }

    /// Hide a drug from matching without deleting it.
    pub fn deactivate_drug(&self, id: &str) -> MedscanResult<bool> {
        Ok(self.store.with_db(|db| db.deactivate_drug(id))?)
    }

    pub fn list_drugs(&self) -> MedscanResult<Vec<Drug>> {
        Ok(self.store.drugs()?)
    }

    /// Insert or replace a biomarker.
    pub fn upsert_biomarker(&self, biomarker: &Biomarker) -> MedscanResult<()> {
        Ok(self.store.with_db(|db| db.upsert_biomarker(biomarker))?)
    }

    pub fn list_biomarkers(&self) -> MedscanResult<Vec<Biomarker>> {
        Ok(self.store.biomarkers()?)
    }

    // =========================================================================
    // Scan Operations
    // =========================================================================

    pub fn submit_scan(
        &self,
        kind: DocumentKind,
        blob_id: &str,
        mode_override: ModeOverride,
    ) -> MedscanResult<Submission> {
        Ok(self.workflow.submit(kind, blob_id, mode_override)?)
    }

    pub fn get_scan(&self, id: &str) -> MedscanResult<ScanRecord> {
        Ok(self.workflow.get(id)?)
    }

    /// Scans waiting for user review.
    pub fn list_scans(&self, status: ExtractionStatus) -> MedscanResult<Vec<ScanRecord>> {
        Ok(self.store.list_by_status(status)?)
    }

    pub fn confirm_scan(&self, id: &str) -> MedscanResult<ScanRecord> {
        Ok(self.workflow.confirm(id)?)
    }

    pub fn cancel_scan(&self, id: &str) -> MedscanResult<CancelOutcome> {
        Ok(self.workflow.cancel(id)?)
    }

    pub fn reprocess_scan(&self, id: &str, mode_override: ModeOverride) -> MedscanResult<Submission> {
        Ok(self.workflow.reprocess(id, mode_override)?)
    }

    /// Advice to show for a failed scan; `None` unless the scan failed.
    pub fn scan_guidance(&self, id: &str) -> MedscanResult<Option<&'static str>> {
        let record = self.workflow.get(id)?;
        Ok(record.failure().map(guidance::guidance_for))
    }

    /// Finish queued background jobs and stop the runner.
    pub fn shutdown(&self) {
        self.runner.shutdown();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use serde_json::json;

    use crate::extraction::ExtractionService;
    use crate::models::{
        DocumentData, DocumentKind, ExtractionErrorKind, ExtractionResult, ExtractionSuccess,
        PrescriptionData,
    };
    use crate::store::Blob;

    pub const PHOTO_ID: &str = "scan-photo";

    pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([240, 240, 240]));
        let mut cursor = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img)
            .write_to(&mut cursor, ImageFormat::Png)
            .unwrap();
        cursor.into_inner()
    }

    pub fn png_blob() -> Blob {
        Blob::new(PHOTO_ID, "image/png", png_bytes(64, 48))
    }

    pub fn prescription_success() -> ExtractionResult {
        let raw = json!({"medications": []});
        ExtractionResult::Success(ExtractionSuccess::new(
            DocumentData::Prescription(PrescriptionData::new(None, None, vec![])),
            raw.clone(),
            &raw.to_string(),
        ))
    }

    /// Extraction service replaying canned results; the last one repeats.
    pub struct StubService {
        kind: DocumentKind,
        results: Mutex<Vec<ExtractionResult>>,
        calls: AtomicUsize,
    }

    impl StubService {
        pub fn new(kind: DocumentKind, results: Vec<ExtractionResult>) -> Self {
            Self {
                kind,
                results: Mutex::new(results),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl ExtractionService for StubService {
        fn document_kind(&self) -> DocumentKind {
            self.kind
        }

        fn extract(&self, _blob: &Blob) -> ExtractionResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut results = self.results.lock().unwrap();
            match results.len() {
                0 => ExtractionResult::failure(ExtractionErrorKind::Configuration, "no result scripted"),
                1 => results[0].clone(),
                _ => results.remove(0),
            }
        }
    }
}
