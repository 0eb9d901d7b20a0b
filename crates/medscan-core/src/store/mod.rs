//! Storage seams used by the extraction pipeline.
//!
//! The pipeline only reads the reference catalogs, reads photo blobs, and
//! reads/writes the status and payload of scan records. Each concern is a
//! trait so SQLite, in-memory and directory-backed stores are interchangeable.

mod blob;
mod memory;
mod sqlite;

pub use blob::*;
pub use memory::*;
pub use sqlite::*;

use thiserror::Error;

use crate::db::DbError;
use crate::models::{Biomarker, Drug, ExtractionStatus, ScanPayload, ScanRecord};

/// Store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Store lock poisoned")]
    LockPoisoned,

    #[error("Duplicate record: {0}")]
    Duplicate(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Read-only access to the reference catalogs.
pub trait CatalogRepository: Send + Sync {
    /// All active drugs, in matching order.
    fn drugs(&self) -> StoreResult<Vec<Drug>>;

    /// All biomarkers, in matching order.
    fn biomarkers(&self) -> StoreResult<Vec<Biomarker>>;
}

/// Persistence of scan records.
pub trait ScanStore: Send + Sync {
    fn insert(&self, record: &ScanRecord) -> StoreResult<()>;

    fn get(&self, id: &str) -> StoreResult<Option<ScanRecord>>;

    /// Compare-and-set on the extraction status.
    ///
    /// Replaces `extracted_data` with `data` and returns `true` only if the
    /// record exists and is currently in `from`.
    fn update_extraction(
        &self,
        id: &str,
        from: ExtractionStatus,
        to: ExtractionStatus,
        data: Option<&ScanPayload>,
    ) -> StoreResult<bool>;

    /// Records currently in `status`, oldest first.
    fn list_by_status(&self, status: ExtractionStatus) -> StoreResult<Vec<ScanRecord>>;

    fn delete(&self, id: &str) -> StoreResult<bool>;
}
