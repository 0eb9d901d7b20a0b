//! SQLite-backed catalog and scan store.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use super::{CatalogRepository, ScanStore, StoreError, StoreResult};
use crate::db::{Database, DbError};
use crate::models::{Biomarker, Drug, ExtractionStatus, ScanPayload, ScanRecord};

/// Shared SQLite store.
///
/// The connection sits behind a mutex so the store can be used from the
/// request path and the background runner at the same time.
#[derive(Clone)]
pub struct SqliteStore {
    db: Arc<Mutex<Database>>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
        }
    }

    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Run `f` with the locked database.
    pub fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T, DbError>) -> StoreResult<T> {
        let db = self.lock()?;
        Ok(f(&db)?)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Database>> {
        self.db.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl CatalogRepository for SqliteStore {
    fn drugs(&self) -> StoreResult<Vec<Drug>> {
        self.with_db(|db| db.list_drugs(true))
    }

    fn biomarkers(&self) -> StoreResult<Vec<Biomarker>> {
        self.with_db(|db| db.list_biomarkers())
    }
}

impl ScanStore for SqliteStore {
    fn insert(&self, record: &ScanRecord) -> StoreResult<()> {
        let db = self.lock()?;
        if db.get_scan(&record.id)?.is_some() {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        db.insert_scan(record)?;
        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<ScanRecord>> {
        self.with_db(|db| db.get_scan(id))
    }

    fn update_extraction(
        &self,
        id: &str,
        from: ExtractionStatus,
        to: ExtractionStatus,
        data: Option<&ScanPayload>,
    ) -> StoreResult<bool> {
        self.with_db(|db| db.update_scan_extraction(id, from, to, data))
    }

    fn list_by_status(&self, status: ExtractionStatus) -> StoreResult<Vec<ScanRecord>> {
        self.with_db(|db| db.list_scans_by_status(status))
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        self.with_db(|db| db.delete_scan(id))
    }
}
