//! In-memory stores for tests and embedding.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::{CatalogRepository, ScanStore, StoreError, StoreResult};
use crate::models::{Biomarker, Drug, ExtractionStatus, ScanPayload, ScanRecord};

/// Fixed catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    drugs: Vec<Drug>,
    biomarkers: Vec<Biomarker>,
}

impl StaticCatalog {
    pub fn new(drugs: Vec<Drug>, biomarkers: Vec<Biomarker>) -> Self {
        Self { drugs, biomarkers }
    }
}

impl CatalogRepository for StaticCatalog {
    fn drugs(&self) -> StoreResult<Vec<Drug>> {
        Ok(self.drugs.iter().filter(|d| d.active).cloned().collect())
    }

    fn biomarkers(&self) -> StoreResult<Vec<Biomarker>> {
        Ok(self.biomarkers.clone())
    }
}

/// Scan store backed by a `HashMap`.
#[derive(Debug, Default)]
pub struct MemoryScanStore {
    records: Mutex<HashMap<String, ScanRecord>>,
}

impl MemoryScanStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, ScanRecord>>> {
        self.records.lock().map_err(|_| StoreError::LockPoisoned)
    }
}

impl ScanStore for MemoryScanStore {
    fn insert(&self, record: &ScanRecord) -> StoreResult<()> {
        let mut records = self.lock()?;
        if records.contains_key(&record.id) {
            return Err(StoreError::Duplicate(record.id.clone()));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    fn get(&self, id: &str) -> StoreResult<Option<ScanRecord>> {
        Ok(self.lock()?.get(id).cloned())
    }

    fn update_extraction(
        &self,
        id: &str,
        from: ExtractionStatus,
        to: ExtractionStatus,
        data: Option<&ScanPayload>,
    ) -> StoreResult<bool> {
        let mut records = self.lock()?;
        match records.get_mut(id) {
            Some(record) if record.extraction_status == from => {
                record.extraction_status = to;
                record.extracted_data = data.cloned();
                record.updated_at = chrono::Utc::now().to_rfc3339();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn list_by_status(&self, status: ExtractionStatus) -> StoreResult<Vec<ScanRecord>> {
        let mut matching: Vec<ScanRecord> = self
            .lock()?
            .values()
            .filter(|r| r.extraction_status == status)
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(matching)
    }

    fn delete(&self, id: &str) -> StoreResult<bool> {
        Ok(self.lock()?.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medscan_llm::DocumentKind;

    #[test]
    fn test_static_catalog_skips_inactive() {
        let mut retired = Drug::new("d2", "Retired");
        retired.active = false;
        let catalog = StaticCatalog::new(vec![Drug::new("d1", "Doliprane"), retired], vec![]);

        let drugs = catalog.drugs().unwrap();
        assert_eq!(drugs.len(), 1);
        assert_eq!(drugs[0].id, "d1");
    }

    #[test]
    fn test_memory_store_compare_and_set() {
        let store = MemoryScanStore::new();
        let record = ScanRecord::new(DocumentKind::Prescription, "blob", 1);
        store.insert(&record).unwrap();
        assert_eq!(store.len(), 1);

        assert!(!store
            .update_extraction(&record.id, ExtractionStatus::Failed, ExtractionStatus::Pending, None)
            .unwrap());
        assert!(store
            .update_extraction(&record.id, ExtractionStatus::Pending, ExtractionStatus::Processing, None)
            .unwrap());
        assert_eq!(
            store.get(&record.id).unwrap().unwrap().extraction_status,
            ExtractionStatus::Processing
        );
        assert_eq!(
            store.list_by_status(ExtractionStatus::Processing).unwrap().len(),
            1
        );

        assert!(store.delete(&record.id).unwrap());
        assert!(store.is_empty());
    }
}
