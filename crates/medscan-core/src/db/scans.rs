//! Scan record database operations.

use medscan_llm::DocumentKind;
use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{ExtractionStatus, ScanPayload, ScanRecord};

const SCAN_COLUMNS: &str =
    "id, kind, blob_id, byte_size, extraction_status, extracted_data, created_at, updated_at";

impl Database {
    /// Insert a new scan record.
    pub fn insert_scan(&self, record: &ScanRecord) -> DbResult<()> {
        let data_json = record
            .extracted_data
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let byte_size = i64::try_from(record.byte_size)
            .map_err(|_| DbError::Constraint(format!("byte size out of range: {}", record.byte_size)))?;

        self.conn.execute(
            r#"
            INSERT INTO scan_records (
                id, kind, blob_id, byte_size, extraction_status,
                extracted_data, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                record.id,
                record.kind.as_str(),
                record.blob_id,
                byte_size,
                record.extraction_status.as_str(),
                data_json,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Get a scan record by ID.
    pub fn get_scan(&self, id: &str) -> DbResult<Option<ScanRecord>> {
        let sql = format!("SELECT {SCAN_COLUMNS} FROM scan_records WHERE id = ?");
        self.conn
            .query_row(&sql, [id], scan_row)
            .optional()?
            .map(ScanRecord::try_from)
            .transpose()
    }

    /// Move a record from `from` to `to`, replacing its extracted data.
    ///
    /// Returns `false` when the record is gone or no longer in `from`.
    pub fn update_scan_extraction(
        &self,
        id: &str,
        from: ExtractionStatus,
        to: ExtractionStatus,
        data: Option<&ScanPayload>,
    ) -> DbResult<bool> {
        let data_json = data.map(serde_json::to_string).transpose()?;
        let rows_affected = self.conn.execute(
            r#"
            UPDATE scan_records SET
                extraction_status = ?3,
                extracted_data = ?4,
                updated_at = ?5
            WHERE id = ?1 AND extraction_status = ?2
            "#,
            params![
                id,
                from.as_str(),
                to.as_str(),
                data_json,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(rows_affected > 0)
    }

    /// List records in a given status, oldest first.
    pub fn list_scans_by_status(&self, status: ExtractionStatus) -> DbResult<Vec<ScanRecord>> {
        let sql = format!(
            "SELECT {SCAN_COLUMNS} FROM scan_records WHERE extraction_status = ? ORDER BY created_at, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([status.as_str()], scan_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?.try_into()?);
        }
        Ok(records)
    }

    /// Delete a scan record.
    pub fn delete_scan(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("DELETE FROM scan_records WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

/// Intermediate row struct for database mapping.
struct ScanRow {
    id: String,
    kind: String,
    blob_id: String,
    byte_size: i64,
    extraction_status: String,
    extracted_data: Option<String>,
    created_at: String,
    updated_at: String,
}

fn scan_row(row: &Row<'_>) -> rusqlite::Result<ScanRow> {
    Ok(ScanRow {
        id: row.get(0)?,
        kind: row.get(1)?,
        blob_id: row.get(2)?,
        byte_size: row.get(3)?,
        extraction_status: row.get(4)?,
        extracted_data: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

impl TryFrom<ScanRow> for ScanRecord {
    type Error = DbError;

    fn try_from(row: ScanRow) -> Result<Self, Self::Error> {
        let kind = DocumentKind::parse(&row.kind)
            .ok_or_else(|| DbError::Constraint(format!("Unknown document kind: {}", row.kind)))?;
        let extraction_status = ExtractionStatus::parse(&row.extraction_status).ok_or_else(|| {
            DbError::Constraint(format!("Unknown extraction status: {}", row.extraction_status))
        })?;
        let byte_size = u64::try_from(row.byte_size)
            .map_err(|_| DbError::Constraint(format!("Negative byte size: {}", row.byte_size)))?;
        let extracted_data = row
            .extracted_data
            .map(|json| serde_json::from_str(&json))
            .transpose()?;

        Ok(ScanRecord {
            id: row.id,
            kind,
            blob_id: row.blob_id,
            byte_size,
            extraction_status,
            extracted_data,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExtractionErrorKind, ExtractionFailure};

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_insert_and_get_scan() {
        let db = setup_db();
        let record = ScanRecord::new(DocumentKind::BiologyReport, "blob-1", 4096);
        db.insert_scan(&record).unwrap();

        let retrieved = db.get_scan(&record.id).unwrap().unwrap();
        assert_eq!(retrieved, record);
        assert!(db.get_scan("missing").unwrap().is_none());
    }

    #[test]
    fn test_update_requires_expected_status() {
        let db = setup_db();
        let record = ScanRecord::new(DocumentKind::Prescription, "blob-1", 10);
        db.insert_scan(&record).unwrap();

        // Not processing yet.
        assert!(!db
            .update_scan_extraction(
                &record.id,
                ExtractionStatus::Processing,
                ExtractionStatus::Extracted,
                None
            )
            .unwrap());

        assert!(db
            .update_scan_extraction(
                &record.id,
                ExtractionStatus::Pending,
                ExtractionStatus::Processing,
                None
            )
            .unwrap());

        let payload = ScanPayload::Failed(ExtractionFailure::new(
            ExtractionErrorKind::Authentication,
            "model credentials rejected: 401",
        ));
        assert!(db
            .update_scan_extraction(
                &record.id,
                ExtractionStatus::Processing,
                ExtractionStatus::Failed,
                Some(&payload)
            )
            .unwrap());

        let retrieved = db.get_scan(&record.id).unwrap().unwrap();
        assert_eq!(retrieved.extraction_status, ExtractionStatus::Failed);
        assert_eq!(retrieved.extracted_data, Some(payload));
        assert!(retrieved.updated_at >= record.updated_at);
    }

    #[test]
    fn test_update_missing_record() {
        let db = setup_db();
        assert!(!db
            .update_scan_extraction(
                "missing",
                ExtractionStatus::Pending,
                ExtractionStatus::Processing,
                None
            )
            .unwrap());
    }

    #[test]
    fn test_list_by_status() {
        let db = setup_db();
        let first = ScanRecord::new(DocumentKind::Prescription, "a", 1);
        let second = ScanRecord::new(DocumentKind::Prescription, "b", 1);
        db.insert_scan(&first).unwrap();
        db.insert_scan(&second).unwrap();
        db.update_scan_extraction(
            &second.id,
            ExtractionStatus::Pending,
            ExtractionStatus::Processing,
            None,
        )
        .unwrap();

        let pending = db.list_scans_by_status(ExtractionStatus::Pending).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);

        let processing = db.list_scans_by_status(ExtractionStatus::Processing).unwrap();
        assert_eq!(processing[0].id, second.id);
    }

    #[test]
    fn test_delete_scan() {
        let db = setup_db();
        let record = ScanRecord::new(DocumentKind::Prescription, "blob", 1);
        db.insert_scan(&record).unwrap();

        assert!(db.delete_scan(&record.id).unwrap());
        assert!(!db.delete_scan(&record.id).unwrap());
        assert!(db.get_scan(&record.id).unwrap().is_none());
    }

    #[test]
    fn test_unknown_status_is_constraint_error() {
        let db = setup_db();
        db.conn()
            .execute_batch("PRAGMA ignore_check_constraints = ON")
            .unwrap();
        db.conn()
            .execute(
                "INSERT INTO scan_records (id, kind, blob_id, byte_size, extraction_status, created_at, updated_at)
                 VALUES ('s1', 'prescription', 'b', 1, 'archived', 'now', 'now')",
                [],
            )
            .unwrap();

        assert!(matches!(db.get_scan("s1"), Err(DbError::Constraint(_))));
    }
}
