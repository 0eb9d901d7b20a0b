//! Catalog database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{Biomarker, Drug};

const DRUG_COLUMNS: &str = "id, name, code, active";
const BIOMARKER_COLUMNS: &str = "id, name, code, unit, default_min, default_max";

impl Database {
    /// Insert or update a drug.
    pub fn upsert_drug(&self, drug: &Drug) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO drugs (id, name, code, active, updated_at)
            VALUES (?1, ?2, ?3, ?4, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                code = excluded.code,
                active = excluded.active,
                updated_at = datetime('now')
            "#,
            params![drug.id, drug.name, drug.code, drug.active],
        )?;
        Ok(())
    }

    /// Get a drug by ID.
    pub fn get_drug(&self, id: &str) -> DbResult<Option<Drug>> {
        let sql = format!("SELECT {DRUG_COLUMNS} FROM drugs WHERE id = ?");
        Ok(self.conn.query_row(&sql, [id], drug_from_row).optional()?)
    }

    /// List drugs in insertion order, which is also matching order.
    pub fn list_drugs(&self, active_only: bool) -> DbResult<Vec<Drug>> {
        let sql = if active_only {
            format!("SELECT {DRUG_COLUMNS} FROM drugs WHERE active = 1 ORDER BY rowid")
        } else {
            format!("SELECT {DRUG_COLUMNS} FROM drugs ORDER BY rowid")
        };

        let mut stmt = self.conn.prepare(&sql)?;
        let drugs = stmt
            .query_map([], drug_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(drugs)
    }

    /// Mark a drug as inactive (soft delete).
    pub fn deactivate_drug(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self.conn.execute(
            "UPDATE drugs SET active = 0, updated_at = datetime('now') WHERE id = ?",
            [id],
        )?;
        Ok(rows_affected > 0)
    }

    /// Insert or update a biomarker.
    pub fn upsert_biomarker(&self, biomarker: &Biomarker) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO biomarkers (id, name, code, unit, default_min, default_max, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, datetime('now'))
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                code = excluded.code,
                unit = excluded.unit,
                default_min = excluded.default_min,
                default_max = excluded.default_max,
                updated_at = datetime('now')
            "#,
            params![
                biomarker.id,
                biomarker.name,
                biomarker.code,
                biomarker.unit,
                biomarker.default_min,
                biomarker.default_max,
            ],
        )?;
        Ok(())
    }

    /// Get a biomarker by ID.
    pub fn get_biomarker(&self, id: &str) -> DbResult<Option<Biomarker>> {
        let sql = format!("SELECT {BIOMARKER_COLUMNS} FROM biomarkers WHERE id = ?");
        Ok(self
            .conn
            .query_row(&sql, [id], biomarker_from_row)
            .optional()?)
    }

    /// List all biomarkers in insertion order.
    pub fn list_biomarkers(&self) -> DbResult<Vec<Biomarker>> {
        let sql = format!("SELECT {BIOMARKER_COLUMNS} FROM biomarkers ORDER BY rowid");
        let mut stmt = self.conn.prepare(&sql)?;
        let biomarkers = stmt
            .query_map([], biomarker_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(biomarkers)
    }
}

fn drug_from_row(row: &Row<'_>) -> rusqlite::Result<Drug> {
    Ok(Drug {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        active: row.get(3)?,
    })
}

fn biomarker_from_row(row: &Row<'_>) -> rusqlite::Result<Biomarker> {
    Ok(Biomarker {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        unit: row.get(3)?,
        default_min: row.get(4)?,
        default_max: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_upsert_and_get_drug() {
        let db = setup_db();

        let mut drug = Drug::new("d1", "Doliprane 1000mg");
        drug.code = Some("N02BE01".into());
        db.upsert_drug(&drug).unwrap();

        let retrieved = db.get_drug("d1").unwrap().unwrap();
        assert_eq!(retrieved, drug);

        drug.name = "Doliprane 500mg".into();
        db.upsert_drug(&drug).unwrap();
        assert_eq!(db.get_drug("d1").unwrap().unwrap().name, "Doliprane 500mg");
        assert_eq!(db.list_drugs(false).unwrap().len(), 1);
    }

    #[test]
    fn test_get_missing_drug() {
        let db = setup_db();
        assert!(db.get_drug("nope").unwrap().is_none());
    }

    #[test]
    fn test_list_drugs_keeps_insertion_order() {
        let db = setup_db();
        for (id, name) in [("z", "Zyrtec"), ("a", "Amoxicilline"), ("m", "Metformine")] {
            db.upsert_drug(&Drug::new(id, name)).unwrap();
        }

        let ids: Vec<String> = db.list_drugs(true).unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_deactivated_drugs_hidden() {
        let db = setup_db();
        db.upsert_drug(&Drug::new("d1", "Doliprane")).unwrap();
        db.upsert_drug(&Drug::new("d2", "Spasfon")).unwrap();

        assert!(db.deactivate_drug("d1").unwrap());
        assert!(!db.deactivate_drug("missing").unwrap());

        let active = db.list_drugs(true).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "d2");
        assert_eq!(db.list_drugs(false).unwrap().len(), 2);
    }

    #[test]
    fn test_biomarker_round_trip() {
        let db = setup_db();

        let mut glucose = Biomarker::new("b1", "Glucose").with_range(70.0, 100.0);
        glucose.unit = Some("mg/dL".into());
        db.upsert_biomarker(&glucose).unwrap();
        db.upsert_biomarker(&Biomarker::new("b2", "CRP")).unwrap();

        assert_eq!(db.get_biomarker("b1").unwrap().unwrap(), glucose);

        let all = db.list_biomarkers().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].default_range(), None);
    }
}
