//! SQLite schema definition.

/// Complete database schema for medscan.
pub const SCHEMA: &str = r#"
-- ============================================================================
-- Reference Catalogs (read-only for the pipeline)
-- ============================================================================

CREATE TABLE IF NOT EXISTS drugs (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT,                                    -- ATC / CIP code
    active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_drugs_name ON drugs(name);

CREATE TABLE IF NOT EXISTS biomarkers (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    code TEXT,                                    -- LOINC code
    unit TEXT,
    default_min REAL,
    default_max REAL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_biomarkers_name ON biomarkers(name);

-- ============================================================================
-- Scan Records
-- ============================================================================

CREATE TABLE IF NOT EXISTS scan_records (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL CHECK (kind IN ('prescription', 'biology_report')),
    blob_id TEXT NOT NULL,
    byte_size INTEGER NOT NULL,
    extraction_status TEXT NOT NULL DEFAULT 'pending'
        CHECK (extraction_status IN ('pending', 'processing', 'extracted', 'failed', 'confirmed')),
    extracted_data TEXT,                          -- JSON ScanPayload
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_scans_status ON scan_records(extraction_status);
CREATE INDEX IF NOT EXISTS idx_scans_blob ON scan_records(blob_id);
"#;
