//! SQLite schema definition.

/// Complete database schema for odontogram storage.
pub const SCHEMA: &str = r#"
-- Enable foreign keys
PRAGMA foreign_keys = ON;

-- ============================================================================
-- Patients (local directory cache)
-- ============================================================================

CREATE TABLE IF NOT EXISTS patients (
    patient_id TEXT PRIMARY KEY,
    patient_number TEXT UNIQUE,                  -- human-facing chart number
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    date_of_birth TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_patients_last_name ON patients(last_name);

-- ============================================================================
-- Odontograms (one row per patient + version)
-- ============================================================================

CREATE TABLE IF NOT EXISTS odontograms (
    chart_id TEXT PRIMARY KEY,
    patient_id TEXT NOT NULL REFERENCES patients(patient_id),
    version INTEGER NOT NULL CHECK (version >= 1),
    doctor_id TEXT NOT NULL,
    clinic_id TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    teeth TEXT NOT NULL,                         -- JSON array of 32 tooth records
    periodontal TEXT NOT NULL DEFAULT '{}',      -- JSON object
    treatment_plan TEXT NOT NULL DEFAULT '[]',   -- JSON array of plan items
    images TEXT NOT NULL DEFAULT '[]',           -- JSON array of image metadata
    revision INTEGER NOT NULL DEFAULT 0,         -- compare-and-swap counter
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (patient_id, version)
);

CREATE INDEX IF NOT EXISTS idx_odontograms_patient ON odontograms(patient_id, version DESC);
CREATE INDEX IF NOT EXISTS idx_odontograms_clinic ON odontograms(clinic_id);
CREATE INDEX IF NOT EXISTS idx_odontograms_doctor ON odontograms(doctor_id, created_at DESC);

-- Teeth and provenance are fixed at creation
CREATE TRIGGER IF NOT EXISTS odontograms_immutable_columns
BEFORE UPDATE OF chart_id, patient_id, version, doctor_id, clinic_id, teeth, periodontal, created_at
ON odontograms
BEGIN
    SELECT RAISE(ABORT, 'Chart teeth and provenance are immutable');
END;

-- Charts are archived, never deleted
CREATE TRIGGER IF NOT EXISTS odontograms_no_delete BEFORE DELETE ON odontograms
BEGIN
    SELECT RAISE(ABORT, 'Charts cannot be deleted');
END;

-- ============================================================================
-- Completed Treatments (Append-Only - Immutable after creation)
-- ============================================================================

CREATE TABLE IF NOT EXISTS completed_treatments (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    entry_id TEXT NOT NULL UNIQUE,
    chart_id TEXT NOT NULL REFERENCES odontograms(chart_id),
    tooth INTEGER NOT NULL CHECK (tooth BETWEEN 1 AND 32),
    procedure_name TEXT NOT NULL,
    performed_at TEXT NOT NULL,
    cost REAL NOT NULL CHECK (cost >= 0),
    doctor_id TEXT NOT NULL,
    notes TEXT,
    recorded_at TEXT NOT NULL,
    previous_hash TEXT NOT NULL DEFAULT '',      -- '' for the first entry of a chart
    entry_hash TEXT NOT NULL UNIQUE,
    -- two writers racing on the same chain tip cannot both succeed
    UNIQUE (chart_id, previous_hash)
);

CREATE INDEX IF NOT EXISTS idx_completed_chart ON completed_treatments(chart_id, seq);

CREATE TRIGGER IF NOT EXISTS completed_treatments_no_update BEFORE UPDATE ON completed_treatments
BEGIN
    SELECT RAISE(ABORT, 'Completed treatments are append-only');
END;

CREATE TRIGGER IF NOT EXISTS completed_treatments_no_delete BEFORE DELETE ON completed_treatments
BEGIN
    SELECT RAISE(ABORT, 'Completed treatments are append-only');
END;
"#;
