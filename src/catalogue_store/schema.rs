//! Database schema for the catalogue index.
//!
//! - band_references / band_discography: ground truth, written by the reference sync
//! - catalogue_index: one row per (detail_url, distributor_code)
//! - ai_verifications: LLM judgements, at most one pending per entry
//! - ai_agents: LLM agent configurations

pub const CATALOGUE_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS band_references (
    id TEXT PRIMARY KEY,
    band_name TEXT NOT NULL,
    metal_archives_id INTEGER NOT NULL UNIQUE,
    genre TEXT,
    last_synced_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS band_discography (
    id TEXT PRIMARY KEY,
    band_reference_id TEXT NOT NULL REFERENCES band_references(id) ON DELETE CASCADE,
    album_title TEXT NOT NULL,
    normalized_album_title TEXT NOT NULL,
    album_type TEXT NOT NULL,
    year INTEGER,
    UNIQUE(band_reference_id, normalized_album_title)
);

CREATE TABLE IF NOT EXISTS catalogue_index (
    id TEXT PRIMARY KEY,
    distributor_code TEXT NOT NULL,
    band_name TEXT NOT NULL,
    album_title TEXT NOT NULL,
    raw_title TEXT NOT NULL,
    detail_url TEXT NOT NULL,
    media_type TEXT,
    status TEXT NOT NULL,
    band_reference_id TEXT REFERENCES band_references(id) ON DELETE SET NULL,
    band_discography_id TEXT REFERENCES band_discography(id) ON DELETE SET NULL,

    -- Timestamps (Unix milliseconds)
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,

    UNIQUE(detail_url, distributor_code)
);

CREATE INDEX IF NOT EXISTS idx_catalogue_status ON catalogue_index(status, distributor_code);
CREATE INDEX IF NOT EXISTS idx_catalogue_band ON catalogue_index(band_name);

CREATE TABLE IF NOT EXISTS ai_verifications (
    id TEXT PRIMARY KEY,
    catalogue_index_id TEXT NOT NULL REFERENCES catalogue_index(id) ON DELETE CASCADE,
    band_name TEXT NOT NULL,
    album_title TEXT NOT NULL,
    is_ukrainian INTEGER NOT NULL,
    confidence_score REAL NOT NULL,
    ai_analysis TEXT NOT NULL,
    matched_discography_id TEXT,
    admin_decision TEXT,
    admin_decision_at INTEGER,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_verifications_entry ON ai_verifications(catalogue_index_id, admin_decision);

CREATE TABLE IF NOT EXISTS ai_agents (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    prompt_template TEXT NOT NULL,
    model TEXT NOT NULL,
    max_tokens INTEGER NOT NULL,
    max_concurrent_requests INTEGER NOT NULL,
    api_key TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
"#;
