//! SQLite implementation of the catalogue repositories.

use super::models::*;
use super::schema::CATALOGUE_SCHEMA_SQL;
use super::store::{AgentStore, BandReferenceStore, CatalogueIndexStore, VerificationStore};
use crate::catalogue::{
    BandDiscographyEntry, BandReference, CatalogueIndexEntry, CatalogueIndexStatus,
    DistributorCode, MediaType,
};
use crate::verification::{AiAgent, AiVerification, VerificationDecision};
use anyhow::{Context, Result};
use rusqlite::{params, params_from_iter, types::Type, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::info;

const ENTRY_COLUMNS: &str = "id, distributor_code, band_name, album_title, raw_title, \
     detail_url, media_type, status, band_reference_id, band_discography_id, created_at, updated_at";

const CANDIDATE_COLUMNS: &str = "c.id, c.distributor_code, c.band_name, c.album_title, \
     c.raw_title, c.detail_url, c.media_type, c.status, c.band_reference_id, \
     c.band_discography_id, c.created_at, c.updated_at, \
     v.id AS v_id, v.catalogue_index_id AS v_catalogue_index_id, v.band_name AS v_band_name, \
     v.album_title AS v_album_title, v.is_ukrainian AS v_is_ukrainian, \
     v.confidence_score AS v_confidence_score, v.ai_analysis AS v_ai_analysis, \
     v.matched_discography_id AS v_matched_discography_id, \
     v.admin_decision AS v_admin_decision, v.admin_decision_at AS v_admin_decision_at, \
     v.created_at AS v_created_at";

const UPSERT_ENTRY_SQL: &str = r#"
    INSERT INTO catalogue_index (
        id, distributor_code, band_name, album_title, raw_title, detail_url,
        media_type, status, band_reference_id, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
    ON CONFLICT(detail_url, distributor_code) DO UPDATE SET
        band_name = excluded.band_name,
        album_title = excluded.album_title,
        raw_title = excluded.raw_title,
        media_type = COALESCE(excluded.media_type, catalogue_index.media_type),
        status = excluded.status,
        band_reference_id = excluded.band_reference_id,
        updated_at = excluded.updated_at
    RETURNING id
"#;

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn parse_text<T>(column: usize, value: &str, parse: impl Fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    parse(value).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            column,
            Type::Text,
            format!("unexpected value {:?}", value).into(),
        )
    })
}

/// SQLite implementation of all catalogue stores.
#[derive(Clone)]
pub struct SqliteCatalogueStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogueStore {
    /// Open or create the catalogue database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open catalogue database: {:?}", path))?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(CATALOGUE_SCHEMA_SQL)?;
        info!("Opened catalogue database at {:?}", path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(CATALOGUE_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<CatalogueIndexEntry> {
        let distributor: String = row.get("distributor_code")?;
        let status: String = row.get("status")?;
        Ok(CatalogueIndexEntry {
            id: row.get("id")?,
            distributor_code: parse_text(1, &distributor, DistributorCode::parse)?,
            band_name: row.get("band_name")?,
            album_title: row.get("album_title")?,
            raw_title: row.get("raw_title")?,
            detail_url: row.get("detail_url")?,
            media_type: row
                .get::<_, Option<String>>("media_type")?
                .and_then(|s| MediaType::parse(&s)),
            status: parse_text(7, &status, CatalogueIndexStatus::parse)?,
            band_reference_id: row.get("band_reference_id")?,
            band_discography_id: row.get("band_discography_id")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn verification_from_row(
        row: &rusqlite::Row,
        prefix: &str,
    ) -> rusqlite::Result<AiVerification> {
        let col = |name: &str| format!("{prefix}{name}");
        Ok(AiVerification {
            id: row.get(col("id").as_str())?,
            catalogue_index_id: row.get(col("catalogue_index_id").as_str())?,
            band_name: row.get(col("band_name").as_str())?,
            album_title: row.get(col("album_title").as_str())?,
            is_ukrainian: row.get(col("is_ukrainian").as_str())?,
            confidence_score: row.get(col("confidence_score").as_str())?,
            ai_analysis: row.get(col("ai_analysis").as_str())?,
            matched_discography_id: row.get(col("matched_discography_id").as_str())?,
            admin_decision: row
                .get::<_, Option<String>>(col("admin_decision").as_str())?
                .and_then(|s| VerificationDecision::parse(&s)),
            admin_decision_at: row.get(col("admin_decision_at").as_str())?,
            created_at: row.get(col("created_at").as_str())?,
        })
    }

    fn row_to_verification(row: &rusqlite::Row) -> rusqlite::Result<AiVerification> {
        Self::verification_from_row(row, "")
    }

    fn row_to_candidate(row: &rusqlite::Row) -> rusqlite::Result<VerificationCandidate> {
        let entry = Self::row_to_entry(row)?;
        let verification = match row.get::<_, Option<String>>("v_id")? {
            Some(_) => Some(Self::verification_from_row(row, "v_")?),
            None => None,
        };
        Ok(VerificationCandidate {
            entry,
            verification,
        })
    }

    fn row_to_agent(row: &rusqlite::Row) -> rusqlite::Result<AiAgent> {
        Ok(AiAgent {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            prompt_template: row.get("prompt_template")?,
            model: row.get("model")?,
            max_tokens: row.get("max_tokens")?,
            max_concurrent_requests: row.get("max_concurrent_requests")?,
            api_key: row.get("api_key")?,
            is_active: row.get("is_active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_discography(row: &rusqlite::Row) -> rusqlite::Result<BandDiscographyEntry> {
        Ok(BandDiscographyEntry {
            id: row.get("id")?,
            band_reference_id: row.get("band_reference_id")?,
            album_title: row.get("album_title")?,
            normalized_album_title: row.get("normalized_album_title")?,
            album_type: row.get("album_type")?,
            year: row.get("year")?,
        })
    }
}

impl CatalogueIndexStore for SqliteCatalogueStore {
    fn upsert(&self, entry: &CatalogueIndexUpsert) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let id: String = conn.query_row(
            UPSERT_ENTRY_SQL,
            params![
                uuid::Uuid::new_v4().to_string(),
                entry.distributor_code.as_str(),
                entry.band_name,
                entry.album_title,
                entry.raw_title,
                entry.detail_url,
                entry.media_type.map(|m| m.as_str()),
                entry.status.as_str(),
                entry.band_reference_id,
                now_millis(),
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn get_by_id(&self, id: &str) -> Result<Option<CatalogueIndexEntry>> {
        let conn = self.conn.lock().unwrap();
        let entry = conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM catalogue_index WHERE id = ?1"),
                params![id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    fn get_by_status(
        &self,
        distributor_code: Option<DistributorCode>,
        status: CatalogueIndexStatus,
    ) -> Result<Vec<CatalogueIndexEntry>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM catalogue_index
             WHERE status = ?1 AND (?2 IS NULL OR distributor_code = ?2)
             ORDER BY created_at, id"
        ))?;
        let entries = stmt
            .query_map(
                params![status.as_str(), distributor_code.map(|d| d.as_str())],
                Self::row_to_entry,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn update_status(&self, id: &str, status: CatalogueIndexStatus) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE catalogue_index SET status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), now_millis(), id],
        )?;
        Ok(updated > 0)
    }

    fn update_status_batch(&self, ids: &[String], status: CatalogueIndexStatus) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "UPDATE catalogue_index SET status = ?, updated_at = ? WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(status.as_str()), Box::new(now_millis())];
        for id in ids {
            params_vec.push(Box::new(id.clone()));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let updated = conn.execute(&sql, params_refs.as_slice())?;
        Ok(updated)
    }

    fn list(&self, filter: &CatalogueIndexFilter) -> Result<Paged<CatalogueIndexEntry>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(distributor) = filter.distributor_code {
            conditions.push("distributor_code = ?");
            params_vec.push(Box::new(distributor.as_str()));
        }
        if let Some(status) = filter.status {
            conditions.push("status = ?");
            params_vec.push(Box::new(status.as_str()));
        }
        if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            let pattern = format!("%{}%", search.to_lowercase());
            conditions.push("(LOWER(band_name) LIKE ? OR LOWER(album_title) LIKE ?)");
            params_vec.push(Box::new(pattern.clone()));
            params_vec.push(Box::new(pattern));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let conn = self.conn.lock().unwrap();
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM catalogue_index {where_clause}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let (limit, offset) = page_bounds(filter.page, filter.page_size);
        params_vec.push(Box::new(limit as i64));
        params_vec.push(Box::new(offset as i64));
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let direction = if filter.sort_ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {ENTRY_COLUMNS} FROM catalogue_index {where_clause}
             ORDER BY {} {direction}, id
             LIMIT ? OFFSET ?",
            filter.sort_by.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_refs.as_slice(), Self::row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Paged {
            items,
            total_count: total_count as usize,
            page: filter.page.max(1),
            page_size: limit,
        })
    }
}

impl BandReferenceStore for SqliteCatalogueStore {
    fn get_all_grouped_by_band_name(&self) -> Result<HashMap<String, HashSet<String>>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT r.band_name, d.normalized_album_title
             FROM band_references r
             LEFT JOIN band_discography d ON d.band_reference_id = r.id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut grouped: HashMap<String, HashSet<String>> = HashMap::new();
        for (band_name, album) in rows {
            let albums = grouped.entry(band_name).or_default();
            if let Some(album) = album {
                albums.insert(album);
            }
        }
        Ok(grouped)
    }

    fn get_band_reference_ids_by_name(&self) -> Result<HashMap<String, String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, band_name FROM band_references ORDER BY band_name, id")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut ids = HashMap::with_capacity(rows.len());
        for (id, band_name) in rows {
            ids.entry(band_name.to_lowercase()).or_insert(id);
        }
        Ok(ids)
    }

    fn get_discography_for_bands(
        &self,
        band_reference_ids: &[String],
    ) -> Result<HashMap<String, Vec<BandDiscographyEntry>>> {
        if band_reference_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT id, band_reference_id, album_title, normalized_album_title, album_type, year
             FROM band_discography
             WHERE band_reference_id IN ({})
             ORDER BY year, album_title",
            placeholders(band_reference_ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(band_reference_ids.iter()), Self::row_to_discography)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut grouped: HashMap<String, Vec<BandDiscographyEntry>> = HashMap::new();
        for entry in rows {
            grouped
                .entry(entry.band_reference_id.clone())
                .or_default()
                .push(entry);
        }
        Ok(grouped)
    }

    fn upsert_band_reference(&self, reference: &BandReference) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO band_references (id, band_name, metal_archives_id, genre, last_synced_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(metal_archives_id) DO UPDATE SET
                band_name = excluded.band_name,
                genre = excluded.genre,
                last_synced_at = excluded.last_synced_at
            "#,
            params![
                reference.id,
                reference.band_name,
                reference.metal_archives_id,
                reference.genre,
                reference.last_synced_at,
            ],
        )?;
        Ok(())
    }

    fn replace_discography(
        &self,
        band_reference_id: &str,
        entries: &[BandDiscographyEntry],
    ) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM band_discography WHERE band_reference_id = ?1",
            params![band_reference_id],
        )?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO band_discography
                 (id, band_reference_id, album_title, normalized_album_title, album_type, year)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for entry in entries {
                stmt.execute(params![
                    entry.id,
                    band_reference_id,
                    entry.album_title,
                    entry.normalized_album_title,
                    entry.album_type,
                    entry.year,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

impl VerificationStore for SqliteCatalogueStore {
    fn delete_pending_for_entries(&self, catalogue_index_ids: &[String]) -> Result<usize> {
        if catalogue_index_ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "DELETE FROM ai_verifications
             WHERE admin_decision IS NULL AND catalogue_index_id IN ({})",
            placeholders(catalogue_index_ids.len())
        );
        let deleted = conn.execute(&sql, params_from_iter(catalogue_index_ids.iter()))?;
        Ok(deleted)
    }

    fn insert_verifications(&self, verifications: &[AiVerification]) -> Result<()> {
        if verifications.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO ai_verifications (
                    id, catalogue_index_id, band_name, album_title, is_ukrainian,
                    confidence_score, ai_analysis, matched_discography_id,
                    admin_decision, admin_decision_at, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                "#,
            )?;
            for v in verifications {
                stmt.execute(params![
                    v.id,
                    v.catalogue_index_id,
                    v.band_name,
                    v.album_title,
                    v.is_ukrainian,
                    v.confidence_score,
                    v.ai_analysis,
                    v.matched_discography_id,
                    v.admin_decision.map(|d| d.as_str()),
                    v.admin_decision_at,
                    v.created_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn get_verification(&self, id: &str) -> Result<Option<AiVerification>> {
        let conn = self.conn.lock().unwrap();
        let verification = conn
            .query_row(
                "SELECT * FROM ai_verifications WHERE id = ?1",
                params![id],
                Self::row_to_verification,
            )
            .optional()?;
        Ok(verification)
    }

    fn get_verifications(&self, ids: &[String]) -> Result<Vec<AiVerification>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT * FROM ai_verifications WHERE id IN ({}) ORDER BY created_at, id",
            placeholders(ids.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let verifications = stmt
            .query_map(params_from_iter(ids.iter()), Self::row_to_verification)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(verifications)
    }

    fn list_pending(&self, filter: &PendingVerificationFilter) -> Result<Vec<AiVerification>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT v.* FROM ai_verifications v
             JOIN catalogue_index c ON c.id = v.catalogue_index_id
             WHERE v.admin_decision IS NULL
               AND (?1 IS NULL OR c.distributor_code = ?1)
               AND (?2 IS NULL OR v.is_ukrainian = ?2)
             ORDER BY v.created_at, v.id",
        )?;
        let verifications = stmt
            .query_map(
                params![
                    filter.distributor_code.map(|d| d.as_str()),
                    filter.is_ukrainian,
                ],
                Self::row_to_verification,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(verifications)
    }

    fn list_candidates(
        &self,
        filter: &VerificationCandidateFilter,
    ) -> Result<Paged<VerificationCandidate>> {
        let mut conditions: Vec<&str> = vec!["c.status = ?"];
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(CatalogueIndexStatus::Relevant.as_str())];

        if let Some(distributor) = filter.distributor_code {
            conditions.push("c.distributor_code = ?");
            params_vec.push(Box::new(distributor.as_str()));
        }
        match filter.verified_only {
            Some(true) => conditions.push("v.id IS NOT NULL"),
            Some(false) => conditions.push("v.id IS NULL"),
            None => {}
        }
        if let Some(is_ukrainian) = filter.is_ukrainian {
            conditions.push("v.is_ukrainian = ?");
            params_vec.push(Box::new(is_ukrainian));
        }

        let from_clause = format!(
            "FROM catalogue_index c
             LEFT JOIN ai_verifications v
               ON v.catalogue_index_id = c.id AND v.admin_decision IS NULL
             WHERE {}",
            conditions.join(" AND ")
        );

        let conn = self.conn.lock().unwrap();
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
        let total_count: i64 = conn.query_row(
            &format!("SELECT COUNT(*) {from_clause}"),
            params_refs.as_slice(),
            |row| row.get(0),
        )?;

        let (limit, offset) = page_bounds(filter.page, filter.page_size);
        params_vec.push(Box::new(limit as i64));
        params_vec.push(Box::new(offset as i64));
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let direction = if filter.sort_ascending { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {CANDIDATE_COLUMNS} {from_clause}
             ORDER BY {} {direction}, c.id
             LIMIT ? OFFSET ?",
            filter.sort_by.column()
        );
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_refs.as_slice(), Self::row_to_candidate)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(Paged {
            items,
            total_count: total_count as usize,
            page: filter.page.max(1),
            page_size: limit,
        })
    }

    fn apply_decisions(&self, updates: &[DecisionUpdate]) -> Result<usize> {
        if updates.is_empty() {
            return Ok(0);
        }
        let now = now_millis();
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut applied = 0;
        {
            let mut decide = tx.prepare(
                "UPDATE ai_verifications SET admin_decision = ?1, admin_decision_at = ?2 WHERE id = ?3",
            )?;
            // A discography id that no longer exists leaves the current link in place.
            let mut cascade = tx.prepare(
                "UPDATE catalogue_index SET
                    status = ?1,
                    updated_at = ?2,
                    band_discography_id = COALESCE(
                        (SELECT id FROM band_discography WHERE id = ?3),
                        band_discography_id
                    )
                 WHERE id = ?4",
            )?;
            for update in updates {
                let decided = decide.execute(params![
                    update.decision.as_str(),
                    now,
                    update.verification_id,
                ])?;
                if decided == 0 {
                    continue;
                }
                cascade.execute(params![
                    update.entry_status.as_str(),
                    now,
                    update.discography_id,
                    update.catalogue_index_id,
                ])?;
                applied += decided;
            }
        }
        tx.commit()?;
        Ok(applied)
    }
}

impl AgentStore for SqliteCatalogueStore {
    fn get_active_agent(&self) -> Result<Option<AiAgent>> {
        let conn = self.conn.lock().unwrap();
        let agent = conn
            .query_row(
                "SELECT * FROM ai_agents WHERE is_active = 1 ORDER BY updated_at DESC LIMIT 1",
                [],
                Self::row_to_agent,
            )
            .optional()?;
        Ok(agent)
    }

    fn list_agents(&self) -> Result<Vec<AiAgent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM ai_agents ORDER BY name")?;
        let agents = stmt
            .query_map([], Self::row_to_agent)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(agents)
    }

    fn upsert_agent(&self, agent: &AiAgent) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let now = now_millis();
        let id: String = conn.query_row(
            r#"
            INSERT INTO ai_agents (
                id, name, description, prompt_template, model, max_tokens,
                max_concurrent_requests, api_key, is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?9)
            ON CONFLICT(name) DO UPDATE SET
                description = excluded.description,
                prompt_template = excluded.prompt_template,
                model = excluded.model,
                max_tokens = excluded.max_tokens,
                max_concurrent_requests = excluded.max_concurrent_requests,
                api_key = excluded.api_key,
                updated_at = excluded.updated_at
            RETURNING id
            "#,
            params![
                agent.id,
                agent.name,
                agent.description,
                agent.prompt_template,
                agent.model,
                agent.max_tokens,
                agent.max_concurrent_requests,
                agent.api_key,
                now,
            ],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    fn set_active_agent(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let exists = tx
            .query_row("SELECT 1 FROM ai_agents WHERE id = ?1", params![id], |_| Ok(()))
            .optional()?
            .is_some();
        if !exists {
            return Ok(false);
        }
        tx.execute(
            "UPDATE ai_agents SET is_active = (id = ?1), updated_at = ?2",
            params![id, now_millis()],
        )?;
        tx.commit()?;
        Ok(true)
    }
}
