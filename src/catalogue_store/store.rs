//! Repository traits consumed by the indexer, the verification engine and
//! the admin routes.

use super::models::*;
use crate::catalogue::{
    BandDiscographyEntry, BandReference, CatalogueIndexEntry, CatalogueIndexStatus,
    DistributorCode,
};
use crate::verification::{AiAgent, AiVerification};
use anyhow::Result;
use std::collections::{HashMap, HashSet};

pub trait CatalogueIndexStore: Send + Sync {
    /// Insert or update the entry keyed by (detail_url, distributor_code).
    /// Returns the id of the stored row.
    fn upsert(&self, entry: &CatalogueIndexUpsert) -> Result<String>;

    fn get_by_id(&self, id: &str) -> Result<Option<CatalogueIndexEntry>>;

    fn get_by_status(
        &self,
        distributor_code: Option<DistributorCode>,
        status: CatalogueIndexStatus,
    ) -> Result<Vec<CatalogueIndexEntry>>;

    /// Returns false if no entry has this id.
    fn update_status(&self, id: &str, status: CatalogueIndexStatus) -> Result<bool>;

    /// Returns the number of entries updated.
    fn update_status_batch(&self, ids: &[String], status: CatalogueIndexStatus) -> Result<usize>;

    fn list(&self, filter: &CatalogueIndexFilter) -> Result<Paged<CatalogueIndexEntry>>;
}

pub trait BandReferenceStore: Send + Sync {
    /// Band name -> set of normalized album titles.
    fn get_all_grouped_by_band_name(&self) -> Result<HashMap<String, HashSet<String>>>;

    /// Lowercased band name -> band reference id.
    fn get_band_reference_ids_by_name(&self) -> Result<HashMap<String, String>>;

    /// Band reference id -> discography rows.
    fn get_discography_for_bands(
        &self,
        band_reference_ids: &[String],
    ) -> Result<HashMap<String, Vec<BandDiscographyEntry>>>;

    /// Insert or update by external id.
    fn upsert_band_reference(&self, reference: &BandReference) -> Result<()>;

    /// Replaces all discography rows of a band. Duplicate normalized titles are dropped.
    fn replace_discography(
        &self,
        band_reference_id: &str,
        entries: &[BandDiscographyEntry],
    ) -> Result<()>;
}

pub trait VerificationStore: Send + Sync {
    /// Deletes undecided verifications of the given entries.
    fn delete_pending_for_entries(&self, catalogue_index_ids: &[String]) -> Result<usize>;

    /// Inserts all rows in a single transaction.
    fn insert_verifications(&self, verifications: &[AiVerification]) -> Result<()>;

    fn get_verification(&self, id: &str) -> Result<Option<AiVerification>>;

    fn get_verifications(&self, ids: &[String]) -> Result<Vec<AiVerification>>;

    fn list_pending(&self, filter: &PendingVerificationFilter) -> Result<Vec<AiVerification>>;

    fn list_candidates(
        &self,
        filter: &VerificationCandidateFilter,
    ) -> Result<Paged<VerificationCandidate>>;

    /// Writes every decision together with its entry cascade in one transaction.
    /// Returns the number of verifications updated.
    fn apply_decisions(&self, updates: &[DecisionUpdate]) -> Result<usize>;
}

pub trait AgentStore: Send + Sync {
    fn get_active_agent(&self) -> Result<Option<AiAgent>>;

    fn list_agents(&self) -> Result<Vec<AiAgent>>;

    /// Insert or update by name and return the stored id. Never changes
    /// which agent is active; new agents start inactive.
    fn upsert_agent(&self, agent: &AiAgent) -> Result<String>;

    /// Makes this agent the only active one. Returns false if it does not exist.
    fn set_active_agent(&self, id: &str) -> Result<bool>;
}
