//! Store input and query types.

use crate::catalogue::{
    CatalogueIndexEntry, CatalogueIndexStatus, DistributorCode, MediaType,
};
use crate::verification::{AiVerification, VerificationDecision};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const MAX_PAGE_SIZE: usize = 500;

fn default_page() -> usize {
    1
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_true() -> bool {
    true
}

/// A classified listing ready to be written to the index.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogueIndexUpsert {
    pub distributor_code: DistributorCode,
    pub band_name: String,
    pub album_title: String,
    pub raw_title: String,
    pub detail_url: String,
    pub media_type: Option<MediaType>,
    pub status: CatalogueIndexStatus,
    pub band_reference_id: Option<String>,
}

/// One page of results plus the unpaged total.
#[derive(Debug, Clone, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Converts 1-based page and size into (limit, offset).
pub(crate) fn page_bounds(page: usize, page_size: usize) -> (usize, usize) {
    let size = page_size.clamp(1, MAX_PAGE_SIZE);
    let page = page.max(1);
    (size, (page - 1) * size)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogueSortField {
    BandName,
    AlbumTitle,
    CreatedAt,
    #[default]
    UpdatedAt,
}

impl CatalogueSortField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::BandName => "band_name",
            Self::AlbumTitle => "album_title",
            Self::CreatedAt => "created_at",
            Self::UpdatedAt => "updated_at",
        }
    }
}

/// Admin listing filter over the catalogue index.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogueIndexFilter {
    pub distributor_code: Option<DistributorCode>,
    pub status: Option<CatalogueIndexStatus>,
    /// Case-insensitive substring over band name and album title.
    pub search: Option<String>,
    #[serde(default)]
    pub sort_by: CatalogueSortField,
    #[serde(default)]
    pub sort_ascending: bool,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for CatalogueIndexFilter {
    fn default() -> Self {
        Self {
            distributor_code: None,
            status: None,
            search: None,
            sort_by: CatalogueSortField::default(),
            sort_ascending: false,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateSortField {
    #[default]
    BandName,
    ConfidenceScore,
    VerifiedAt,
}

impl CandidateSortField {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            Self::BandName => "c.band_name",
            Self::ConfidenceScore => "v.confidence_score",
            Self::VerifiedAt => "v.created_at",
        }
    }
}

/// Filter for the verification candidate listing.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationCandidateFilter {
    pub distributor_code: Option<DistributorCode>,
    pub is_ukrainian: Option<bool>,
    /// `true` keeps entries with a pending verification, `false` keeps the
    /// ones still waiting for one. Unset lists both.
    pub verified_only: Option<bool>,
    #[serde(default)]
    pub sort_by: CandidateSortField,
    #[serde(default = "default_true")]
    pub sort_ascending: bool,
    #[serde(default = "default_page")]
    pub page: usize,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for VerificationCandidateFilter {
    fn default() -> Self {
        Self {
            distributor_code: None,
            is_ukrainian: None,
            verified_only: None,
            sort_by: CandidateSortField::default(),
            sort_ascending: true,
            page: default_page(),
            page_size: default_page_size(),
        }
    }
}

/// A Relevant entry together with its pending verification, if any.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationCandidate {
    pub entry: CatalogueIndexEntry,
    pub verification: Option<AiVerification>,
}

/// Selects pending verifications by the distributor of their entry and verdict.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PendingVerificationFilter {
    pub distributor_code: Option<DistributorCode>,
    pub is_ukrainian: Option<bool>,
}

/// A decision and its cascade onto the linked entry, applied as one unit.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionUpdate {
    pub verification_id: String,
    pub catalogue_index_id: String,
    pub decision: VerificationDecision,
    pub entry_status: CatalogueIndexStatus,
    /// Discography row to link the entry to. None leaves the link untouched.
    pub discography_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(1, 25), (25, 0));
        assert_eq!(page_bounds(3, 10), (10, 20));
        assert_eq!(page_bounds(0, 0), (1, 0));
        assert_eq!(page_bounds(2, 10_000), (MAX_PAGE_SIZE, MAX_PAGE_SIZE));
    }

    #[test]
    fn test_candidate_filter_defaults_from_empty_json() {
        let filter: VerificationCandidateFilter = serde_json::from_str("{}").unwrap();
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, DEFAULT_PAGE_SIZE);
        assert!(filter.sort_ascending);
        assert_eq!(filter.verified_only, None);
        assert_eq!(filter.sort_by, CandidateSortField::BandName);
    }
}
