//! Data models for the catalogue index.
//!
//! A catalogue index entry is the deduplicated record of one listing observed
//! at a distributor. Band references and their discography are the ground
//! truth used to decide whether a listing is worth deep scraping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Distributor a listing was observed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DistributorCode {
    OsmoseProductions,
    Drakkar,
    BlackMetalVendor,
    BlackMetalStore,
    NapalmRecords,
    SeasonOfMist,
    ParagonRecords,
}

impl DistributorCode {
    pub const ALL: [DistributorCode; 7] = [
        Self::OsmoseProductions,
        Self::Drakkar,
        Self::BlackMetalVendor,
        Self::BlackMetalStore,
        Self::NapalmRecords,
        Self::SeasonOfMist,
        Self::ParagonRecords,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OsmoseProductions => "OSMOSE_PRODUCTIONS",
            Self::Drakkar => "DRAKKAR",
            Self::BlackMetalVendor => "BLACK_METAL_VENDOR",
            Self::BlackMetalStore => "BLACK_METAL_STORE",
            Self::NapalmRecords => "NAPALM_RECORDS",
            Self::SeasonOfMist => "SEASON_OF_MIST",
            Self::ParagonRecords => "PARAGON_RECORDS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|code| code.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for DistributorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Relevance classification of a catalogue index entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CatalogueIndexStatus {
    /// Band is not one we track.
    NotRelevant,
    /// Band is tracked but the album could not be confirmed.
    PendingReview,
    /// Band and album both matched. Ready for detail scraping.
    Relevant,
    /// The detail scrape consumed this entry.
    Processed,
    /// Confirmed through an AI verification decision.
    AiVerified,
}

impl CatalogueIndexStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotRelevant => "NOT_RELEVANT",
            Self::PendingReview => "PENDING_REVIEW",
            Self::Relevant => "RELEVANT",
            Self::Processed => "PROCESSED",
            Self::AiVerified => "AI_VERIFIED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NOT_RELEVANT" => Some(Self::NotRelevant),
            "PENDING_REVIEW" => Some(Self::PendingReview),
            "RELEVANT" => Some(Self::Relevant),
            "PROCESSED" => Some(Self::Processed),
            "AI_VERIFIED" => Some(Self::AiVerified),
            _ => None,
        }
    }
}

impl fmt::Display for CatalogueIndexStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical media format of a release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaType {
    Cd,
    Lp,
    Tape,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cd => "CD",
            Self::Lp => "LP",
            Self::Tape => "TAPE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CD" => Some(Self::Cd),
            "LP" | "VINYL" => Some(Self::Lp),
            "TAPE" | "CASSETTE" | "MC" => Some(Self::Tape),
            _ => None,
        }
    }
}

/// One listing observed at a distributor, as persisted in the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogueIndexEntry {
    pub id: String,
    pub distributor_code: DistributorCode,
    pub band_name: String,
    pub album_title: String,
    pub raw_title: String,
    pub detail_url: String,
    pub media_type: Option<MediaType>,
    pub status: CatalogueIndexStatus,
    pub band_reference_id: Option<String>,
    pub band_discography_id: Option<String>,
    /// Unix milliseconds.
    pub created_at: i64,
    /// Unix milliseconds.
    pub updated_at: i64,
}

/// A band of interest, synced from an external metal database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandReference {
    pub id: String,
    pub band_name: String,
    pub metal_archives_id: i64,
    pub genre: Option<String>,
    pub last_synced_at: i64,
}

/// One known album of a band reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandDiscographyEntry {
    pub id: String,
    pub band_reference_id: String,
    pub album_title: String,
    pub normalized_album_title: String,
    pub album_type: String,
    pub year: Option<i32>,
}

impl BandDiscographyEntry {
    pub fn new(
        band_reference_id: impl Into<String>,
        album_title: impl Into<String>,
        album_type: impl Into<String>,
        year: Option<i32>,
    ) -> Self {
        let album_title = album_title.into();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            band_reference_id: band_reference_id.into(),
            normalized_album_title: super::normalize_album_title(&album_title),
            album_title,
            album_type: album_type.into(),
            year,
        }
    }
}
