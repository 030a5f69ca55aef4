//! Band/album relevance classification.
//!
//! The classifier is a pure function over a [`BandDiscographyIndex`]. It never
//! fails: missing or empty discography data degrades to `PendingReview`.

use super::models::CatalogueIndexStatus;
use super::normalize::normalize_album_title;
use std::collections::{HashMap, HashSet};

/// Map from band name to the set of normalized album titles known for it.
#[derive(Debug, Clone, Default)]
pub struct BandDiscographyIndex {
    bands: HashMap<String, HashSet<String>>,
}

impl BandDiscographyIndex {
    pub fn new(bands: HashMap<String, HashSet<String>>) -> Self {
        Self { bands }
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    /// Resolves a scraped band name to an index key.
    ///
    /// Exact lookup first, then a case-insensitive substring match in either
    /// direction. Ties in the fallback are broken by map iteration order.
    pub fn find_band(&self, band_name: &str) -> Option<(&str, &HashSet<String>)> {
        if let Some((key, albums)) = self.bands.get_key_value(band_name) {
            return Some((key.as_str(), albums));
        }

        let needle = band_name.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }

        self.bands.iter().find_map(|(key, albums)| {
            let key_lower = key.trim().to_lowercase();
            if key_lower.is_empty() {
                return None;
            }
            if key_lower.contains(&needle) || needle.contains(&key_lower) {
                Some((key.as_str(), albums))
            } else {
                None
            }
        })
    }
}

/// Outcome of classifying one listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub status: CatalogueIndexStatus,
    /// Index key the band name resolved to, if any.
    pub matched_band: Option<String>,
}

pub fn classify(
    band_name: &str,
    album_title: &str,
    index: &BandDiscographyIndex,
) -> Classification {
    let Some((matched, albums)) = index.find_band(band_name) else {
        return Classification {
            status: CatalogueIndexStatus::NotRelevant,
            matched_band: None,
        };
    };

    let status = if albums.is_empty() {
        CatalogueIndexStatus::PendingReview
    } else if albums.contains(&normalize_album_title(album_title)) {
        CatalogueIndexStatus::Relevant
    } else {
        CatalogueIndexStatus::PendingReview
    };

    Classification {
        status,
        matched_band: Some(matched.to_string()),
    }
}
