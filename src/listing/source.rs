use super::error::ListingError;
use crate::catalogue::MediaType;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single product entry scraped from a catalogue page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawListing {
    pub band_name: String,
    pub album_title: String,
    pub raw_title: String,
    pub detail_url: String,
    /// Set when the page itself states the format. Takes precedence over the
    /// category's media type.
    pub media_type: Option<MediaType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListingPage {
    pub listings: Vec<RawListing>,
    pub next_page_url: Option<String>,
}

/// Per-distributor adapter turning one catalogue page URL into listings.
#[async_trait]
pub trait ListingSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<ListingPage, ListingError>;
}
