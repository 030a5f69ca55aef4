//! Catalogue indexing.
//!
//! Crawls every category of one distributor, classifies each listing against
//! the band discography index and upserts it into the catalogue index. Pages
//! are fetched strictly one after the other with a random politeness delay in
//! between.

use crate::catalogue::{classify, BandDiscographyIndex, CatalogueIndexStatus};
use crate::catalogue_store::{BandReferenceStore, CatalogueIndexStore, CatalogueIndexUpsert};
use crate::config::{CrawlSettings, DistributorConfig};
use crate::listing::{CategoryPaginator, ListingError, ListingSource};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Indexing was cancelled")]
    Cancelled,

    #[error(transparent)]
    Listing(#[from] ListingError),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

/// Uniformly random delay between page fetches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolitenessDelay {
    min: Duration,
    max: Duration,
}

impl PolitenessDelay {
    pub fn new(min: Duration, max: Duration) -> Self {
        if min <= max {
            Self { min, max }
        } else {
            Self { min: max, max: min }
        }
    }

    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self::new(
            Duration::from_secs(settings.min_delay_secs),
            Duration::from_secs(settings.max_delay_secs),
        )
    }

    pub fn sample(&self) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rand::rng().random_range(min..=max))
    }

    /// Sleeps for one sampled delay unless cancelled first.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), IndexError> {
        let delay = self.sample();
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = cancel.cancelled() => Err(IndexError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}

pub struct CatalogueIndexer {
    catalogue_store: Arc<dyn CatalogueIndexStore>,
    band_store: Arc<dyn BandReferenceStore>,
    delay: PolitenessDelay,
}

impl CatalogueIndexer {
    pub fn new(
        catalogue_store: Arc<dyn CatalogueIndexStore>,
        band_store: Arc<dyn BandReferenceStore>,
        delay: PolitenessDelay,
    ) -> Self {
        Self {
            catalogue_store,
            band_store,
            delay,
        }
    }

    /// Indexes every category of `distributor` and returns the number of
    /// listings written.
    ///
    /// A failed page aborts the run. Entries written before the failure stay.
    pub async fn index_distributor(
        &self,
        distributor: &DistributorConfig,
        source: &dyn ListingSource,
        cancel: &CancellationToken,
    ) -> Result<usize, IndexError> {
        let code = distributor.code;
        let index = BandDiscographyIndex::new(self.band_store.get_all_grouped_by_band_name()?);
        let reference_ids = self.band_store.get_band_reference_ids_by_name()?;

        info!(
            "Indexing {} ({} categories, {} reference bands)",
            code,
            distributor.categories.len(),
            index.len()
        );

        let mut paginator = CategoryPaginator::new(&distributor.categories, None);
        let mut written = 0;
        let mut relevant = 0;

        while let Some(target) = paginator.current() {
            if cancel.is_cancelled() {
                return Err(IndexError::Cancelled);
            }
            if paginator.state().pages_fetched > 0 {
                self.delay.wait(cancel).await?;
            }

            debug!("[{}] Fetching {}", code, target.url);
            let page = tokio::select! {
                _ = cancel.cancelled() => return Err(IndexError::Cancelled),
                page = source.fetch_page(&target.url) => page?,
            };

            for listing in &page.listings {
                let classification = classify(&listing.band_name, &listing.album_title, &index);
                let band_reference_id = match classification.status {
                    CatalogueIndexStatus::Relevant | CatalogueIndexStatus::PendingReview => {
                        classification
                            .matched_band
                            .as_deref()
                            .and_then(|band| lookup_reference(&reference_ids, band))
                    }
                    _ => None,
                };
                if classification.status == CatalogueIndexStatus::Relevant {
                    relevant += 1;
                }

                self.catalogue_store.upsert(&CatalogueIndexUpsert {
                    distributor_code: code,
                    band_name: listing.band_name.clone(),
                    album_title: listing.album_title.clone(),
                    raw_title: listing.raw_title.clone(),
                    detail_url: listing.detail_url.clone(),
                    media_type: listing.media_type.or(target.media_type),
                    status: classification.status,
                    band_reference_id,
                })?;
                written += 1;
            }

            debug!(
                "[{}] {} listings on {}, next page: {:?}",
                code,
                page.listings.len(),
                target.url,
                page.next_page_url
            );
            paginator.advance(page.next_page_url);
        }

        info!(
            "Indexed {}: {} listings over {} pages, {} relevant",
            code,
            written,
            paginator.state().pages_fetched,
            relevant
        );
        Ok(written)
    }
}

fn lookup_reference(reference_ids: &HashMap<String, String>, band: &str) -> Option<String> {
    reference_ids.get(&band.to_lowercase()).cloned()
}
