//! Catalogue indexing background job.
//!
//! Crawls every enabled distributor, each as its own sequential pipeline, or
//! a single distributor when triggered with `{"distributor": "<CODE>"}`.

use crate::background_jobs::{
    context::JobContext,
    job::{BackgroundJob, JobError, JobSchedule},
};
use crate::catalogue::DistributorCode;
use crate::config::DistributorConfig;
use crate::indexer::{CatalogueIndexer, IndexError};
use crate::listing::{ListingError, ListingSource, SelectorListingSource};
use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub const CATALOGUE_INDEX_JOB_ID: &str = "catalogue_index";

/// Builds the listing source used to crawl a distributor.
pub trait ListingSourceFactory: Send + Sync {
    fn create(&self, distributor: &DistributorConfig) -> Result<Arc<dyn ListingSource>, ListingError>;
}

/// Creates [`SelectorListingSource`]s from the distributor's configured selectors.
pub struct SelectorSourceFactory {
    request_timeout: Duration,
}

impl SelectorSourceFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl ListingSourceFactory for SelectorSourceFactory {
    fn create(&self, distributor: &DistributorConfig) -> Result<Arc<dyn ListingSource>, ListingError> {
        let selectors = distributor.selectors.as_ref().ok_or_else(|| {
            ListingError::config(distributor.code, "no listing selectors configured")
        })?;
        Ok(Arc::new(SelectorListingSource::new(
            distributor.code,
            selectors,
            self.request_timeout,
        )?))
    }
}

#[derive(Debug, Deserialize)]
struct IndexJobParams {
    distributor: Option<String>,
}

pub struct CatalogueIndexJob {
    indexer: Arc<CatalogueIndexer>,
    distributors: Vec<DistributorConfig>,
    sources: Arc<dyn ListingSourceFactory>,
    interval: Option<Duration>,
}

impl CatalogueIndexJob {
    pub fn new(
        indexer: Arc<CatalogueIndexer>,
        distributors: Vec<DistributorConfig>,
        sources: Arc<dyn ListingSourceFactory>,
        interval: Option<Duration>,
    ) -> Self {
        Self {
            indexer,
            distributors,
            sources,
            interval,
        }
    }

    /// Indexes one distributor. Disabled distributors are skipped and count
    /// as zero listings.
    pub async fn index_one(
        &self,
        distributor: &DistributorConfig,
        cancel: &CancellationToken,
    ) -> Result<usize, JobError> {
        let code = distributor.code;
        if !distributor.enabled {
            info!("Skipping disabled distributor {}", code);
            return Ok(0);
        }

        let source = self.sources.create(distributor).map_err(|e| {
            error!("Cannot build listing source: {}", e);
            JobError::ExecutionFailed(e.to_string())
        })?;

        match self
            .indexer
            .index_distributor(distributor, source.as_ref(), cancel)
            .await
        {
            Ok(count) => Ok(count),
            Err(IndexError::Cancelled) => {
                warn!("Indexing of {} cancelled", code);
                Err(JobError::Cancelled)
            }
            Err(e) => {
                error!("Indexing of {} failed: {}", code, e);
                Err(JobError::ExecutionFailed(e.to_string()))
            }
        }
    }

    async fn index_many(
        &self,
        distributors: &[&DistributorConfig],
        ctx: &JobContext,
    ) -> Result<(), JobError> {
        let results = join_all(
            distributors
                .iter()
                .map(|d| self.index_one(d, &ctx.cancellation_token)),
        )
        .await;

        if results.iter().any(|r| matches!(r, Err(JobError::Cancelled))) {
            return Err(JobError::Cancelled);
        }

        let failed: Vec<String> = distributors
            .iter()
            .zip(&results)
            .filter(|(_, r)| r.is_err())
            .map(|(d, _)| d.code.to_string())
            .collect();
        let written: usize = results.iter().filter_map(|r| r.as_ref().ok()).sum();
        info!(
            "Indexing finished: {} listings written, {} distributors failed",
            written,
            failed.len()
        );

        if failed.is_empty() {
            Ok(())
        } else {
            Err(JobError::ExecutionFailed(format!(
                "Indexing failed for {}",
                failed.join(", ")
            )))
        }
    }

    fn find(&self, code: DistributorCode) -> Option<&DistributorConfig> {
        self.distributors.iter().find(|d| d.code == code)
    }
}

#[async_trait]
impl BackgroundJob for CatalogueIndexJob {
    fn id(&self) -> &'static str {
        CATALOGUE_INDEX_JOB_ID
    }

    fn name(&self) -> &'static str {
        "Catalogue Index"
    }

    fn description(&self) -> &'static str {
        "Crawl distributor catalogues and classify listings"
    }

    fn schedule(&self) -> JobSchedule {
        match self.interval {
            Some(interval) => JobSchedule::Interval(interval),
            None => JobSchedule::Manual,
        }
    }

    async fn execute(&self, ctx: &JobContext) -> Result<(), JobError> {
        if ctx.is_cancelled() {
            return Err(JobError::Cancelled);
        }
        let all: Vec<&DistributorConfig> = self.distributors.iter().collect();
        self.index_many(&all, ctx).await
    }

    async fn execute_with_params(
        &self,
        ctx: &JobContext,
        params: Option<JsonValue>,
    ) -> Result<(), JobError> {
        let params: Option<IndexJobParams> = params
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| JobError::InvalidParams(e.to_string()))?;

        let Some(requested) = params.and_then(|p| p.distributor) else {
            return self.execute(ctx).await;
        };
        let distributor = DistributorCode::parse(&requested)
            .and_then(|code| self.find(code))
            .ok_or_else(|| {
                JobError::InvalidParams(format!("Distributor {} is not configured", requested))
            })?;
        self.index_many(&[distributor], ctx).await
    }
}
