//! Specific background job implementations.

pub mod catalogue_index;

pub use catalogue_index::{
    CatalogueIndexJob, ListingSourceFactory, SelectorSourceFactory, CATALOGUE_INDEX_JOB_ID,
};
